//! End-to-end fake push against a mocked registry.

mod common;

use common::*;
use registry_fake_pusher::PusherError;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_manifest_put(server: &MockServer, repo: &str, tag: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(format!("/v2/{}/manifests/{}", repo, tag)))
        .and(header(
            "content-type",
            "application/vnd.docker.distribution.manifest.v1+prettyjws",
        ))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_blob_copy(server: &MockServer, digest: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/blobs/{}", SOURCE_REPO, digest)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/v2/{}/blobs/uploads/session-1", TARGET_REPO)))
        .and(query_param("_state", "abc"))
        .and(query_param("digest", digest))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_upload_start(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v2/{}/blobs/uploads/", TARGET_REPO)))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("location", "/v2/base/blobs/uploads/session-1?_state=abc"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_grafts_top_layers_in_source_order() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    mount_manifest(&server, TARGET_REPO, "latest", manifest_body("base", "latest", &target_layers())).await;
    mount_upload_start(&server, 2).await;
    mount_blob_copy(&server, "sha256:s0", "layer-zero").await;
    mount_blob_copy(&server, "sha256:s1", "layer-one!").await;
    mount_manifest_put(&server, TARGET_REPO, "grafted", 201).await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (TARGET_REPO, "latest"), "grafted", 2);
    let report = pusher(config).fake_push().await.expect("fake push succeeds");

    assert_eq!(report.new_tag, "grafted");
    assert_eq!(report.layers_spliced, 2);
    assert_eq!(report.total_layers, 4);
    assert_eq!(report.blobs_transferred, 2);
    assert_eq!(report.bytes_transferred, 20);

    let pushed = pushed_manifest(&server, TARGET_REPO, "grafted").await;
    assert_eq!(pushed["tag"], "grafted");
    assert_eq!(pushed["name"], "base");
    assert_eq!(
        blob_sums(&pushed),
        vec!["sha256:s0", "sha256:s1", "sha256:t0", "sha256:t1"]
    );
    assert_eq!(pushed["signatures"].as_array().map(Vec::len), Some(1));

    // Target layers are carried over byte for byte
    let targets = target_layers();
    assert_eq!(pushed["history"][2]["v1Compatibility"], targets[0].1.as_str());
    assert_eq!(pushed["history"][3]["v1Compatibility"], targets[1].1.as_str());

    let top = history_config(&pushed, 0);
    let second = history_config(&pushed, 1);
    assert_eq!(top["parent"], second["id"]);
    assert_eq!(second["parent"], "t0id");
    assert_ne!(top["id"], "s0id");
    assert_eq!(top["id"].as_str().map(str::len), Some(64));

    let env: Vec<&str> = top["config"]["Env"]
        .as_array()
        .expect("merged env")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(env.contains(&"APP=1"));
    assert!(env.contains(&"BASE=1"));
}

#[tokio::test]
async fn test_uploads_deepest_layer_first() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    mount_manifest(&server, TARGET_REPO, "latest", manifest_body("base", "latest", &target_layers())).await;
    mount_upload_start(&server, 2).await;
    mount_blob_copy(&server, "sha256:s0", "zero").await;
    mount_blob_copy(&server, "sha256:s1", "one").await;
    mount_manifest_put(&server, TARGET_REPO, "grafted", 201).await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (TARGET_REPO, "latest"), "grafted", 2);
    pusher(config).fake_push().await.expect("fake push succeeds");

    let downloads: Vec<String> = requests_matching(&server, "GET", "/v2/app/blobs/")
        .await
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(downloads, vec!["/v2/app/blobs/sha256:s1", "/v2/app/blobs/sha256:s0"]);
}

#[tokio::test]
async fn test_same_repository_skips_blob_transfer() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    mount_manifest(&server, SOURCE_REPO, "base", manifest_body("app", "base", &target_layers())).await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/{}/blobs/uploads/", SOURCE_REPO)))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;
    mount_manifest_put(&server, SOURCE_REPO, "v1-on-base", 201).await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (SOURCE_REPO, "base"), "v1-on-base", 1);
    let report = pusher(config).fake_push().await.expect("fake push succeeds");

    assert_eq!(report.blobs_transferred, 0);
    assert_eq!(report.total_layers, 3);
    assert!(requests_matching(&server, "GET", "/v2/app/blobs/").await.is_empty());

    let pushed = pushed_manifest(&server, SOURCE_REPO, "v1-on-base").await;
    assert_eq!(blob_sums(&pushed), vec!["sha256:s0", "sha256:t0", "sha256:t1"]);
}

#[tokio::test]
async fn test_rejected_manifest_push_is_reported_once() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    mount_manifest(&server, SOURCE_REPO, "base", manifest_body("app", "base", &target_layers())).await;
    mount_manifest_put(&server, SOURCE_REPO, "too-big", 413).await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (SOURCE_REPO, "base"), "too-big", 3);
    let err = pusher(config).fake_push().await.unwrap_err();

    assert!(matches!(err, PusherError::ManifestPush(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_layer_count_beyond_source_fails_before_target_load() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/manifests/latest", TARGET_REPO)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (TARGET_REPO, "latest"), "grafted", 4);
    let err = pusher(config).fake_push().await.unwrap_err();

    assert_eq!(err, PusherError::LayerOutOfRange { index: 3, count: 3 });
    assert!(requests_matching(&server, "PUT", "/v2/").await.is_empty());
}

#[tokio::test]
async fn test_missing_source_manifest_is_load_error() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/app/manifests/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("manifest unknown"))
        .mount(&server)
        .await;

    let config = push_config(&server, (SOURCE_REPO, "missing"), (TARGET_REPO, "latest"), "grafted", 1);
    let err = pusher(config).fake_push().await.unwrap_err();

    match err {
        PusherError::ManifestLoad(msg) => assert!(msg.contains("source")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_blob_download_aborts_before_push() {
    let server = MockServer::start().await;
    mount_open_ping(&server).await;
    mount_manifest(&server, SOURCE_REPO, "v1", manifest_body("app", "v1", &source_layers())).await;
    mount_manifest(&server, TARGET_REPO, "latest", manifest_body("base", "latest", &target_layers())).await;
    Mock::given(method("GET"))
        .and(path("/v2/app/blobs/sha256:s0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_upload_start(&server, 0).await;

    let config = push_config(&server, (SOURCE_REPO, "v1"), (TARGET_REPO, "latest"), "grafted", 1);
    let err = pusher(config).fake_push().await.unwrap_err();

    assert!(matches!(err, PusherError::BlobTransfer(_)), "got {err:?}");
    assert!(requests_matching(&server, "PUT", "/v2/").await.is_empty());
}
