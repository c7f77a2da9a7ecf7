//! Shared fixtures for the wiremock-backed registry tests.

#![allow(dead_code)]

use registry_fake_pusher::credentials::{Credential, CredentialStore};
use registry_fake_pusher::{FakePusher, Logger, PushConfig, RegistryLocation};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SOURCE_REPO: &str = "app";
pub const TARGET_REPO: &str = "base";

/// `(digest, v1Compatibility)` for a layer with the given id and parent.
pub fn layer(digest: &str, id: &str, parent: Option<&str>, env: &[&str]) -> (String, String) {
    let mut v1 = json!({
        "id": id,
        "created": "2024-01-01T00:00:00Z",
        "container_config": { "Env": env, "Cmd": ["/bin/sh", "-c", format!("#(nop) {}", id)] },
        "config": { "Env": env },
    });
    if let Some(parent) = parent {
        v1["parent"] = json!(parent);
    }
    (digest.to_string(), v1.to_string())
}

pub fn manifest_body(name: &str, tag: &str, layers: &[(String, String)]) -> String {
    let fs_layers: Vec<Value> = layers
        .iter()
        .map(|(digest, _)| json!({ "blobSum": digest }))
        .collect();
    let history: Vec<Value> = layers
        .iter()
        .map(|(_, v1)| json!({ "v1Compatibility": v1 }))
        .collect();
    json!({
        "schemaVersion": 1,
        "name": name,
        "tag": tag,
        "architecture": "amd64",
        "fsLayers": fs_layers,
        "history": history,
    })
    .to_string()
}

/// Three source layers, top first.
pub fn source_layers() -> Vec<(String, String)> {
    vec![
        layer("sha256:s0", "s0id", Some("s1id"), &["APP=1"]),
        layer("sha256:s1", "s1id", Some("s2id"), &["APP=1"]),
        layer("sha256:s2", "s2id", None, &["PATH=/usr/bin"]),
    ]
}

/// Two target layers, top first.
pub fn target_layers() -> Vec<(String, String)> {
    vec![
        layer("sha256:t0", "t0id", Some("t1id"), &["PATH=/bin", "BASE=1"]),
        layer("sha256:t1", "t1id", None, &["PATH=/bin"]),
    ]
}

pub async fn mount_open_ping(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

pub async fn mount_manifest(server: &MockServer, repo: &str, tag: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/manifests/{}", repo, tag)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn push_config(
    server: &MockServer,
    source: (&str, &str),
    target: (&str, &str),
    new_tag: &str,
    layer_count: usize,
) -> PushConfig {
    PushConfig {
        source: RegistryLocation::new(&server.uri(), source.0, source.1),
        target: RegistryLocation::new(&server.uri(), target.0, target.1),
        new_tag: new_tag.to_string(),
        layer_count,
        source_token: None,
        target_token: None,
        docker_config: None,
        debug: false,
    }
}

pub fn pusher(config: PushConfig) -> FakePusher {
    pusher_with_credentials(config, HashMap::new())
}

pub fn pusher_with_credentials(
    config: PushConfig,
    credentials: HashMap<String, Credential>,
) -> FakePusher {
    let credentials: Arc<dyn CredentialStore> = Arc::new(credentials);
    FakePusher::new(
        reqwest::Client::new(),
        credentials,
        config,
        Logger::new_quiet(),
    )
    .expect("valid config")
}

pub async fn requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
}

pub async fn requests_matching(server: &MockServer, verb: &str, prefix: &str) -> Vec<Request> {
    requests(server)
        .await
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path().starts_with(prefix))
        .collect()
}

/// Body of the single manifest PUT, parsed.
pub async fn pushed_manifest(server: &MockServer, repo: &str, tag: &str) -> Value {
    let puts = requests_matching(server, "PUT", &format!("/v2/{}/manifests/{}", repo, tag)).await;
    assert_eq!(puts.len(), 1, "expected exactly one manifest PUT");
    serde_json::from_slice(&puts[0].body).expect("pushed manifest is JSON")
}

pub fn history_config(manifest: &Value, index: usize) -> Value {
    let raw = manifest["history"][index]["v1Compatibility"]
        .as_str()
        .expect("v1Compatibility string");
    serde_json::from_str(raw).expect("v1Compatibility is JSON")
}

pub fn blob_sums(manifest: &Value) -> Vec<String> {
    manifest["fsLayers"]
        .as_array()
        .expect("fsLayers array")
        .iter()
        .map(|l| l["blobSum"].as_str().unwrap_or_default().to_string())
        .collect()
}
