//! Manifest operations for registry client
//!
//! Implements the schema 1 manifest round trip:
//! - Manifest download (GET /v2/{name}/manifests/{tag})
//! - Layer overlay and retag in memory
//! - Signing with an ephemeral key
//! - Manifest upload (PUT /v2/{name}/manifests/{tag})

use crate::config::RegistryLocation;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{PusherError, Result};
use crate::image::manifest::{MEDIA_TYPE_SIGNED, MEDIA_TYPE_UNSIGNED};
use crate::image::{ImageLayer, Manifest, SignedManifest, sign_manifest};
use crate::logging::Logger;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// Owns one manifest from load until push
pub struct ManifestClient {
    client: Client,
    location: RegistryLocation,
    token: String,
    manifest: Manifest,
    output: Logger,
}

impl ManifestClient {
    /// Fetch the manifest at `location`.
    pub async fn load(
        client: Client,
        location: RegistryLocation,
        token: String,
        output: Logger,
    ) -> Result<Self> {
        let url = location.manifest_url();
        output.debug(&format!("Loading manifest from {}", url));

        let mut request = client
            .get(&url)
            .header(ACCEPT, format!("{}, {}", MEDIA_TYPE_SIGNED, MEDIA_TYPE_UNSIGNED));
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        let response = request.send().await.map_err(|e| {
            PusherError::ManifestLoad(NetworkErrorHandler::describe(&e, "manifest load"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::ManifestLoad(HttpErrorHandler::describe_status(
                status,
                &error_text,
                &format!("manifest load from {}", url),
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PusherError::ManifestLoad(NetworkErrorHandler::describe(&e, "manifest load"))
        })?;
        let manifest = Manifest::from_slice(&body).map_err(|e| e.with_context(&url))?;

        output.debug(&format!(
            "Loaded manifest {} with {} layers",
            location,
            manifest.layer_count()
        ));

        Ok(Self {
            client,
            location,
            token,
            manifest,
            output,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn location(&self) -> &RegistryLocation {
        &self.location
    }

    /// Stack `layer` on top and retag both the manifest and its location.
    pub fn overlay(&mut self, layer: ImageLayer, new_tag: &str) {
        self.output.debug(&format!(
            "Overlaying layer {} onto {} as tag {}",
            layer.digest(),
            self.location,
            new_tag
        ));
        self.location.tag = new_tag.to_string();
        self.manifest.overlay(layer, new_tag);
    }

    pub fn sign(&self) -> Result<SignedManifest> {
        let signed = sign_manifest(&self.manifest).map_err(|e| e.with_context("manifest sign"))?;
        self.output.debug(&format!(
            "Signed manifest ({} bytes) with ephemeral key {}",
            signed.raw.len(),
            signed.key_id
        ));
        Ok(signed)
    }

    /// PUT the signed bytes to the manifest URL of the current tag.
    pub async fn push(&self, signed: &SignedManifest) -> Result<()> {
        let url = self.location.manifest_url();
        self.output.debug(&format!("Pushing manifest to {}", url));

        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, MEDIA_TYPE_SIGNED)
            .body(signed.raw.clone());
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await.map_err(|e| {
            PusherError::ManifestPush(NetworkErrorHandler::describe(&e, "manifest push"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::ManifestPush(HttpErrorHandler::describe_status(
                status,
                &error_text,
                &format!("manifest push to {}", url),
            )));
        }

        self.output
            .debug(&format!("Manifest push to {} succeeded ({})", url, status));
        Ok(())
    }
}
