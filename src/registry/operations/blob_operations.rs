//! Blob operations for registry client
//!
//! Copies one content-addressed blob between repositories:
//! - Blob download (GET /v2/{name}/blobs/{digest}), buffered in memory
//! - Upload session start (POST /v2/{name}/blobs/uploads/)
//! - Monolithic upload (PUT {location}&digest={digest})

use crate::config::RegistryLocation;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Client, RequestBuilder};
use url::Url;

#[derive(Clone)]
pub struct BlobTransferer {
    client: Client,
    output: Logger,
}

fn with_token(request: RequestBuilder, token: &str) -> RequestBuilder {
    if token.is_empty() {
        request
    } else {
        request.bearer_auth(token)
    }
}

impl BlobTransferer {
    pub fn new(client: Client, output: Logger) -> Self {
        Self { client, output }
    }

    /// Copy `digest` from `source` to `target`; returns the number of bytes moved.
    pub async fn transfer(
        &self,
        source: &RegistryLocation,
        target: &RegistryLocation,
        digest: &str,
        source_token: &str,
        target_token: &str,
    ) -> Result<u64> {
        let data = self.download(source, digest, source_token).await?;
        let size = data.len() as u64;

        let location = self.start_upload(target, target_token).await?;
        self.complete_upload(&location, data, digest, target_token)
            .await?;

        self.output.debug(&format!(
            "Transferred blob {} ({}) to {}",
            digest,
            self.output.format_size(size),
            target
        ));
        Ok(size)
    }

    async fn download(
        &self,
        source: &RegistryLocation,
        digest: &str,
        token: &str,
    ) -> Result<Vec<u8>> {
        let url = source.blob_url(digest);
        self.output.debug(&format!("Downloading blob from {}", url));

        let response = with_token(self.client.get(&url), token)
            .send()
            .await
            .map_err(|e| {
                PusherError::BlobTransfer(NetworkErrorHandler::describe(&e, "blob download"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::BlobTransfer(HttpErrorHandler::describe_status(
                status,
                &error_text,
                &format!("blob download from {}", url),
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PusherError::BlobTransfer(NetworkErrorHandler::describe(&e, "blob download"))
        })?;
        Ok(body.to_vec())
    }

    /// Open an upload session and return its absolute location
    async fn start_upload(&self, target: &RegistryLocation, token: &str) -> Result<String> {
        let url = target.upload_url();
        self.output.debug(&format!("Starting blob upload at {}", url));

        let response = with_token(self.client.post(&url), token)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| {
                PusherError::BlobTransfer(NetworkErrorHandler::describe(&e, "blob upload start"))
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::BlobTransfer(HttpErrorHandler::describe_status(
                status,
                &error_text,
                &format!("blob upload start at {}", url),
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| {
                PusherError::BlobTransfer(format!("No Location header in upload response from {}", url))
            })?
            .to_str()
            .map_err(|e| PusherError::BlobTransfer(format!("Invalid Location header: {}", e)))?;

        resolve_location(&target.registry, location)
    }

    async fn complete_upload(
        &self,
        location: &str,
        data: Vec<u8>,
        digest: &str,
        token: &str,
    ) -> Result<()> {
        let url = upload_url_with_digest(location, digest);
        let size = data.len();
        self.output.debug(&format!(
            "Uploading {} to {}",
            self.output.format_size(size as u64),
            url
        ));

        let response = with_token(self.client.put(&url), token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                PusherError::BlobTransfer(NetworkErrorHandler::describe(&e, "blob upload"))
            })?;

        let status = response.status();
        if status.as_u16() > 299 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::BlobTransfer(HttpErrorHandler::describe_status(
                status,
                &error_text,
                &format!("blob upload of {}", digest),
            )));
        }
        Ok(())
    }
}

/// Registries may answer with a path-only `Location`
fn resolve_location(registry: &str, location: &str) -> Result<String> {
    let base = Url::parse(registry)
        .map_err(|e| PusherError::BlobTransfer(format!("Invalid registry URL {}: {}", registry, e)))?;
    base.join(location)
        .map(String::from)
        .map_err(|e| PusherError::BlobTransfer(format!("Invalid upload location {}: {}", location, e)))
}

fn upload_url_with_digest(location: &str, digest: &str) -> String {
    let separator = if location.contains('?') { '&' } else { '?' };
    format!("{}{}digest={}", location, separator, digest)
}
