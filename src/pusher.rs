//! Fake push orchestration
//!
//! Loads the source and target manifests, grafts the requested number of
//! source layers onto the target's top, copies the layer blobs when the
//! repositories differ, and pushes the resulting manifest once under the new
//! tag. Nothing is rolled back on failure; because the manifest push comes
//! last, a failure before it leaves the target tag untouched.

use crate::config::PushConfig;
use crate::credentials::CredentialStore;
use crate::error::{PusherError, Result};
use crate::image::LayerConfigPatcher;
use crate::logging::Logger;
use crate::registry::{Auth, BlobTransferer, EndpointResolver, ManifestClient};
use reqwest::Client;
use std::sync::Arc;

/// Outcome of a successful fake push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub new_tag: String,
    pub layers_spliced: usize,
    pub total_layers: usize,
    pub blobs_transferred: usize,
    pub bytes_transferred: u64,
}

pub struct FakePusher {
    client: Client,
    auth: Auth,
    config: PushConfig,
    output: Logger,
}

impl FakePusher {
    pub fn new(
        client: Client,
        credentials: Arc<dyn CredentialStore>,
        config: PushConfig,
        output: Logger,
    ) -> Result<Self> {
        config.validate()?;
        let auth = Auth::new(client.clone(), credentials, output.clone());
        Ok(Self {
            client,
            auth,
            config,
            output,
        })
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Pin a working scheme for both registries.
    pub async fn validate_endpoints(&mut self) -> Result<()> {
        let resolver = EndpointResolver::new(self.client.clone(), self.output.clone());

        let source = resolver.resolve(&self.config.source.registry).await?;
        let target = if self.config.target.registry == self.config.source.registry {
            source.clone()
        } else {
            resolver.resolve(&self.config.target.registry).await?
        };

        self.output.step(&format!("Source registry: {}", source));
        self.output.step(&format!("Target registry: {}", target));
        self.config.source.registry = source;
        self.config.target.registry = target;
        Ok(())
    }

    pub async fn fake_push(&self) -> Result<PushReport> {
        let config = &self.config;
        self.output.section("Fake push");
        self.output.info(&format!(
            "Grafting {} layer(s) of {} onto {} as tag {}",
            config.layer_count, config.source, config.target, config.new_tag
        ));

        let source_token = self
            .auth
            .resolve_token(&config.source, config.source_token.as_deref())
            .await
            .map_err(|e| e.with_context("source"))?;
        let source = ManifestClient::load(
            self.client.clone(),
            config.source.clone(),
            source_token,
            self.output.clone(),
        )
        .await
        .map_err(|e| e.with_context("source"))?;

        let available = source.manifest().layer_count();
        if config.layer_count > available {
            return Err(PusherError::LayerOutOfRange {
                index: config.layer_count - 1,
                count: available,
            });
        }

        let target_token = self
            .auth
            .resolve_token(&config.target, config.target_token.as_deref())
            .await
            .map_err(|e| e.with_context("target"))?;
        let mut target = ManifestClient::load(
            self.client.clone(),
            config.target.clone(),
            target_token,
            self.output.clone(),
        )
        .await
        .map_err(|e| e.with_context("target"))?;

        let patcher = LayerConfigPatcher::new(self.output.clone());
        let transferer = BlobTransferer::new(self.client.clone(), self.output.clone());
        let cross_repository = !config.source.same_repository(&config.target);

        let mut blobs_transferred = 0;
        let mut bytes_transferred = 0;

        // Deepest selected layer first, so each grafted layer's parent is the
        // entry directly below it and the final order matches the source.
        for index in (0..config.layer_count).rev() {
            let source_layer = source.manifest().layer(index)?;
            let target_top = target.manifest().layer(0)?;
            self.output.step(&format!(
                "Splicing source layer {} ({}) onto {}",
                index,
                source_layer.digest(),
                target_top.digest()
            ));

            let spliced = patcher.splice(&source_layer, &target_top)?;
            target.overlay(spliced, &config.new_tag);

            if cross_repository {
                let source_token = self
                    .auth
                    .resolve_token(&config.source, config.source_token.as_deref())
                    .await
                    .map_err(|e| e.with_context("source"))?;
                let target_token = self
                    .auth
                    .resolve_token(&config.target, config.target_token.as_deref())
                    .await
                    .map_err(|e| e.with_context("target"))?;

                bytes_transferred += transferer
                    .transfer(
                        &config.source,
                        &config.target,
                        source_layer.digest(),
                        &source_token,
                        &target_token,
                    )
                    .await?;
                blobs_transferred += 1;
            }
        }

        let signed = target.sign()?;
        target.push(&signed).await?;

        let report = PushReport {
            new_tag: config.new_tag.clone(),
            layers_spliced: config.layer_count,
            total_layers: target.manifest().layer_count(),
            blobs_transferred,
            bytes_transferred,
        };
        self.output
            .success(&format!("Pushed {}", target.location()));
        Ok(report)
    }
}
