//! Configuration module for registry locations and push settings

use crate::error::{PusherError, Result};
use std::path::PathBuf;

/// Where a manifest lives: `{registry}/v2/{repository}/manifests/{tag}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLocation {
    /// Registry base URL; carries a scheme once endpoints are validated
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl RegistryLocation {
    pub fn new(registry: &str, repository: &str, tag: &str) -> Self {
        Self {
            registry: registry.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }

    pub fn ping_url(&self) -> String {
        format!("{}/v2/", self.registry)
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/v2/{}/manifests/{}", self.registry, self.repository, self.tag)
    }

    pub fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{}", self.registry, self.repository, digest)
    }

    pub fn upload_url(&self) -> String {
        format!("{}/v2/{}/blobs/uploads/", self.registry, self.repository)
    }

    /// Registry host without scheme, as used for credential lookup
    pub fn registry_host(&self) -> &str {
        strip_scheme(&self.registry)
    }

    /// Same registry and repository; tags are irrelevant for blob identity
    pub fn same_repository(&self, other: &RegistryLocation) -> bool {
        self.registry == other.registry && self.repository == other.repository
    }
}

impl std::fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry_host(), self.repository, self.tag)
    }
}

pub(crate) fn strip_scheme(registry: &str) -> &str {
    registry
        .strip_prefix("https://")
        .or_else(|| registry.strip_prefix("http://"))
        .unwrap_or(registry)
        .trim_end_matches('/')
}

/// Everything one fake push needs, resolved at startup
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub source: RegistryLocation,
    pub target: RegistryLocation,
    pub new_tag: String,
    /// Number of source layers, counted from the top, to graft
    pub layer_count: usize,
    /// Pre-obtained bearer token for the source; bypasses the auth flow
    pub source_token: Option<String>,
    /// Pre-obtained bearer token for the target; bypasses the auth flow
    pub target_token: Option<String>,
    pub docker_config: Option<PathBuf>,
    pub debug: bool,
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("source registry", &self.source.registry),
            ("source repository", &self.source.repository),
            ("source tag", &self.source.tag),
            ("target registry", &self.target.registry),
            ("target repository", &self.target.repository),
            ("target tag", &self.target.tag),
            ("new tag", &self.new_tag),
        ] {
            if value.trim().is_empty() {
                return Err(PusherError::Config(format!("{} cannot be empty", name)));
            }
        }

        if self.layer_count == 0 {
            return Err(PusherError::Config(
                "Layer count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
