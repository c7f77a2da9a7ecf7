//! Command-line argument parsing

use crate::config::{PushConfig, RegistryLocation};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-fake-pusher")]
#[command(about = "Graft the top layers of one registry image onto another image under a new tag")]
#[command(version, author)]
pub struct Args {
    /// Source registry host, with or without scheme
    #[arg(long = "src-reg", default_value = "registry.example.com")]
    pub src_registry: String,

    /// Source repository holding the layers to copy
    #[arg(long = "src-repo")]
    pub src_repository: String,

    /// Source tag holding the layers to copy
    #[arg(long = "src-tag")]
    pub src_tag: String,

    /// Number of source layers, from the top, to graft
    #[arg(long = "src-layer-count", default_value = "1")]
    pub src_layer_count: usize,

    /// Target registry host, with or without scheme
    #[arg(long = "target-reg", default_value = "registry.example.com")]
    pub target_registry: String,

    /// Target repository the layers are grafted into
    #[arg(long = "target-repo")]
    pub target_repository: String,

    /// Existing target tag providing the base image
    #[arg(long = "target-tag")]
    pub target_tag: String,

    /// Tag created in the target repository
    #[arg(long = "new-tag")]
    pub new_tag: String,

    /// Pre-obtained bearer token for the source repository
    #[arg(long = "src-jwt")]
    pub src_jwt: Option<String>,

    /// Pre-obtained bearer token for the target repository
    #[arg(long = "target-jwt")]
    pub target_jwt: Option<String>,

    /// Docker client config holding registry credentials
    #[arg(long = "docker-config")]
    pub docker_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long = "debug", short = 'd')]
    pub debug: bool,
}

impl Args {
    /// Fill unset tokens from `FAKE_PUSHER_SRC_JWT` / `FAKE_PUSHER_TARGET_JWT`.
    pub fn from_env(mut self) -> Self {
        if self.src_jwt.is_none() {
            self.src_jwt = std::env::var("FAKE_PUSHER_SRC_JWT").ok();
        }
        if self.target_jwt.is_none() {
            self.target_jwt = std::env::var("FAKE_PUSHER_TARGET_JWT").ok();
        }
        self
    }

    pub fn to_config(&self) -> PushConfig {
        PushConfig {
            source: RegistryLocation::new(&self.src_registry, &self.src_repository, &self.src_tag),
            target: RegistryLocation::new(
                &self.target_registry,
                &self.target_repository,
                &self.target_tag,
            ),
            new_tag: self.new_tag.clone(),
            layer_count: self.src_layer_count,
            source_token: self.src_jwt.clone().filter(|t| !t.is_empty()),
            target_token: self.target_jwt.clone().filter(|t| !t.is_empty()),
            docker_config: self.docker_config.clone(),
            debug: self.debug,
        }
    }
}
