//! Schema 1 image manifest model
//!
//! Index 0 of `fsLayers` and `history` is the topmost layer; both sequences
//! always have the same length.

use crate::error::{PusherError, Result};
use serde::{Deserialize, Serialize};

pub const MEDIA_TYPE_SIGNED: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const MEDIA_TYPE_UNSIGNED: &str = "application/vnd.docker.distribution.manifest.v1+json";

/// Content digest of one layer blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: String,
}

/// Serialized per-layer image config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

/// One layer of an image: its blob and its history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayer {
    pub fs_layer: FsLayer,
    pub history: History,
}

impl ImageLayer {
    pub fn digest(&self) -> &str {
        &self.fs_layer.blob_sum
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub architecture: String,
    pub fs_layers: Vec<FsLayer>,
    pub history: Vec<History>,
    /// Signatures of the loaded manifest; replaced on signing
    #[serde(default, skip_serializing)]
    pub signatures: Option<serde_json::Value>,
}

impl Manifest {
    /// Decode a manifest body returned by the registry
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| PusherError::ManifestLoad(format!("Malformed manifest JSON: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fs_layers.is_empty() {
            return Err(PusherError::ManifestLoad(
                "Manifest must contain at least one layer".to_string(),
            ));
        }
        if self.fs_layers.len() != self.history.len() {
            return Err(PusherError::ManifestLoad(format!(
                "Manifest has {} fsLayers but {} history entries",
                self.fs_layers.len(),
                self.history.len()
            )));
        }
        Ok(())
    }

    pub fn layer_count(&self) -> usize {
        self.fs_layers.len()
    }

    /// Layer at `index`, counted from the top
    pub fn layer(&self, index: usize) -> Result<ImageLayer> {
        match (self.fs_layers.get(index), self.history.get(index)) {
            (Some(fs_layer), Some(history)) => Ok(ImageLayer {
                fs_layer: fs_layer.clone(),
                history: history.clone(),
            }),
            _ => Err(PusherError::LayerOutOfRange {
                index,
                count: self.layer_count(),
            }),
        }
    }

    /// Stack `layer` on top under a new tag; existing entries shift down by one.
    pub fn overlay(&mut self, layer: ImageLayer, tag: &str) {
        self.tag = tag.to_string();
        self.fs_layers.insert(0, layer.fs_layer);
        self.history.insert(0, layer.history);
    }
}
