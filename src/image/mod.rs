//! Image model: schema 1 manifests, per-layer configs and manifest signing
//!
//! [`Manifest`] is the structure served by the registry, [`LayerConfigPatcher`]
//! rewrites a layer's `v1Compatibility` blob when it is grafted onto another
//! lineage, and [`sign_manifest`] produces the signed bytes for the push.

pub mod config;
pub mod manifest;
pub mod signature;

pub use config::{ImageConfig, LayerConfigPatcher, RunConfig};
pub use manifest::{FsLayer, History, ImageLayer, Manifest};
pub use signature::{SignedManifest, sign_manifest};
