//! Per-layer image configuration (the `v1Compatibility` blob) and the
//! patching that re-parents a layer onto another image's lineage.

use crate::error::{PusherError, Result};
use crate::image::manifest::{History, ImageLayer};
use crate::logging::Logger;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Runtime configuration of a container (`config` / `container_config`).
///
/// Only the fields taking part in the merge are typed; everything else is
/// carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "Image", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "User", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(rename = "WorkingDir", default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(rename = "Env", default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(
        rename = "Cmd",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub cmd: Option<Vec<String>>,
    #[serde(
        rename = "Entrypoint",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub entrypoint: Option<Vec<String>>,
    #[serde(rename = "Labels", default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(rename = "Volumes", default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<BTreeMap<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parsed `v1Compatibility` history entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config: Option<RunConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PusherError::ConfigParse(format!("Invalid image config JSON: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PusherError::ConfigParse(format!("Cannot serialize image config: {}", e)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrSeq {
    One(String),
    Many(Vec<String>),
}

// Docker accepts `"Cmd": "sh"` as shorthand for `["sh"]`.
fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrSeq>::deserialize(deserializer)? {
        Some(StringOrSeq::One(value)) => Some(vec![value]),
        Some(StringOrSeq::Many(values)) => Some(values),
        None => None,
    })
}

fn env_name(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(name, _)| name)
}

/// Union of environment entries by variable name; source entries win.
pub fn merge_env(source: &[String], target: &[String]) -> Vec<String> {
    if source.is_empty() {
        return target.to_vec();
    }

    let mut merged = source.to_vec();
    for entry in target {
        let name = env_name(entry);
        if !merged.iter().any(|existing| env_name(existing) == name) {
            merged.push(entry.clone());
        }
    }
    merged
}

/// Map union where keys already present in `source` are never overridden.
pub fn merge_map<V: Clone>(
    source: Option<&BTreeMap<String, V>>,
    target: Option<&BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match (source, target) {
        (None, None) => None,
        (source, target) => {
            let mut merged = source.cloned().unwrap_or_default();
            for (key, value) in target.into_iter().flatten() {
                merged.entry(key.clone()).or_insert_with(|| value.clone());
            }
            Some(merged)
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn is_unset(value: &Option<Vec<String>>) -> bool {
    value.as_ref().is_none_or(Vec::is_empty)
}

/// Fill the unset fields of `source` from `target`.
pub fn merge_run_config(source: &RunConfig, target: &RunConfig) -> RunConfig {
    let mut merged = source.clone();

    if is_blank(&merged.user) && !is_blank(&target.user) {
        merged.user = target.user.clone();
    }
    if is_blank(&merged.working_dir) && !is_blank(&target.working_dir) {
        merged.working_dir = target.working_dir.clone();
    }
    if is_unset(&merged.cmd) && !is_unset(&target.cmd) {
        merged.cmd = target.cmd.clone();
    }
    if is_unset(&merged.entrypoint) && !is_unset(&target.entrypoint) {
        merged.entrypoint = target.entrypoint.clone();
    }

    merged.env = match (&source.env, &target.env) {
        (None, None) => None,
        (source_env, target_env) => Some(merge_env(
            source_env.as_deref().unwrap_or_default(),
            target_env.as_deref().unwrap_or_default(),
        )),
    };
    merged.labels = merge_map(source.labels.as_ref(), target.labels.as_ref());
    merged.volumes = merge_map(source.volumes.as_ref(), target.volumes.as_ref());

    merged
}

/// Random 256-bit hex identifier in the format docker uses for layer ids
pub fn generate_random_id() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        let id = hex::encode(bytes);
        // An all-digit id would be ambiguous with a numeric truncated id
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return id;
        }
    }
}

/// Derives the config of a layer grafted from one image onto another
#[derive(Debug, Clone)]
pub struct LayerConfigPatcher {
    output: Logger,
}

impl LayerConfigPatcher {
    pub fn new(output: Logger) -> Self {
        Self { output }
    }

    /// Patch raw `v1Compatibility` JSON: source layer running on top of target.
    pub fn patch(&self, source: &str, target: &str) -> Result<String> {
        let source = ImageConfig::from_json(source).map_err(|e| e.with_context("source layer"))?;
        let target = ImageConfig::from_json(target).map_err(|e| e.with_context("target layer"))?;
        if target.id.is_empty() {
            return Err(PusherError::ConfigParse(
                "target layer: image config has no id".to_string(),
            ));
        }
        self.patch_config(source, &target).to_json()
    }

    pub fn patch_config(&self, source: ImageConfig, target: &ImageConfig) -> ImageConfig {
        self.rebase(source, target, generate_random_id())
    }

    fn rebase(&self, mut source: ImageConfig, target: &ImageConfig, id: String) -> ImageConfig {
        self.output.debug(&format!(
            "Re-parenting layer {} onto {}",
            short_id(&source.id),
            short_id(&target.id)
        ));

        source.id = id;
        source.parent = Some(target.id.clone());

        let target_committed = target.config.clone().unwrap_or_default();
        let mut container_config = merge_run_config(
            &source.container_config.take().unwrap_or_default(),
            &target_committed,
        );
        container_config.image = Some(target.id.clone());

        let committed = source.config.take().unwrap_or_default();
        source.config = Some(merge_run_config(&committed, &container_config));
        source.container_config = Some(container_config);

        source
    }

    /// Build the layer that re-parents `source` onto `target`'s top.
    pub fn splice(&self, source: &ImageLayer, target: &ImageLayer) -> Result<ImageLayer> {
        let v1_compatibility = self
            .patch(&source.history.v1_compatibility, &target.history.v1_compatibility)
            .map_err(|e| e.with_context(&format!("splicing {}", source.digest())))?;

        Ok(ImageLayer {
            fs_layer: source.fs_layer.clone(),
            history: History { v1_compatibility },
        })
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
