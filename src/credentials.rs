//! Registry credentials stored in a docker `config.json`

use crate::config::strip_scheme;
use crate::error::{PusherError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Username and password for one registry host
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lookup of stored credentials by registry host
pub trait CredentialStore: Send + Sync {
    fn credentials_for(&self, registry_host: &str) -> Option<Credential>;
}

impl CredentialStore for HashMap<String, Credential> {
    fn credentials_for(&self, registry_host: &str) -> Option<Credential> {
        self.get(strip_scheme(registry_host)).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    // Unused, but part of the file format
    #[allow(dead_code)]
    #[serde(default)]
    email: Option<String>,
}

/// Credentials decoded from a docker client config file
#[derive(Debug, Clone, Default)]
pub struct DockerConfigStore {
    entries: HashMap<String, Credential>,
}

impl DockerConfigStore {
    /// Resolve the config file: explicit path, then `$DOCKER_CONFIG`, then `~/.docker`.
    pub fn default_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        match std::env::var_os("DOCKER_CONFIG") {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join("config.json")),
            _ => dirs::home_dir().map(|home| home.join(".docker").join("config.json")),
        }
    }

    /// Load a config file; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            PusherError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| e.with_context(&format!("credential file {}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| PusherError::Config(format!("Invalid docker config: {}", e)))?;

        let mut entries = HashMap::new();
        for (address, entry) in file.auths {
            let Some(auth) = entry.auth.filter(|a| !a.is_empty()) else {
                continue;
            };
            let credential = decode_auth(&auth).map_err(|e| e.with_context(&address))?;
            entries.insert(strip_scheme(&address).to_string(), credential);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for DockerConfigStore {
    fn credentials_for(&self, registry_host: &str) -> Option<Credential> {
        self.entries.credentials_for(registry_host)
    }
}

/// Decode a base64 `user:password` pair
fn decode_auth(auth: &str) -> Result<Credential> {
    let decoded = STANDARD
        .decode(auth.trim())
        .map_err(|e| PusherError::Config(format!("Invalid base64 in auth entry: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| PusherError::Config(format!("Auth entry is not UTF-8: {}", e)))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| PusherError::Config("Invalid auth configuration file".to_string()))?;

    Ok(Credential::new(username, password.trim_end_matches('\0')))
}
