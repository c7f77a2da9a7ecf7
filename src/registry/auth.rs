//! Authentication module for Docker registry access
//!
//! Probes `/v2/` for a `WWW-Authenticate` challenge and, when one is
//! present, exchanges the stored credentials for a bearer token scoped to
//! `repository:{name}:push,pull`. Tokens are never cached: each call
//! re-probes, since every token is scoped to a single repository.

use crate::config::RegistryLocation;
use crate::credentials::{Credential, CredentialStore};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use reqwest::{Client, StatusCode, header::WWW_AUTHENTICATE};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Obtains bearer tokens for registry + repository pairs
#[derive(Clone)]
pub struct Auth {
    client: Client,
    credentials: Arc<dyn CredentialStore>,
    output: Logger,
}

impl Auth {
    pub fn new(client: Client, credentials: Arc<dyn CredentialStore>, output: Logger) -> Self {
        Self {
            client,
            credentials,
            output,
        }
    }

    /// Use `preset` when given, otherwise run the challenge flow.
    pub async fn resolve_token(
        &self,
        location: &RegistryLocation,
        preset: Option<&str>,
    ) -> Result<String> {
        match preset.filter(|token| !token.is_empty()) {
            Some(token) => {
                self.output
                    .debug(&format!("Using pre-obtained token for {}", location.repository));
                Ok(token.to_string())
            }
            None => self.get_token(location).await,
        }
    }

    /// Bearer token for `location`, or an empty string when no auth is required.
    pub async fn get_token(&self, location: &RegistryLocation) -> Result<String> {
        let Some(challenge) = self.get_auth_challenge(location).await? else {
            self.output.debug(&format!(
                "No authentication challenge from {} - registry does not require auth",
                location.registry
            ));
            return Ok(String::new());
        };

        self.output.debug(&format!(
            "Auth challenge received: realm={}, service={}",
            challenge.realm, challenge.service
        ));

        let credential = self
            .credentials
            .credentials_for(location.registry_host())
            .unwrap_or_default();
        if credential.username.is_empty() {
            self.output.debug(&format!(
                "No stored credentials for {}, requesting anonymous token",
                location.registry_host()
            ));
        }

        self.request_token(&challenge, &location.repository, &credential)
            .await
    }

    async fn get_auth_challenge(
        &self,
        location: &RegistryLocation,
    ) -> Result<Option<AuthChallenge>> {
        let url = location.ping_url();
        self.output.debug(&format!("Pinging registry: {}", url));

        let response = self.client.get(&url).send().await.map_err(|e| {
            PusherError::Auth(NetworkErrorHandler::describe(&e, "registry ping"))
        })?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let header = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .ok_or_else(|| {
                PusherError::Auth(format!("401 from {} without WWW-Authenticate header", url))
            })?
            .to_str()
            .map_err(|e| PusherError::Auth(format!("Invalid WWW-Authenticate header: {}", e)))?;

        parse_challenge(header).map(Some)
    }

    /// Anonymous requests (empty username) carry no `Authorization` header.
    async fn request_token(
        &self,
        challenge: &AuthChallenge,
        repository: &str,
        credential: &Credential,
    ) -> Result<String> {
        let scope = format!("repository:{}:push,pull", repository);
        self.output
            .debug(&format!("Requesting token from {} for {}", challenge.realm, scope));

        let mut request = self.client.get(&challenge.realm).query(&[
            ("service", challenge.service.as_str()),
            ("scope", scope.as_str()),
            ("account", credential.username.as_str()),
        ]);
        if !credential.username.is_empty() {
            request = request.basic_auth(&credential.username, Some(&credential.password));
        }

        let response = request.send().await.map_err(|e| {
            PusherError::Auth(NetworkErrorHandler::describe(&e, "token request"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PusherError::Auth(HttpErrorHandler::describe_auth_status(
                status,
                &error_text,
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PusherError::Auth(NetworkErrorHandler::describe(&e, "token response"))
        })?;
        let token_response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| PusherError::Auth(format!("Failed to parse token response: {}", e)))?;

        let token = token_response
            .token
            .or(token_response.access_token)
            .unwrap_or_default();
        self.output
            .debug(&format!("Token obtained (length: {} chars)", token.len()));
        Ok(token)
    }
}

/// Parse `Bearer realm="...",service="...",scope="..."`.
pub fn parse_challenge(header: &str) -> Result<AuthChallenge> {
    let header = header.trim();
    let (scheme, params_str) = header.split_once(' ').unwrap_or((header, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(PusherError::Auth(format!(
            "Unsupported authentication scheme: {}",
            scheme
        )));
    }

    let mut params = HashMap::new();
    for param in params_str.split(',') {
        if let Some((key, value)) = param.split_once('=') {
            params.insert(key.trim(), value.trim());
        }
    }

    let realm = params
        .get("realm")
        .map(|r| r.trim_matches('"'))
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            PusherError::Auth(format!("Auth challenge missing realm parameter: {}", header))
        })?;
    let service = params
        .get("service")
        .map(|s| s.trim_matches('"'))
        .unwrap_or_default();

    Ok(AuthChallenge {
        realm: realm.to_string(),
        service: service.to_string(),
    })
}
