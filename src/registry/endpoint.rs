//! Registry endpoint validation
//!
//! A registry given without a scheme is probed over `https` first and
//! `http` second; the first scheme that answers at all is kept for the rest
//! of the run. An explicit scheme is probed as-is.

use crate::error::{PusherError, Result};
use crate::error::handlers::NetworkErrorHandler;
use crate::logging::Logger;
use reqwest::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// Order in which schemes are tried for a bare host
pub const PROBE_ORDER: [Scheme; 2] = [Scheme::Https, Scheme::Http];

fn has_scheme(registry: &str) -> bool {
    registry.starts_with("https://") || registry.starts_with("http://")
}

pub struct EndpointResolver {
    client: Client,
    output: Logger,
}

impl EndpointResolver {
    pub fn new(client: Client, output: Logger) -> Self {
        Self { client, output }
    }

    /// Registry base URL with a working scheme
    pub async fn resolve(&self, registry: &str) -> Result<String> {
        let registry = registry.trim_end_matches('/');
        if has_scheme(registry) {
            self.probe(registry).await.map_err(|e| {
                PusherError::EndpointUnreachable(format!("registry {} is not accessible: {}", registry, e))
            })?;
            return Ok(registry.to_string());
        }
        self.try_scheme(registry, &PROBE_ORDER).await
    }

    /// First reachable `{scheme}://{host}` in `schemes` order.
    pub async fn try_scheme(&self, host: &str, schemes: &[Scheme]) -> Result<String> {
        let mut failures = Vec::new();
        for scheme in schemes {
            let candidate = format!("{}://{}", scheme.as_str(), host);
            match self.probe(&candidate).await {
                Ok(()) => {
                    self.output.debug(&format!("Registry {} reachable at {}", host, candidate));
                    return Ok(candidate);
                }
                Err(e) => {
                    self.output.debug(&format!("Probe of {} failed: {}", candidate, e));
                    failures.push(e);
                }
            }
        }
        Err(PusherError::EndpointUnreachable(format!(
            "registry {} is not accessible over {}: {}",
            host,
            schemes
                .iter()
                .map(Scheme::as_str)
                .collect::<Vec<_>>()
                .join(" or "),
            failures.join("; ")
        )))
    }

    /// Any HTTP response counts as reachable.
    async fn probe(&self, url: &str) -> std::result::Result<(), String> {
        self.client
            .get(url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| NetworkErrorHandler::describe(&e, "registry probe"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_order_is_https_first() {
        assert_eq!(PROBE_ORDER, [Scheme::Https, Scheme::Http]);
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://r.io"));
        assert!(has_scheme("http://localhost:5000"));
        assert!(!has_scheme("r.io"));
        assert!(!has_scheme("httpbin.org"));
    }

    #[tokio::test]
    async fn test_unreachable_host_reports_every_scheme() {
        let resolver = EndpointResolver::new(Client::new(), Logger::new_quiet());
        // port 9 (discard) on loopback is closed in test environments
        let err = resolver
            .try_scheme("127.0.0.1:9", &PROBE_ORDER)
            .await
            .unwrap_err();
        match err {
            PusherError::EndpointUnreachable(msg) => assert!(msg.contains("https or http")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
