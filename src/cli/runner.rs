//! Runner wiring configuration, credentials and the pusher together

use crate::cli::args::Args;
use crate::config::PushConfig;
use crate::credentials::{CredentialStore, DockerConfigStore};
use crate::error::{PusherError, Result};
use crate::logging::Logger;
use crate::pusher::{FakePusher, PushReport};
use reqwest::Client;
use std::sync::Arc;

pub struct Runner {
    config: PushConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let config = args.to_config();
        let output = Logger::new(config.debug);
        Self { config, output }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Run the fake push and return the process exit code.
    pub async fn run(&self) -> i32 {
        match self.execute().await {
            Ok(report) => {
                self.print_report(&report);
                0
            }
            Err(e) => {
                self.output.error(&e.to_string());
                if matches!(e, PusherError::ManifestPush(_)) {
                    self.output.error(
                        "The target tag may be partially updated; verify it manually before retrying",
                    );
                }
                e.exit_code()
            }
        }
    }

    async fn execute(&self) -> Result<PushReport> {
        let config = self.config.clone();
        config.validate()?;

        let credentials = self.load_credentials()?;
        let client = Client::builder()
            .build()
            .map_err(|e| PusherError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut pusher = FakePusher::new(client, credentials, config, self.output.clone())?;
        pusher.validate_endpoints().await?;
        pusher.fake_push().await
    }

    fn load_credentials(&self) -> Result<Arc<dyn CredentialStore>> {
        let Some(path) = DockerConfigStore::default_path(self.config.docker_config.as_deref())
        else {
            self.output
                .debug("No home directory found, continuing without stored credentials");
            return Ok(Arc::new(DockerConfigStore::default()));
        };

        let store = DockerConfigStore::load(&path)?;
        self.output.debug(&format!(
            "Loaded {} credential entries from {}",
            store.len(),
            path.display()
        ));
        Ok(Arc::new(store))
    }

    fn print_report(&self, report: &PushReport) {
        self.output.summary_kv(
            "Fake push summary",
            &[
                ("New tag", report.new_tag.clone()),
                ("Layers spliced", report.layers_spliced.to_string()),
                ("Layers in manifest", report.total_layers.to_string()),
                ("Blobs transferred", report.blobs_transferred.to_string()),
                ("Bytes transferred", self.output.format_size(report.bytes_transferred)),
                ("Elapsed", self.output.format_duration(self.output.elapsed())),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "registry-fake-pusher",
            "--src-reg",
            "http://127.0.0.1:9",
            "--src-repo",
            "app",
            "--src-tag",
            "v1",
            "--target-reg",
            "http://127.0.0.1:9",
            "--target-repo",
            "base",
            "--target-tag",
            "latest",
            "--new-tag",
            "grafted",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_runner_takes_settings_from_push_config() {
        let runner = Runner::new(args(&["--debug", "--docker-config", "/tmp/creds.json"]));
        assert!(runner.config().debug);
        assert_eq!(
            runner.config().docker_config.as_deref(),
            Some(std::path::Path::new("/tmp/creds.json"))
        );
    }

    #[tokio::test]
    async fn test_malformed_credential_file_is_setup_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let runner = Runner::new(args(&["--docker-config", path.as_str()]));
        assert_eq!(runner.run().await, 1);
    }

    #[tokio::test]
    async fn test_zero_layer_count_is_setup_failure() {
        let runner = Runner::new(args(&["--src-layer-count", "0"]));
        assert_eq!(runner.run().await, 1);
    }
}
