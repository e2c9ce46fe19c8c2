//! Command-line and environment configuration for the `qrport` binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::director::PublishSettings;
use crate::orchestrator::PublishOrchestrator;
use crate::session::{Backend, Provider};
use crate::store::MemoryStore;

/// Runtime configuration for the `qrport` binary.
///
/// Every flag can also come from a `QRPORT_*` environment variable or a `.env` file in the
/// working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "qrport",
    version,
    about = "Encode content into QR code images and publish them to an object-storage bucket"
)]
pub struct CliArgs {
    /// Log level used when `RUST_LOG` is not set: debug, info, warn or error.
    ///
    /// Environment variable: `QRPORT_LOG_LEVEL`
    #[arg(long, env = "QRPORT_LOG_LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,

    /// Storage provider: `aws` for S3 or S3-compatible endpoints, `memory` for an in-process
    /// account that lives as long as the command.
    ///
    /// Environment variable: `QRPORT_PROVIDER`
    #[arg(long, env = "QRPORT_PROVIDER", default_value_t = String::from("aws"))]
    pub provider: String,

    /// AWS shared-credentials file. A leading `~` expands to `$HOME`.
    ///
    /// Environment variable: `QRPORT_CREDENTIALS`
    #[arg(long, env = "QRPORT_CREDENTIALS", default_value = "~/.aws/credentials")]
    pub credentials: PathBuf,

    /// Profile section inside the credentials file.
    ///
    /// Environment variable: `QRPORT_PROFILE`
    #[arg(long, env = "QRPORT_PROFILE", default_value_t = String::from("default"))]
    pub profile: String,

    /// Region the bucket lives in.
    ///
    /// Environment variable: `QRPORT_REGION`
    #[arg(long, env = "QRPORT_REGION", default_value_t = String::from("us-west-2"))]
    pub region: String,

    /// S3-compatible endpoint such as `http://localhost:9000`. Implies path-style URLs.
    ///
    /// Environment variable: `QRPORT_ENDPOINT`
    #[arg(long, env = "QRPORT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Destination bucket, created on first use.
    ///
    /// Environment variable: `QRPORT_BUCKET`
    #[arg(long, env = "QRPORT_BUCKET", default_value_t = String::from("qrport-generated"))]
    pub bucket: String,

    /// Directory generated images are written to before upload. Files are not cleaned up.
    ///
    /// Environment variable: `QRPORT_SCRATCH_DIR`
    #[arg(long, env = "QRPORT_SCRATCH_DIR", default_value = ".qr/generated")]
    pub scratch_dir: PathBuf,

    /// Upper bound, in seconds, on a single remote action (provision plus upload).
    ///
    /// Environment variable: `QRPORT_PUBLISH_TIMEOUT_SECS`
    #[arg(long, env = "QRPORT_PUBLISH_TIMEOUT_SECS", default_value_t = 5)]
    pub publish_timeout_secs: u64,

    /// Overall deadline, in seconds, for one command.
    ///
    /// Environment variable: `QRPORT_REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "QRPORT_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encode content, publish the image and print its URL.
    Generate {
        /// Text to encode.
        #[arg(long)]
        content: String,

        /// Pixels per module.
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        size: i64,

        /// L0 (most capacity) to L3 (most redundancy).
        #[arg(long, default_value_t = String::from("L0"))]
        recovery_level: String,

        /// Object key and file stem; a random UUID when omitted.
        #[arg(long)]
        id: Option<String>,
    },
    /// List the buckets visible to the configured credentials.
    Buckets,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    pub publish: Arc<PublishSettings>,
    pub request_timeout: Duration,
    pub command: Command,
}

impl TryFrom<CliArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let log_level = args.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            bail!(
                "QRPORT_LOG_LEVEL must be one of {} (got {:?})",
                LOG_LEVELS.join(", "),
                args.log_level
            );
        }

        if args.publish_timeout_secs == 0 {
            bail!("QRPORT_PUBLISH_TIMEOUT_SECS must be greater than 0");
        }
        if args.request_timeout_secs == 0 {
            bail!("QRPORT_REQUEST_TIMEOUT_SECS must be greater than 0");
        }
        if args.bucket.trim().is_empty() {
            bail!("QRPORT_BUCKET must not be empty");
        }

        let provider: Provider = args.provider.parse().map_err(anyhow::Error::msg)?;
        let backend = match provider {
            Provider::Aws => Backend::Aws {
                credentials_path: args.credentials,
                profile: args.profile,
                endpoint: args.endpoint.filter(|e| !e.is_empty()),
            },
            Provider::Memory => Backend::Memory(Arc::new(MemoryStore::new())),
        };

        Ok(Self {
            log_level,
            publish: Arc::new(PublishSettings {
                backend,
                region: args.region,
                bucket: args.bucket,
                scratch_dir: args.scratch_dir,
                orchestrator: PublishOrchestrator::new(Duration::from_secs(
                    args.publish_timeout_secs,
                )),
            }),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["qrport"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn generate_with_defaults() {
        let args = parse(&["--provider", "memory", "generate", "--content", "hello-world"]);
        let settings = Settings::try_from(args).unwrap();

        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.publish.orchestrator.timeout(), Duration::from_secs(5));
        assert_eq!(settings.publish.scratch_dir, PathBuf::from(".qr/generated"));
        assert_eq!(settings.publish.backend.provider(), Provider::Memory);
        assert_eq!(
            settings.command,
            Command::Generate {
                content: "hello-world".into(),
                size: 10,
                recovery_level: "L0".into(),
                id: None,
            }
        );
    }

    #[test]
    fn aws_backend_keeps_credentials_location() {
        let args = parse(&[
            "--credentials",
            "/tmp/creds",
            "--profile",
            "publisher",
            "--endpoint",
            "http://localhost:9000",
            "buckets",
        ]);
        let settings = Settings::try_from(args).unwrap();

        match &settings.publish.backend {
            Backend::Aws {
                credentials_path,
                profile,
                endpoint,
            } => {
                assert_eq!(credentials_path, &PathBuf::from("/tmp/creds"));
                assert_eq!(profile, "publisher");
                assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
            }
            other => panic!("unexpected backend {other:?}"),
        }
        assert_eq!(settings.command, Command::Buckets);
    }

    #[test]
    fn negative_size_reaches_request_validation() {
        let args = parse(&["generate", "--content", "x", "--size", "-3"]);
        assert!(matches!(args.command, Command::Generate { size: -3, .. }));
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_level = parse(&["--log-level", "loud", "buckets"]);
        assert!(Settings::try_from(bad_level).is_err());

        let zero_timeout = parse(&["--publish-timeout-secs", "0", "buckets"]);
        assert!(Settings::try_from(zero_timeout).is_err());

        let bad_provider = parse(&["--provider", "gcs", "buckets"]);
        assert!(Settings::try_from(bad_provider).is_err());
    }
}
