//! Publish sessions.
//!
//! A [`Session`] binds a provider, a region and an [`ObjectStore`] handle for the duration of
//! one publish call. Sessions are opened per call and never pooled.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use ini::Ini;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{MemoryStore, ObjectStore, S3Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Aws,
    Memory,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Aws => "aws",
            Provider::Memory => "memory",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" | "s3" => Ok(Provider::Aws),
            "memory" => Ok(Provider::Memory),
            other => Err(format!("unknown provider {other:?} (expected aws or memory)")),
        }
    }
}

/// Static access keys from a shared-credentials profile.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Reads `profile` from an AWS shared-credentials file.
    pub async fn from_file(path: &Path, profile: &str) -> Result<Self> {
        let path = expand_home(path);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| Error::Auth {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, profile).map_err(|reason| Error::Auth { path, reason })
    }

    /// Parses the INI layout: `[profile]` headers followed by `key = value` lines.
    ///
    /// Key names are matched without regard to case.
    pub fn parse(text: &str, profile: &str) -> std::result::Result<Self, String> {
        let ini = Ini::load_from_str(text).map_err(|e| e.to_string())?;
        let section = ini
            .section(Some(profile))
            .ok_or_else(|| format!("profile [{profile}] not found"))?;

        let value = |key: &str| {
            section
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required =
            |key: &str| value(key).ok_or_else(|| format!("profile [{profile}] has no {key}"));

        Ok(Self {
            access_key_id: required("aws_access_key_id")?,
            secret_access_key: required("aws_secret_access_key")?,
            session_token: value("aws_session_token"),
        })
    }
}

/// Expands a leading `~` from `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    expand_home_with(path, std::env::var_os("HOME"))
}

fn expand_home_with(path: &Path, home: Option<OsString>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Where a session's store comes from.
#[derive(Clone)]
pub enum Backend {
    Aws {
        credentials_path: PathBuf,
        profile: String,
        /// S3-compatible endpoint; `None` means AWS itself.
        endpoint: Option<String>,
    },
    /// An in-process account that outlives the sessions opened on it.
    Memory(Arc<MemoryStore>),
}

impl Backend {
    pub fn provider(&self) -> Provider {
        match self {
            Backend::Aws { .. } => Provider::Aws,
            Backend::Memory(_) => Provider::Memory,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Aws {
                credentials_path,
                profile,
                endpoint,
            } => f
                .debug_struct("Aws")
                .field("credentials_path", credentials_path)
                .field("profile", profile)
                .field("endpoint", endpoint)
                .finish(),
            Backend::Memory(_) => f.write_str("Memory"),
        }
    }
}

/// Provider, region and store handle for one publish call.
#[derive(Clone)]
pub struct Session {
    provider: Provider,
    region: String,
    store: Arc<dyn ObjectStore>,
}

impl Session {
    /// Resolves credentials and builds the store handle.
    ///
    /// Credential problems surface as [`Error::Auth`]; nothing is sent over the network.
    pub async fn open(backend: &Backend, region: &str) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match backend {
            Backend::Aws {
                credentials_path,
                profile,
                endpoint,
            } => {
                let credentials = Credentials::from_file(credentials_path, profile).await?;
                let store = S3Store::new(region, endpoint.as_deref(), &credentials).map_err(
                    |e| Error::Auth {
                        path: credentials_path.clone(),
                        reason: e.to_string(),
                    },
                )?;
                Arc::new(store)
            }
            Backend::Memory(store) => store.clone(),
        };

        let provider = backend.provider();
        debug!(%provider, region, "session opened");
        Ok(Self {
            provider,
            region: region.to_string(),
            store,
        })
    }

    /// Wraps an already-built store, for callers bringing their own [`ObjectStore`].
    pub fn with_store(provider: Provider, region: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            provider,
            region: region.to_string(),
            store,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
