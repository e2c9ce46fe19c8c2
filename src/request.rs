//! Validated generation requests.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::qrcode::QrCodeEcc;

/// Largest accepted raster scale, in pixels per module.
pub const MAX_SIZE: u32 = 128;

/// How much of the symbol is spent on error correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecoveryLevel {
    /// Most capacity, ~7% of codewords recoverable.
    L0,
    /// ~15% recoverable.
    L1,
    /// ~25% recoverable.
    L2,
    /// Least capacity, ~30% recoverable.
    L3,
}

impl RecoveryLevel {
    pub fn ecc(self) -> QrCodeEcc {
        match self {
            Self::L0 => QrCodeEcc::Low,
            Self::L1 => QrCodeEcc::Medium,
            Self::L2 => QrCodeEcc::Quartile,
            Self::L3 => QrCodeEcc::High,
        }
    }
}

impl FromStr for RecoveryLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l0" | "0" | "low" => Ok(Self::L0),
            "l1" | "1" | "medium" => Ok(Self::L1),
            "l2" | "2" | "high" | "quartile" => Ok(Self::L2),
            "l3" | "3" | "highest" => Ok(Self::L3),
            _ => Err(Error::InvalidRequest(format!("unknown recovery level {s:?}"))),
        }
    }
}

impl fmt::Display for RecoveryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        };
        f.write_str(name)
    }
}

/// One request to encode `content` and publish the image under `id`.
///
/// Only constructible through validation, so every holder can rely on the invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    id: String,
    content: String,
    size: u32,
    recovery_level: RecoveryLevel,
}

impl GenerationRequest {
    /// Validates raw boundary input.
    ///
    /// `id` becomes both a filename and an object key, so it is limited to ASCII letters,
    /// digits, `-` and `_`. `size` is pixels per module.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        size: i64,
        recovery_level: &str,
    ) -> Result<Self> {
        let id = id.into();
        let content = content.into();

        if id.is_empty() {
            return Err(Error::InvalidRequest("id must not be empty".into()));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::InvalidRequest(format!(
                "id {id:?} contains invalid character {c:?}"
            )));
        }
        if content.is_empty() {
            return Err(Error::InvalidRequest("content must not be empty".into()));
        }
        let size = u32::try_from(size)
            .ok()
            .filter(|s| (1..=MAX_SIZE).contains(s))
            .ok_or_else(|| {
                Error::InvalidRequest(format!("size {size} is outside 1..={MAX_SIZE}"))
            })?;
        let recovery_level = recovery_level.parse()?;

        Ok(Self {
            id,
            content,
            size,
            recovery_level,
        })
    }

    /// Same as [`GenerationRequest::new`] with a fresh random id.
    pub fn with_generated_id(
        content: impl Into<String>,
        size: i64,
        recovery_level: &str,
    ) -> Result<Self> {
        Self::new(uuid::Uuid::new_v4().to_string(), content, size, recovery_level)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn recovery_level(&self) -> RecoveryLevel {
        self.recovery_level
    }
}
