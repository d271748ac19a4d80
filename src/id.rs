//! Identity utilities for gridload
//!
//! Provides the per-process client identity and run identifiers.

use std::fmt;

use uuid::Uuid;

/// Stable identifier of one running client process.
///
/// Generated once at startup and handed to every runner; it is embedded in
/// map names and storage keys so that concurrently running clients never
/// address the same remote key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use a caller-supplied identity, falling back to a generated one if blank.
    pub fn from_configured(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            log::warn!("Configured client identity is blank, generating one instead");
            return Self::generate();
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate the identifier of one test-loop run
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
