//! Calculus configuration.
//!
//! The configuration is part of a transformation's provenance: a replay
//! journal records [`CalculusConfig::params_hash`], and two replays only agree
//! when their hashes do.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_CALCULUS_VERSION;

/// Environment variable that enables same-context de-iteration.
pub const ENV_ALLOW_SAME_CONTEXT_DEITERATION: &str = "EGI_ALLOW_SAME_CONTEXT_DEITERATION";

/// Tunable parts of the calculus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculusConfig {
    /// Calculus version tag.
    pub version: String,
    /// Accept de-iteration when the copy sits in the same context as the
    /// original. Off by default: the original must be in a proper ancestor.
    pub allow_same_context_deiteration: bool,
}

impl CalculusConfig {
    /// Configuration read from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(ENV_ALLOW_SAME_CONTEXT_DEITERATION) {
            config.allow_same_context_deiteration = parse_flag(&value);
        }
        config
    }

    /// Builder-style toggle for same-context de-iteration.
    pub fn with_same_context_deiteration(mut self, allow: bool) -> Self {
        self.allow_same_context_deiteration = allow;
        self
    }

    /// Hash of the parameters (xxh64 hex).
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

impl Default for CalculusConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_CALCULUS_VERSION.to_string(),
            allow_same_context_deiteration: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
