//! Session configuration (SPEC_FULL.md §3 "Configuration"): chunk
//! size for streaming, sync poll interval, and the per-subject
//! unverified-queue cap, with an optional TOML overlay the way the
//! teacher's `IdentityConfig::load` reads a TOML file for agent
//! bootstrap.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ward_core::WardError;

/// Tunables for one [`crate::Session`]. Every field has a sane
/// default; TOML only needs to override what differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Plaintext chunk size for the streaming encryptor (spec.md §4.6
    /// default 1 MiB), overridable per session for constrained clients
    /// (SPEC_FULL.md §4) and still overridable per-call.
    pub chunk_size: usize,
    /// How often the orchestrator polls the transport for new blocks
    /// when a caller hasn't forced a sync.
    #[serde(with = "duration_secs")]
    pub sync_poll_interval: Duration,
    /// Cap on how many blocks the unverified queue holds per subject
    /// (user-id or group-id) before it refuses to enqueue more
    /// (`ward_verify::UnverifiedQueue`).
    pub max_unverified_queue_per_subject: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: ward_stream::DEFAULT_CHUNK_SIZE,
            sync_poll_interval: Duration::from_secs(30),
            max_unverified_queue_per_subject: 64,
        }
    }
}

impl SessionConfig {
    /// Parse a TOML overlay on top of [`Default::default`]. Missing
    /// fields keep their default rather than erroring.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, WardError> {
        toml::from_str(toml_str).map_err(WardError::from)
    }

    /// Load a TOML overlay from disk (SPEC_FULL.md §3, mirroring the
    /// teacher's `IdentityConfig::load`). Absence of the file is the
    /// caller's concern, not this function's: the core never requires
    /// a config file to exist.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, WardError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| WardError::internal(format!("reading config file: {err}")))?;
        Self::from_toml_str(&contents)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_chunk_size() {
        let config = SessionConfig::default();
        assert_eq!(config.chunk_size, 1024 * 1024);
    }

    #[test]
    fn toml_overlay_overrides_only_named_fields() {
        let config = SessionConfig::from_toml_str("chunk_size = 4096\n").expect("parse");
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.max_unverified_queue_per_subject, 64);
    }
}
