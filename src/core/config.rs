//! Configuration for how tile archives are obtained
//!
//! Mirrors the preset-based configuration used by the rest of maplet: pick a
//! profile, resolve it into plain options, and tweak individual fields.

use serde::{Deserialize, Serialize};

use crate::{constants::USER_AGENT, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveLoadingProfile {
    /// Network fetches with a generous timeout and no size cap.
    Balanced,
    /// Short timeout and a 64 MiB cap, for constrained clients.
    Constrained,
    Custom(ArchiveLoadingConfig),
}

impl ArchiveLoadingProfile {
    pub fn resolve(&self) -> ArchiveLoadingConfig {
        match self {
            Self::Balanced => ArchiveLoadingConfig {
                timeout_ms: 60_000,
                user_agent: USER_AGENT.to_string(),
                max_archive_bytes: None,
            },
            Self::Constrained => ArchiveLoadingConfig {
                timeout_ms: 15_000,
                user_agent: USER_AGENT.to_string(),
                max_archive_bytes: Some(64 * 1024 * 1024),
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for ArchiveLoadingProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveLoadingConfig {
    /// Whole-request timeout for archive downloads.
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Reject archives larger than this many bytes.
    pub max_archive_bytes: Option<u64>,
}

impl ArchiveLoadingConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Parse a (possibly partial) JSON document; missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks a body length against `max_archive_bytes`.
    pub fn accepts_len(&self, len: u64) -> bool {
        self.max_archive_bytes.map_or(true, |max| len <= max)
    }
}

impl Default for ArchiveLoadingConfig {
    fn default() -> Self {
        ArchiveLoadingProfile::default().resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_profile_presets() {
        let balanced = ArchiveLoadingProfile::Balanced.resolve();
        let constrained = ArchiveLoadingProfile::Constrained.resolve();

        assert!(balanced.timeout_ms > constrained.timeout_ms);
        assert!(balanced.max_archive_bytes.is_none());
        assert!(constrained.max_archive_bytes.is_some());
        assert_eq!(ArchiveLoadingConfig::default(), balanced);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ArchiveLoadingConfig::from_json(r#"{"timeout_ms": 500}"#).unwrap();
        assert_eq!(config.timeout(), std::time::Duration::from_millis(500));
        assert_eq!(config.user_agent, USER_AGENT);
        assert!(config.accepts_len(u64::MAX));
    }

    #[test]
    fn test_size_cap() {
        let config = ArchiveLoadingConfig {
            max_archive_bytes: Some(10),
            ..Default::default()
        };
        assert!(config.accepts_len(10));
        assert!(!config.accepts_len(11));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ArchiveLoadingConfig::from_json("{not json").is_err());
    }
}
