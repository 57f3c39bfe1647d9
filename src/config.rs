//! Construction-time configuration for the affinity graph builder
//!
//! Two knobs shape the decay window: the snapshot length (how often the prune
//! timer fires) and the period count (how many snapshots stay live). A
//! contribution made during one snapshot survives for `period_count` further
//! snapshots before it is reversed.
//!
//! # Example TOML
//! ```toml
//! snapshot_ms = 300000
//! period_count = 1
//! builder = "weighted"
//! ```

use crate::error::{AffinityError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default snapshot length: five minutes
pub const DEFAULT_SNAPSHOT_MS: u64 = 5 * 60 * 1000;

/// Default number of live snapshots
pub const DEFAULT_PERIOD_COUNT: usize = 1;

/// Graph-building strategy
///
/// Both strategies satisfy the same external contract; they trade write cost
/// against read cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    /// Identity graph maintained incrementally on every update (cheap reads)
    #[default]
    Weighted,
    /// Identity-object graph folded on every read (cheap writes)
    Bipartite,
}

/// Configuration for [`AffinityGraphBuilder`](crate::affinity::AffinityGraphBuilder)
///
/// # Example
/// ```
/// use affinity_graph::config::AffinityConfig;
/// use std::time::Duration;
///
/// let config = AffinityConfig::default();
/// assert_eq!(config.snapshot(), Duration::from_secs(300));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Length of one snapshot period in milliseconds (prune timer interval)
    pub snapshot_ms: u64,

    /// Number of sealed snapshots retained before the oldest is pruned
    pub period_count: usize,

    /// Which graph-building strategy to run
    pub builder: BuilderKind,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            snapshot_ms: DEFAULT_SNAPSHOT_MS,
            period_count: DEFAULT_PERIOD_COUNT,
            builder: BuilderKind::Weighted,
        }
    }
}

impl AffinityConfig {
    /// A nonzero `snapshot` shorter than a millisecond rounds up to 1ms
    pub fn new(snapshot: Duration, period_count: usize) -> Self {
        let mut snapshot_ms = u64::try_from(snapshot.as_millis()).unwrap_or(u64::MAX);
        if snapshot_ms == 0 && !snapshot.is_zero() {
            snapshot_ms = 1;
        }
        Self {
            snapshot_ms,
            period_count,
            builder: BuilderKind::default(),
        }
    }

    pub fn with_builder(mut self, builder: BuilderKind) -> Self {
        self.builder = builder;
        self
    }

    pub fn snapshot(&self) -> Duration {
        Duration::from_millis(self.snapshot_ms)
    }

    /// Load configuration from a TOML file; absent keys take their defaults
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AffinityError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_ms == 0 {
            return Err(AffinityError::InvalidConfig(
                "snapshot_ms must be > 0".to_string(),
            ));
        }

        if self.period_count == 0 {
            return Err(AffinityError::InvalidConfig(
                "period_count must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AffinityConfig::default();
        assert_eq!(config.snapshot_ms, 300_000);
        assert_eq!(config.period_count, 1);
        assert_eq!(config.builder, BuilderKind::Weighted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_from_duration() {
        let config = AffinityConfig::new(Duration::from_millis(250), 4);
        assert_eq!(config.snapshot_ms, 250);
        assert_eq!(config.period_count, 4);
        assert_eq!(config.snapshot(), Duration::from_millis(250));
    }

    #[test]
    fn test_sub_millisecond_snapshot_rounds_up() {
        let config = AffinityConfig::new(Duration::from_micros(500), 1);
        assert_eq!(config.snapshot_ms, 1);
        assert!(config.validate().is_ok());

        let zero = AffinityConfig::new(Duration::ZERO, 1);
        assert!(zero.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_snapshot() {
        let mut config = AffinityConfig::default();
        config.snapshot_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(AffinityError::InvalidConfig(_))
        ));
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_period_count() {
        let mut config = AffinityConfig::default();
        config.period_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = AffinityConfig::from_toml_str("period_count = 3\nbuilder = \"bipartite\"\n")
            .unwrap();
        assert_eq!(config.period_count, 3);
        assert_eq!(config.snapshot_ms, DEFAULT_SNAPSHOT_MS);
        assert_eq!(config.builder, BuilderKind::Bipartite);
    }

    #[test]
    fn test_from_toml_str_rejects_zero_window() {
        let err = AffinityConfig::from_toml_str("period_count = 0").unwrap_err();
        assert!(matches!(err, AffinityError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_toml_str_rejects_bad_syntax() {
        let err = AffinityConfig::from_toml_str("snapshot_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, AffinityError::ConfigParse(_)));
    }

    #[test]
    fn test_from_toml_missing_file() {
        let err = AffinityConfig::from_toml("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, AffinityError::ConfigRead { .. }));
    }
}
