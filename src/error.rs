//! Error taxonomy for the affinity graph builder
//!
//! Caller-visible failures only. Disabled-state calls are not errors (they are
//! ignored), and internal invariant failures panic inside the prune tick
//! instead of surfacing here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AffinityError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Affinity graph builder is already shut down")]
    ShutDown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to spawn prune timer thread: {0}")]
    PrunerSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AffinityError>;
