//! CLI argument parsing for the affinity graph simulator

use crate::config::{AffinityConfig, BuilderKind};
use crate::error::Result;
use crate::workload::WorkloadConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for simulation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    Text,
    /// JSON document for machine parsing
    Json,
}

/// Graph-building strategy as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuilderArg {
    Weighted,
    Bipartite,
}

impl From<BuilderArg> for BuilderKind {
    fn from(arg: BuilderArg) -> Self {
        match arg {
            BuilderArg::Weighted => BuilderKind::Weighted,
            BuilderArg::Bipartite => BuilderKind::Bipartite,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "affinity-sim")]
#[command(version)]
#[command(
    about = "Drive a windowed affinity graph builder with a synthetic task workload",
    long_about = None
)]
pub struct Cli {
    /// Number of client identities
    #[arg(long, value_name = "N", default_value = "40")]
    pub identities: usize,

    /// Size of the shared object space
    #[arg(long, value_name = "N", default_value = "400")]
    pub objects: u64,

    /// Number of identity communities sharing object pools
    #[arg(long, value_name = "N", default_value = "4")]
    pub groups: usize,

    /// Total number of tasks to simulate
    #[arg(long, value_name = "N", default_value = "2000")]
    pub tasks: usize,

    /// Objects touched by each task
    #[arg(long = "objects-per-task", value_name = "N", default_value = "3")]
    pub objects_per_task: usize,

    /// Tasks completed between prune ticks
    #[arg(long = "tasks-per-tick", value_name = "N", default_value = "200")]
    pub tasks_per_tick: usize,

    /// Probability that a task touches an object outside its community
    #[arg(long, value_name = "P", default_value = "0.05")]
    pub noise: f64,

    /// Probability that a task triggers a cross-node conflict report
    #[arg(long = "conflict-rate", value_name = "P", default_value = "0.0")]
    pub conflict_rate: f64,

    /// Snapshot length in milliseconds (overrides the config file)
    #[arg(long = "snapshot-ms", value_name = "MS")]
    pub snapshot_ms: Option<u64>,

    /// Number of live snapshots (overrides the config file)
    #[arg(long = "period-count", value_name = "N")]
    pub period_count: Option<usize>,

    /// Graph-building strategy (overrides the config file)
    #[arg(long, value_enum)]
    pub builder: Option<BuilderArg>,

    /// TOML configuration file for the builder
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Number of heaviest edges to report
    #[arg(long, value_name = "N", default_value = "10")]
    pub top: usize,

    /// Seed for the workload generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Builder configuration: file values (or defaults), then flag overrides
    pub fn affinity_config(&self) -> Result<AffinityConfig> {
        let mut config = match &self.config {
            Some(path) => AffinityConfig::from_toml(path)?,
            None => AffinityConfig::default(),
        };
        if let Some(ms) = self.snapshot_ms {
            config.snapshot_ms = ms;
        }
        if let Some(count) = self.period_count {
            config.period_count = count;
        }
        if let Some(builder) = self.builder {
            config.builder = builder.into();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn workload_config(&self) -> WorkloadConfig {
        WorkloadConfig {
            identities: self.identities,
            objects: self.objects,
            groups: self.groups,
            objects_per_task: self.objects_per_task,
            noise: self.noise,
            conflict_rate: self.conflict_rate,
            ..WorkloadConfig::default()
        }
    }
}
