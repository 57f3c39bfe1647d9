//! Affinity Graph - windowed identity affinity graph builder
//!
//! This library observes which identity touched which shared objects in each
//! completed task, maintains a weighted undirected graph of identities whose
//! edge weights approximate recent co-access, and ages stale contributions
//! out with a fixed-length window of snapshot periods. The result feeds a
//! label-propagation layer that co-locates identities on cluster nodes.

pub mod access;
pub mod affinity;
pub mod builder;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod error;
pub mod graph;
pub mod identity;
pub mod lifecycle;
pub mod pruner;
pub mod stats;
pub mod workload;

pub use affinity::AffinityGraphBuilder;
pub use builder::PruneOutcome;
pub use config::{AffinityConfig, BuilderKind};
pub use error::{AffinityError, Result};
pub use graph::AffinityGraphSnapshot;
pub use identity::{Identity, NodeId, ObjectId};
pub use lifecycle::LifecycleState;
