//! Public façade: the windowed affinity graph builder
//!
//! Owns one graph-building strategy, the lifecycle state and the prune timer
//! thread. The task execution layer feeds it with [`update_graph`], the
//! distributed cache layer with [`note_conflict_detected`] and
//! [`remove_node`], and the label-propagation layer reads snapshots back.
//!
//! # Lifecycle
//!
//! ```text
//!   ┌─────────┐  disable()  ┌──────────┐
//!   │ Enabled │ ──────────▶ │ Disabled │      mutations ignored
//!   │         │ ◀────────── │          │
//!   └────┬────┘  enable()   └────┬─────┘
//!        │ shutdown()            │ shutdown()
//!        ▼                       ▼
//!   ┌──────────────────────────────────┐
//!   │ Shutdown: timer joined;          │      mutations → ShutDown
//!   │ snapshots still readable         │
//!   └──────────────────────────────────┘
//! ```
//!
//! [`update_graph`]: AffinityGraphBuilder::update_graph
//! [`note_conflict_detected`]: AffinityGraphBuilder::note_conflict_detected
//! [`remove_node`]: AffinityGraphBuilder::remove_node

use crate::access::ObjectUseMap;
use crate::builder::{self, GraphBuilder, PruneOutcome};
use crate::config::AffinityConfig;
use crate::conflict::ConflictMap;
use crate::error::{AffinityError, Result};
use crate::graph::{AffinityGraphSnapshot, Vertex};
use crate::identity::{Identity, NodeId, ObjectId};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::pruner::PruneTimer;
use crate::stats::StatsSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Windowed affinity graph builder
///
/// # Example
///
/// ```
/// use affinity_graph::{AffinityConfig, AffinityGraphBuilder, Identity, ObjectId};
/// use std::time::Duration;
///
/// let builder = AffinityGraphBuilder::new(
///     AffinityConfig::new(Duration::from_secs(3600), 1),
/// ).unwrap();
///
/// let a = Identity::new("a");
/// let b = Identity::new("b");
/// builder.update_graph(&a, &[ObjectId(1)]).unwrap();
/// builder.update_graph(&b, &[ObjectId(1)]).unwrap();
/// assert_eq!(builder.affinity_graph().weight(&a, &b), Some(1));
///
/// builder.prune_now().unwrap();
/// builder.prune_now().unwrap();
/// assert!(builder.affinity_graph().is_empty());
/// ```
#[derive(Debug)]
pub struct AffinityGraphBuilder {
    config: AffinityConfig,
    builder: Arc<dyn GraphBuilder>,
    lifecycle: Lifecycle,
    timer: Mutex<Option<PruneTimer>>,
}

impl AffinityGraphBuilder {
    /// Validate `config`, build the configured strategy and start pruning
    pub fn new(config: AffinityConfig) -> Result<Self> {
        config.validate()?;
        let builder = builder::from_config(&config);

        let task_builder = Arc::clone(&builder);
        let failed_builder = Arc::clone(&builder);
        let timer = PruneTimer::spawn(
            builder.pruner().tick_interval(),
            move || {
                task_builder.prune_tick();
            },
            move |message| {
                tracing::error!("Affinity graph pruner failed: {}", message);
                failed_builder.stats().mark_pruner_failed();
            },
        )
        .map_err(AffinityError::PrunerSpawn)?;

        tracing::info!(
            "Created affinity graph builder: {:?} strategy, snapshot {}ms, {} period(s)",
            config.builder,
            config.snapshot_ms,
            config.period_count
        );

        Ok(Self {
            config,
            builder,
            lifecycle: Lifecycle::new(),
            timer: Mutex::new(Some(timer)),
        })
    }

    pub fn config(&self) -> &AffinityConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Record that `owner` touched `objects` in one completed task
    ///
    /// Ignored while disabled; fails with [`AffinityError::ShutDown`] after
    /// shutdown.
    pub fn update_graph(&self, owner: &Identity, objects: &[ObjectId]) -> Result<()> {
        self.lifecycle.check_not_shutdown()?;
        if !self.lifecycle.is_enabled() {
            return Ok(());
        }
        let start = Instant::now();
        self.builder.update_graph(owner, objects);
        self.builder.stats().add_processing_time(start.elapsed());
        Ok(())
    }

    pub fn affinity_graph(&self) -> AffinityGraphSnapshot {
        self.builder.affinity_graph()
    }

    /// The vertex for `identity`, if it currently has any edge
    pub fn vertex(&self, identity: &Identity) -> Option<Vertex> {
        self.builder.vertex(identity)
    }

    pub fn object_use_map(&self) -> ObjectUseMap {
        self.builder.object_use_map()
    }

    pub fn conflict_map(&self) -> ConflictMap {
        self.builder.conflicts().snapshot()
    }

    /// Record that `node` evicted a locally cached object
    ///
    /// `for_update` distinguishes write from read-only evictions; both are
    /// currently weighted the same.
    pub fn note_conflict_detected(
        &self,
        object: Option<ObjectId>,
        node: NodeId,
        for_update: bool,
    ) -> Result<()> {
        self.lifecycle.check_not_shutdown()?;
        let object = object.ok_or_else(|| {
            AffinityError::InvalidArgument("conflicting object id must be present".to_string())
        })?;
        if !self.lifecycle.is_enabled() {
            return Ok(());
        }
        tracing::trace!(
            "Conflict on {} from {} (for_update: {})",
            object,
            node,
            for_update
        );
        self.builder.note_conflict(object, node);
        Ok(())
    }

    /// Drop every conflict recorded against a failed node
    ///
    /// Applies while disabled too: membership changes are not task traffic.
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        self.lifecycle.check_not_shutdown()?;
        if self.builder.remove_node(node) {
            tracing::debug!("Cleared conflicts for {}", node);
        }
        Ok(())
    }

    /// Run one prune tick on the calling thread
    ///
    /// The background timer keeps running; this only adds a tick.
    pub fn prune_now(&self) -> Result<PruneOutcome> {
        self.lifecycle.check_not_shutdown()?;
        Ok(self.builder.prune_tick())
    }

    pub fn stats(&self) -> StatsSnapshot {
        let stats = self.builder.stats();
        let size = self.builder.graph_size();
        StatsSnapshot {
            update_count: stats.update_count(),
            prune_count: stats.prune_count(),
            conflict_count: stats.conflict_count(),
            processing_time_ms: u64::try_from(stats.processing_time().as_millis())
                .unwrap_or(u64::MAX),
            pruner_failed: stats.pruner_failed(),
            vertex_count: size.vertices,
            edge_count: size.edges,
            tracked_objects: self.builder.tracked_objects(),
            snapshot_ms: self.config.snapshot_ms,
            period_count: self.config.period_count,
        }
    }

    /// Whether the background prune thread is alive
    pub fn pruner_running(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(PruneTimer::is_running)
    }

    /// Resume tracking; a no-op if already enabled
    pub fn enable(&self) -> Result<()> {
        self.lifecycle.check_not_shutdown()?;
        if self.lifecycle.enable() {
            tracing::debug!("Affinity graph builder enabled");
        }
        Ok(())
    }

    /// Ignore further updates until re-enabled; a no-op if already disabled
    pub fn disable(&self) -> Result<()> {
        self.lifecycle.check_not_shutdown()?;
        if self.lifecycle.disable() {
            tracing::debug!("Affinity graph builder disabled");
        }
        Ok(())
    }

    /// Stop and join the prune timer; later calls are no-ops
    pub fn shutdown(&self) {
        if !self.lifecycle.shutdown() {
            return;
        }
        let timer = self.timer.lock().take();
        if let Some(mut timer) = timer {
            timer.stop();
        }
        tracing::info!("Affinity graph builder shut down");
    }
}

impl Drop for AffinityGraphBuilder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
