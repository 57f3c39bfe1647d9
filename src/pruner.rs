//! Windowed pruning: period accounting and the background prune timer
//!
//! There are no per-event timestamps. Instead, every increment the writer
//! applies (to an edge, an access count, or a conflict count) is also tallied
//! into the *current period*. Each timer tick seals the current period, pushes
//! it onto a FIFO, and starts a fresh one. Once the FIFO holds more than
//! `window_size` sealed periods, the oldest is popped and handed back to the
//! builder, which reverses exactly the deltas it recorded.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ WRITER THREAD                                                    │
//! │   update_graph() → graph lock → increment edge                   │
//! │                               → period lock → current[e] += 1    │
//! └──────────────────────────────────────────────────────────────────┘
//!                          │
//!                          │ tick every `snapshot`
//!                          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ PRUNE TIMER THREAD                                               │
//! │   period lock → seal current, push back, pop oldest (if full)    │
//! │   (period lock released)                                         │
//! │   graph lock  → reverse popped edge deltas                       │
//! │   shard locks → reverse popped access / conflict deltas          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The writer may take the period lock while it holds the graph lock. The
//! prune thread never holds the period lock while taking the graph lock, so
//! the two scopes cannot deadlock.
//!
//! Warm-up: with `window_size = W`, the first `W` ticks only seal periods.
//! Tick `W + 1` is the first to expire anything (the period that was current
//! before tick 1).

use crate::graph::EdgeId;
use crate::identity::{Identity, NodeId, ObjectId};
use crossbeam::channel::{self, Sender};
use crossbeam::select;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Increments applied during one snapshot interval
///
/// The edge, access and conflict deltas of one interval travel together, so
/// their FIFOs can never drift to different lengths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Period {
    /// Edge → number of times incremented
    pub edges: FnvHashMap<EdgeId, u64>,
    /// Object → identity → number of accesses
    pub accesses: FnvHashMap<ObjectId, FnvHashMap<Identity, u64>>,
    /// Remote node → object → number of conflicts
    pub conflicts: FnvHashMap<NodeId, FnvHashMap<ObjectId, u64>>,
}

impl Period {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.accesses.is_empty() && self.conflicts.is_empty()
    }

    pub fn edge_delta(&self, edge: EdgeId) -> u64 {
        self.edges.get(&edge).copied().unwrap_or(0)
    }
}

/// Result of sealing the current period
#[derive(Debug)]
pub enum Rotation {
    /// Window not yet full; nothing expired
    Warming { sealed: usize },
    /// The oldest period fell out of the window and must be reversed
    Expired(Period),
}

#[derive(Debug, Default)]
struct PeriodWindow {
    current: Period,
    sealed: VecDeque<Period>,
    ticks: u64,
}

/// Period ledger shared by the writer and the prune thread
#[derive(Debug)]
pub struct WindowedPruner {
    window_size: usize,
    tick_interval: Duration,
    window: Mutex<PeriodWindow>,
}

impl WindowedPruner {
    /// # Panics
    ///
    /// Panics if `window_size` is 0.
    pub fn new(window_size: usize, tick_interval: Duration) -> Self {
        assert!(window_size > 0, "Prune window size must be > 0");
        Self {
            window_size,
            tick_interval,
            window: Mutex::new(PeriodWindow {
                sealed: VecDeque::with_capacity(window_size + 1),
                ..PeriodWindow::default()
            }),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Ticks seen since construction
    pub fn ticks(&self) -> u64 {
        self.window.lock().ticks
    }

    /// Number of sealed periods currently retained
    pub fn sealed_len(&self) -> usize {
        self.window.lock().sealed.len()
    }

    pub fn record_edge_increment(&self, edge: EdgeId) {
        let mut window = self.window.lock();
        *window.current.edges.entry(edge).or_insert(0) += 1;
    }

    pub fn record_access_increment(&self, object: ObjectId, identity: &Identity) {
        let mut window = self.window.lock();
        *window
            .current
            .accesses
            .entry(object)
            .or_default()
            .entry(identity.clone())
            .or_insert(0) += 1;
    }

    pub fn record_conflict_increment(&self, node: NodeId, object: ObjectId) {
        let mut window = self.window.lock();
        *window
            .current
            .conflicts
            .entry(node)
            .or_default()
            .entry(object)
            .or_insert(0) += 1;
    }

    /// Seal the current period and pop the oldest once the window is full
    pub fn rotate(&self) -> Rotation {
        let mut window = self.window.lock();
        window.ticks += 1;
        let finished = mem::take(&mut window.current);
        window.sealed.push_back(finished);

        if window.sealed.len() <= self.window_size {
            return Rotation::Warming {
                sealed: window.sealed.len(),
            };
        }

        match window.sealed.pop_front() {
            Some(oldest) => Rotation::Expired(oldest),
            None => Rotation::Warming { sealed: 0 },
        }
    }
}

/// Background thread that runs a prune task on a fixed interval
///
/// Modeled as a ticker plus a stop channel: dropping the stop sender wakes the
/// thread, which exits after any in-progress tick completes. If a tick panics
/// the panic is caught, reported through `on_panic`, and the thread exits;
/// nothing else shares its stack.
#[derive(Debug)]
pub struct PruneTimer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PruneTimer {
    pub fn spawn<T, P>(interval: Duration, task: T, on_panic: P) -> std::io::Result<Self>
    where
        T: Fn() + Send + 'static,
        P: FnOnce(String) + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("affinity-graph-pruner".into())
            .spawn(move || {
                let mut on_panic = Some(on_panic);
                let ticker = channel::tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&task)) {
                                if let Some(report) = on_panic.take() {
                                    report(panic_message(payload.as_ref()));
                                }
                                break;
                            }
                        }
                    }
                }
                tracing::debug!("Affinity graph prune timer exiting");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Whether the timer thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and wait for the thread; safe to call repeatedly
    pub fn stop(&mut self) {
        // Disconnecting the channel is the stop signal.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PruneTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
