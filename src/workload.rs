//! Seeded synthetic task workloads for the simulator
//!
//! Identities are split round-robin into communities, and each community owns
//! a contiguous slice of the object space. A task mostly touches objects of
//! its owner's community; with probability `noise` an object is drawn from
//! the whole space instead. A well-behaved builder therefore ends up with
//! most edge weight inside communities, which [`Workload::cohesion`] measures.

use crate::error::{AffinityError, Result};
use crate::graph::AffinityGraphSnapshot;
use crate::identity::{Identity, NodeId, ObjectId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub identities: usize,
    pub objects: u64,
    pub groups: usize,
    pub objects_per_task: usize,
    /// Probability that an accessed object ignores community boundaries
    pub noise: f64,
    /// Probability that a task is followed by a cross-node conflict report
    pub conflict_rate: f64,
    /// Number of remote nodes conflicts are attributed to
    pub nodes: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            identities: 40,
            objects: 400,
            groups: 4,
            objects_per_task: 3,
            noise: 0.05,
            conflict_rate: 0.0,
            nodes: 4,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.identities == 0 || self.groups == 0 || self.objects_per_task == 0 {
            return Err(AffinityError::InvalidConfig(
                "identities, groups and objects per task must be > 0".to_string(),
            ));
        }
        if self.objects < self.groups as u64 {
            return Err(AffinityError::InvalidConfig(format!(
                "need at least one object per group ({} objects, {} groups)",
                self.objects, self.groups
            )));
        }
        if self.nodes == 0 {
            return Err(AffinityError::InvalidConfig("nodes must be > 0".to_string()));
        }
        for (name, p) in [("noise", self.noise), ("conflict rate", self.conflict_rate)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(AffinityError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// One completed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub owner: Identity,
    pub objects: Vec<ObjectId>,
}

#[derive(Debug)]
pub struct Workload {
    config: WorkloadConfig,
    rng: StdRng,
    identities: Vec<Identity>,
    groups: HashMap<Identity, usize>,
}

impl Workload {
    pub fn new(config: WorkloadConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let identities: Vec<Identity> = (0..config.identities)
            .map(|i| Identity::new(format!("id-{:04}", i)))
            .collect();
        let groups = identities
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i % config.groups))
            .collect();
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            identities,
            groups,
        })
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Community an identity belongs to
    pub fn group_of(&self, identity: &Identity) -> Option<usize> {
        self.groups.get(identity).copied()
    }

    pub fn next_task(&mut self) -> Task {
        let idx = self.rng.gen_range(0..self.identities.len());
        let owner = self.identities[idx].clone();
        let group = idx % self.config.groups;

        let slice = self.config.objects / self.config.groups as u64;
        let base = slice * group as u64;
        let objects = (0..self.config.objects_per_task)
            .map(|_| {
                if self.rng.gen_bool(self.config.noise) {
                    ObjectId(self.rng.gen_range(0..self.config.objects))
                } else {
                    ObjectId(base + self.rng.gen_range(0..slice))
                }
            })
            .collect();
        Task { owner, objects }
    }

    /// A conflict report for one of `objects`, drawn with `conflict_rate`
    pub fn next_conflict(&mut self, objects: &[ObjectId]) -> Option<(ObjectId, NodeId)> {
        if objects.is_empty() || !self.rng.gen_bool(self.config.conflict_rate) {
            return None;
        }
        let object = objects[self.rng.gen_range(0..objects.len())];
        let node = NodeId(self.rng.gen_range(0..self.config.nodes));
        Some((object, node))
    }

    /// Fraction of total edge weight joining identities of the same community
    ///
    /// Returns 0.0 for an empty graph.
    pub fn cohesion(&self, graph: &AffinityGraphSnapshot) -> f64 {
        let total = graph.total_weight();
        if total == 0 {
            return 0.0;
        }
        let inside: u64 = graph
            .edges()
            .iter()
            .filter(|e| {
                let ga = self.group_of(&e.a);
                ga.is_some() && ga == self.group_of(&e.b)
            })
            .map(|e| e.weight)
            .sum();
        inside as f64 / total as f64
    }
}
