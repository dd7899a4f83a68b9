// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Candidate experiments and the admitted priority queue snapshot
//! Implements ADR-043 (Fair Queue Admission)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub Uuid);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

/// A candidate experiment supplied by the experiment-design subsystem.
/// Read-only input to the queue builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateExperiment {
    pub id: CandidateId,
    pub family: String,
    pub entity_id: EntityId,
    pub created_at: DateTime<Utc>,
}

/// A candidate after scoring, as exposed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: CandidateId,
    pub family: String,
    pub resonance_score: f64,
}

/// Fully rebuilt each cycle and immutable once published; never patched
/// incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityQueueSnapshot {
    pub queue_order: Vec<CandidateId>,
    pub family_counts: HashMap<String, usize>,
    pub built_at: DateTime<Utc>,
}

impl PriorityQueueSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            queue_order: Vec::new(),
            family_counts: HashMap::new(),
            built_at: now,
        }
    }
}

/// How many queue slots one family may occupy.
///
/// The two schemes are alternatives, never mixed within a build: `Fixed`
/// caps every family at the same integer, `CapacityFraction` derives the cap
/// as `floor(total_capacity * fraction)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FamilyCapPolicy {
    Fixed { cap: usize },
    CapacityFraction { fraction: f64 },
}

impl FamilyCapPolicy {
    pub fn cap_for(&self, total_capacity: usize) -> usize {
        match self {
            FamilyCapPolicy::Fixed { cap } => *cap,
            FamilyCapPolicy::CapacityFraction { fraction } => {
                (total_capacity as f64 * fraction).floor() as usize
            }
        }
    }
}

impl Default for FamilyCapPolicy {
    fn default() -> Self {
        FamilyCapPolicy::Fixed { cap: 3 }
    }
}

/// Configuration for queue construction.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub total_capacity: usize,
    pub family_cap: FamilyCapPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            total_capacity: 50,
            family_cap: FamilyCapPolicy::default(),
        }
    }
}
