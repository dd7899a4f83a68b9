// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Copy-on-write publication slot for the built priority queue
//!
//! The whole queue is replaced atomically on each rebuild; readers hold an `Arc`
//! to an immutable build and never block a concurrent rebuild.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::domain::{PriorityQueueSnapshot, ScoredCandidate};

/// An immutable, fully built queue cycle.
#[derive(Debug, Clone)]
pub struct BuiltQueue {
    pub snapshot: PriorityQueueSnapshot,
    /// Admitted candidates in queue order, with their scores.
    pub admitted: Vec<ScoredCandidate>,
}

impl BuiltQueue {
    pub fn empty() -> Self {
        Self {
            snapshot: PriorityQueueSnapshot::empty(Utc::now()),
            admitted: Vec::new(),
        }
    }
}

pub struct QueuePublisher {
    slot: RwLock<Arc<BuiltQueue>>,
}

impl QueuePublisher {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Arc::new(BuiltQueue::empty())),
        }
    }

    /// Current published build. Cheap clone of the `Arc`.
    pub fn load(&self) -> Arc<BuiltQueue> {
        self.slot.read().clone()
    }

    /// Atomically replace the published build.
    pub fn publish(&self, built: BuiltQueue) {
        *self.slot.write() = Arc::new(built);
    }
}

impl Default for QueuePublisher {
    fn default() -> Self {
        Self::new()
    }
}
