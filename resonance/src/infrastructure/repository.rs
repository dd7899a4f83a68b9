// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for the resonance bounded context

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{EntityId, OutcomeSample, ScoredEntity};

/// Read-only view of entity state for snapshot consumers (the field
/// aggregator and the queue builder). Snapshots are eventually consistent
/// with concurrent writers and intentionally take no global lock.
#[async_trait]
pub trait EntityReader: Send + Sync {
    /// Find an entity by its ID
    async fn get(&self, id: EntityId) -> Option<ScoredEntity>;

    /// Clone the current state of every entity, one short critical section
    /// per entity
    async fn snapshot(&self) -> Vec<ScoredEntity>;
}

/// Provider of raw outcome samples (the external telemetry source).
/// Fetches may block on I/O; callers bound them with a deadline.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// All samples for an entity within the trailing window
    async fn samples_for(&self, entity_id: EntityId, window: Duration)
        -> Result<Vec<OutcomeSample>>;

    /// How many samples of this family, from entities other than `exclude`,
    /// landed within the trailing window (surprise input)
    async fn family_occurrences(
        &self,
        family: &str,
        exclude: EntityId,
        window: Duration,
    ) -> Result<usize>;
}
