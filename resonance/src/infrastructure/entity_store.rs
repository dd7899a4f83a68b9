// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory entity store with per-id write locking
//!
//! Replaces the source system's shared mutable map: writers must go through
//! [`EntityStore::lock_entry`], which hands out an owned mutex guard for
//! exactly one entity. Readers clone entity-by-entity, so a snapshot costs
//! one short critical section per entity and never blocks writers globally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{EntityId, ScoredEntity};
use crate::infrastructure::repository::EntityReader;

/// Exclusive write handle for one entity. Holding it is the single-writer
/// guarantee; a second writer for the same id parks on the mutex in arrival
/// order, which preserves causal update order per entity.
pub type EntityGuard = OwnedMutexGuard<ScoredEntity>;

pub struct EntityStore {
    entries: DashMap<EntityId, Arc<Mutex<ScoredEntity>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Lock the entity for writing, creating seed state on first contact.
    pub async fn lock_entry(&self, id: EntityId, now: DateTime<Utc>) -> EntityGuard {
        let cell = self
            .entries
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(ScoredEntity::new(id, now))))
            .value()
            .clone();
        // The dashmap shard guard is dropped before this await point.
        cell.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityReader for EntityStore {
    async fn get(&self, id: EntityId) -> Option<ScoredEntity> {
        let cell = self.entries.get(&id)?.value().clone();
        let entity = cell.lock().await;
        Some(entity.clone())
    }

    async fn snapshot(&self) -> Vec<ScoredEntity> {
        let cells: Vec<Arc<Mutex<ScoredEntity>>> =
            self.entries.iter().map(|e| e.value().clone()).collect();

        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(cell.lock().await.clone());
        }
        out
    }
}
