// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory outcome sample store
//!
//! Default [`SampleSource`] backing for the engine: retains reported samples
//! per entity, keeps a flat family index for surprise counting, and drops
//! samples that age out of the retention window.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::{EntityId, OutcomeSample};
use crate::infrastructure::repository::SampleSource;

pub struct SampleStore {
    samples: RwLock<HashMap<EntityId, Vec<OutcomeSample>>>,
    /// Retention horizon; samples older than this are pruned on write.
    retention: Duration,
}

impl SampleStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Record a sample and prune that entity's aged-out history.
    pub async fn record(&self, sample: OutcomeSample) {
        let horizon = Utc::now() - chrono_duration(self.retention);
        let mut samples = self.samples.write().await;
        let entry = samples.entry(sample.entity_id).or_default();
        entry.push(sample);
        entry.retain(|s| s.timestamp >= horizon);
    }

    pub async fn sample_count(&self, entity_id: EntityId) -> usize {
        let samples = self.samples.read().await;
        samples.get(&entity_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        // Keep twice the scoring window so surprise counts never starve.
        Self::new(Duration::from_secs(48 * 3600))
    }
}

fn chrono_duration(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or_else(|_| ChronoDuration::hours(24))
}

fn within_window(timestamp: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now - timestamp <= chrono_duration(window)
}

#[async_trait]
impl SampleSource for SampleStore {
    async fn samples_for(
        &self,
        entity_id: EntityId,
        window: Duration,
    ) -> Result<Vec<OutcomeSample>> {
        let now = Utc::now();
        let samples = self.samples.read().await;

        Ok(samples
            .get(&entity_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|s| within_window(s.timestamp, window, now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn family_occurrences(
        &self,
        family: &str,
        exclude: EntityId,
        window: Duration,
    ) -> Result<usize> {
        let now = Utc::now();
        let samples = self.samples.read().await;

        Ok(samples
            .iter()
            .filter(|(id, _)| **id != exclude)
            .flat_map(|(_, entries)| entries.iter())
            .filter(|s| s.family == family && within_window(s.timestamp, window, now))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(entity_id: EntityId, family: &str, age_hours: i64) -> OutcomeSample {
        OutcomeSample {
            entity_id,
            family: family.to_string(),
            outcome_value: 0.5,
            confidence: 0.9,
            timestamp: Utc::now() - ChronoDuration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn test_record_and_fetch_window() {
        let store = SampleStore::default();
        let id = EntityId::new();

        store.record(sample(id, "breakout", 1)).await;
        store.record(sample(id, "breakout", 30)).await;

        let window = Duration::from_secs(24 * 3600);
        let in_window = store.samples_for(id, window).await.unwrap();
        assert_eq!(in_window.len(), 1);
        assert_eq!(store.sample_count(id).await, 2);
    }

    #[tokio::test]
    async fn test_family_occurrences_excludes_own_entity() {
        let store = SampleStore::default();
        let me = EntityId::new();
        let other = EntityId::new();
        let window = Duration::from_secs(24 * 3600);

        store.record(sample(me, "breakout", 1)).await;
        store.record(sample(other, "breakout", 1)).await;
        store.record(sample(other, "meanrev", 1)).await;

        let count = store.family_occurrences("breakout", me, window).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_retention_prunes_old_samples() {
        let store = SampleStore::new(Duration::from_secs(3600));
        let id = EntityId::new();

        store.record(sample(id, "breakout", 2)).await;
        store.record(sample(id, "breakout", 0)).await;

        assert_eq!(store.sample_count(id).await, 1);
    }
}
