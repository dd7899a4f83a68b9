// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Priority queue construction under per-family fairness caps (ADR-043)
//!
//! Candidates are scored `phi · rho · surprise` from the referenced entity's
//! current state, stable-sorted, and admitted greedily until the family cap
//! or total capacity stops them. Each build replaces the published queue
//! atomically; nothing is ever patched in place, so concurrent rebuilds can
//! never interleave partial state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::gauge;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::application::EventBus;
use crate::domain::{
    CandidateExperiment, EntityId, PriorityQueueSnapshot, QueueConfig, ResonanceEvent,
    ScoredCandidate, ScoredEntity,
};
use crate::infrastructure::{BuiltQueue, EntityReader, QueuePublisher};

/// Build one queue cycle from a fixed snapshot of candidates and entities.
///
/// Deterministic: identical inputs produce bit-identical ordering and family
/// counts. Candidates referencing an unknown entity score 0.0 and sort last
/// rather than being excluded.
pub fn build_queue(
    candidates: &[CandidateExperiment],
    entities: &HashMap<EntityId, ScoredEntity>,
    config: &QueueConfig,
    now: DateTime<Utc>,
) -> BuiltQueue {
    let mut scored: Vec<(ScoredCandidate, DateTime<Utc>)> = candidates
        .iter()
        .map(|c| {
            let score = entities
                .get(&c.entity_id)
                .map(|e| e.phi * e.rho * e.telemetry.surprise)
                .unwrap_or(0.0);
            (
                ScoredCandidate {
                    id: c.id,
                    family: c.family.clone(),
                    resonance_score: score,
                },
                c.created_at,
            )
        })
        .collect();

    // Stable sort: descending by score, exact ties broken oldest-first.
    scored.sort_by(|a, b| {
        b.0.resonance_score
            .partial_cmp(&a.0.resonance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let family_cap = config.family_cap.cap_for(config.total_capacity);
    let mut family_counts: HashMap<String, usize> = HashMap::new();
    let mut admitted: Vec<ScoredCandidate> = Vec::new();

    for (candidate, _) in scored {
        if admitted.len() >= config.total_capacity {
            break;
        }
        let count = family_counts.entry(candidate.family.clone()).or_insert(0);
        if *count >= family_cap {
            // Over-cap candidates are dropped this cycle; carry-over is the
            // submitter's job via resubmission.
            continue;
        }
        *count += 1;
        admitted.push(candidate);
    }

    family_counts.retain(|_, count| *count > 0);

    BuiltQueue {
        snapshot: PriorityQueueSnapshot {
            queue_order: admitted.iter().map(|c| c.id).collect(),
            family_counts,
            built_at: now,
        },
        admitted,
    }
}

/// Application service owning candidate intake and snapshot publication.
pub struct PriorityQueueService {
    entities: Arc<dyn EntityReader>,
    publisher: Arc<QueuePublisher>,
    event_bus: Arc<dyn EventBus>,
    config: QueueConfig,
    /// Candidates submitted since the last build. Drained on rebuild.
    pending: Mutex<Vec<CandidateExperiment>>,
}

impl PriorityQueueService {
    pub fn new(
        entities: Arc<dyn EntityReader>,
        publisher: Arc<QueuePublisher>,
        event_bus: Arc<dyn EventBus>,
        config: QueueConfig,
    ) -> Self {
        Self {
            entities,
            publisher,
            event_bus,
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Accept candidates for the next build. Duplicate ids keep their first
    /// submission (and thus their original position for tie-breaks).
    pub async fn submit(&self, candidates: Vec<CandidateExperiment>) {
        let mut pending = self.pending.lock().await;
        for candidate in candidates {
            if !pending.iter().any(|c| c.id == candidate.id) {
                pending.push(candidate);
            }
        }
    }

    /// Rebuild from the pending set and publish the result atomically.
    pub async fn rebuild(&self) -> Result<Arc<BuiltQueue>> {
        let candidates: Vec<CandidateExperiment> = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };

        let entities: HashMap<EntityId, ScoredEntity> = self
            .entities
            .snapshot()
            .await
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let now = Utc::now();
        let built = build_queue(&candidates, &entities, &self.config, now);

        info!(
            admitted = built.admitted.len(),
            submitted = candidates.len(),
            "Priority queue rebuilt"
        );
        gauge!("resonance_queue_depth").set(built.admitted.len() as f64);

        self.event_bus
            .publish(ResonanceEvent::QueueRebuilt {
                admitted: built.admitted.len(),
                submitted: candidates.len(),
                family_counts: built.snapshot.family_counts.clone(),
                timestamp: now,
            })
            .await?;

        self.publisher.publish(built);
        Ok(self.publisher.load())
    }

    /// Top admitted candidates from the current published build.
    pub fn top_candidates(&self, limit: usize) -> (Vec<ScoredCandidate>, HashMap<String, usize>) {
        let current = self.publisher.load();
        (
            current.admitted.iter().take(limit).cloned().collect(),
            current.snapshot.family_counts.clone(),
        )
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> PriorityQueueSnapshot {
        self.publisher.load().snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FamilyCapPolicy, TelemetrySummary};
    use chrono::Duration as ChronoDuration;

    fn entity(phi: f64, rho: f64, surprise: f64) -> ScoredEntity {
        let mut e = ScoredEntity::new(EntityId::new(), Utc::now());
        e.phi = phi;
        e.rho = rho;
        e.telemetry = TelemetrySummary {
            sr: 0.5,
            cr: 0.5,
            xr: 0.0,
            surprise,
            sample_count: 20,
        };
        e
    }

    fn candidate(family: &str, entity_id: EntityId, age_secs: i64) -> CandidateExperiment {
        CandidateExperiment {
            id: crate::domain::CandidateId::new(),
            family: family.to_string(),
            entity_id,
            created_at: Utc::now() - ChronoDuration::seconds(age_secs),
        }
    }

    fn entity_with_score(score_phi: f64) -> ScoredEntity {
        // rho=1, surprise=1 so resonance_score == phi
        entity(score_phi, 1.0, 1.0)
    }

    #[test]
    fn test_family_cap_admission_ordering() {
        // A(F1,0.9) B(F1,0.8) C(F1,0.7) D(F2,0.5), cap=2, capacity=3
        // => [A, B, D]: C excluded despite outscoring D.
        let entities: Vec<ScoredEntity> = [0.9, 0.8, 0.7, 0.5]
            .iter()
            .map(|phi| entity_with_score(*phi))
            .collect();

        let candidates = vec![
            candidate("F1", entities[0].id, 40),
            candidate("F1", entities[1].id, 30),
            candidate("F1", entities[2].id, 20),
            candidate("F2", entities[3].id, 10),
        ];

        let map: HashMap<EntityId, ScoredEntity> =
            entities.into_iter().map(|e| (e.id, e)).collect();
        let config = QueueConfig {
            total_capacity: 3,
            family_cap: FamilyCapPolicy::Fixed { cap: 2 },
        };

        let built = build_queue(&candidates, &map, &config, Utc::now());
        let order = &built.snapshot.queue_order;
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], candidates[0].id);
        assert_eq!(order[1], candidates[1].id);
        assert_eq!(order[2], candidates[3].id);
        assert_eq!(built.snapshot.family_counts["F1"], 2);
        assert_eq!(built.snapshot.family_counts["F2"], 1);
    }

    #[test]
    fn test_no_family_exceeds_cap() {
        let mut entities = Vec::new();
        let mut candidates = Vec::new();
        for i in 0..20 {
            let e = entity_with_score(1.0 + i as f64 * 0.01);
            candidates.push(candidate("F1", e.id, i));
            entities.push(e);
        }
        let map: HashMap<EntityId, ScoredEntity> =
            entities.into_iter().map(|e| (e.id, e)).collect();

        let built = build_queue(&candidates, &map, &QueueConfig::default(), Utc::now());
        assert_eq!(built.admitted.len(), 3);
        assert_eq!(built.snapshot.family_counts["F1"], 3);
    }

    #[test]
    fn test_missing_entity_scores_zero_and_sorts_last() {
        let known = entity_with_score(0.4);
        let candidates = vec![
            candidate("F1", EntityId::new(), 10), // unscored entity
            candidate("F2", known.id, 5),
        ];
        let map = HashMap::from([(known.id, known)]);

        let built = build_queue(&candidates, &map, &QueueConfig::default(), Utc::now());
        assert_eq!(built.admitted.len(), 2);
        assert_eq!(built.admitted[0].id, candidates[1].id);
        assert_eq!(built.admitted[1].id, candidates[0].id);
        assert_eq!(built.admitted[1].resonance_score, 0.0);
    }

    #[test]
    fn test_score_ties_break_oldest_first() {
        let a = entity_with_score(0.5);
        let b = entity_with_score(0.5);
        let older = candidate("F1", a.id, 100);
        let newer = candidate("F2", b.id, 10);
        let map: HashMap<EntityId, ScoredEntity> =
            [a, b].into_iter().map(|e| (e.id, e)).collect();

        // Submission order puts the newer one first; the tie-break must not.
        let built = build_queue(
            &[newer.clone(), older.clone()],
            &map,
            &QueueConfig::default(),
            Utc::now(),
        );
        assert_eq!(built.snapshot.queue_order[0], older.id);
        assert_eq!(built.snapshot.queue_order[1], newer.id);
    }

    #[test]
    fn test_identical_inputs_build_identical_queues() {
        let mut entities = Vec::new();
        let mut candidates = Vec::new();
        for i in 0..30 {
            let e = entity_with_score((i % 7) as f64 * 0.1);
            candidates.push(candidate(&format!("F{}", i % 4), e.id, i));
            entities.push(e);
        }
        let map: HashMap<EntityId, ScoredEntity> =
            entities.into_iter().map(|e| (e.id, e)).collect();

        let now = Utc::now();
        let first = build_queue(&candidates, &map, &QueueConfig::default(), now);
        let second = build_queue(&candidates, &map, &QueueConfig::default(), now);

        assert_eq!(first.snapshot.queue_order, second.snapshot.queue_order);
        assert_eq!(first.snapshot.family_counts, second.snapshot.family_counts);
    }

    #[test]
    fn test_total_capacity_bounds_admission() {
        let mut entities = Vec::new();
        let mut candidates = Vec::new();
        for i in 0..10 {
            let e = entity_with_score(0.5);
            candidates.push(candidate(&format!("F{i}"), e.id, i));
            entities.push(e);
        }
        let map: HashMap<EntityId, ScoredEntity> =
            entities.into_iter().map(|e| (e.id, e)).collect();

        let config = QueueConfig {
            total_capacity: 4,
            family_cap: FamilyCapPolicy::Fixed { cap: 3 },
        };
        let built = build_queue(&candidates, &map, &config, Utc::now());
        assert_eq!(built.admitted.len(), 4);
    }
}
