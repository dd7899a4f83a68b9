// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event dispatcher - coordinating layer and engine facade
//!
//! Routes telemetry, update, tick, and queue events through the pipeline in
//! causal order: per entity the cycle is
//! `Idle → TelemetryReceived → ResonanceUpdated → Idle`, serialized on the
//! per-id lock; the global field runs its own independent
//! `Waiting → Due → Ticked → Waiting` cycle on a background task owned here.
//! Queue rebuilds read snapshots only and never block either of the above.
//!
//! Faults in one entity's pipeline are contained there; they never abort
//! processing of other entities or cycles.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::field_aggregator::{GlobalFieldAggregator, TickOutcome};
use crate::application::queue_builder::PriorityQueueService;
use crate::application::resonance_updater::{ResonanceUpdater, UpdateOutcome};
use crate::application::telemetry_aggregator::{TelemetryAggregator, TelemetryReading};
use crate::application::EventBus;
use crate::domain::{
    CandidateExperiment, EntityId, FieldConfig, GlobalField, OutcomeSample, QueueConfig,
    ResonanceConstants, ResonanceEvent, ScoredCandidate, TelemetryConfig,
};
use crate::infrastructure::{
    BroadcastEventBus, BuiltQueue, EntityReader, EntityStore, EventReceiver, QueuePublisher,
    SampleStore,
};

/// Engine-wide configuration, one section per stage.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub telemetry: TelemetryConfig,
    pub constants: ResonanceConstants,
    pub field: FieldConfig,
    pub queue: QueueConfig,
}

/// A collaborator-facing view of one entity's resonance state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EntityResonance {
    pub phi: f64,
    pub rho: f64,
    pub last_updated: DateTime<Utc>,
}

pub struct EventDispatcher {
    samples: Arc<SampleStore>,
    entities: Arc<EntityStore>,
    aggregator: TelemetryAggregator,
    updater: ResonanceUpdater,
    field: Arc<GlobalFieldAggregator>,
    queue: Arc<PriorityQueueService>,
    event_bus: Arc<BroadcastEventBus>,
    field_task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    min_samples: usize,
}

impl EventDispatcher {
    pub fn new(config: EngineConfig) -> Self {
        let event_bus = Arc::new(BroadcastEventBus::with_default_capacity());
        let bus: Arc<dyn EventBus> = event_bus.clone();

        let samples = Arc::new(SampleStore::default());
        let entities = Arc::new(EntityStore::new());
        let reader: Arc<dyn EntityReader> = entities.clone();

        let aggregator = TelemetryAggregator::new(samples.clone(), config.telemetry.clone());
        let updater = ResonanceUpdater::new(entities.clone(), bus.clone(), config.constants);
        let field = Arc::new(GlobalFieldAggregator::new(
            reader.clone(),
            bus.clone(),
            config.field,
        ));
        let queue = Arc::new(PriorityQueueService::new(
            reader,
            Arc::new(QueuePublisher::new()),
            bus,
            config.queue,
        ));

        Self {
            samples,
            entities,
            aggregator,
            updater,
            field,
            queue,
            event_bus,
            field_task: parking_lot::Mutex::new(None),
            min_samples: config.telemetry.min_samples,
        }
    }

    /// Spawn the global field background tick task.
    pub fn start(&self) {
        let mut task = self.field_task.lock();
        if task.is_some() {
            warn!("Dispatcher already started");
            return;
        }
        info!("Starting resonance event dispatcher");
        *task = Some(self.field.clone().start());
    }

    /// Stop background work and wait for it to finish.
    pub async fn shutdown(&self) {
        self.field.shutdown_token().cancel();
        let task = self.field_task.lock().take();
        if let Some(handle) = task {
            let _ = handle.await;
        }
        info!("Resonance event dispatcher stopped");
    }

    /// Subscribe to the engine's domain events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    // ---- inbound -----------------------------------------------------------

    /// Record a raw outcome sample and run the entity's scoring pipeline.
    ///
    /// Aggregation reads a sample window; the subsequent update is serialized
    /// on the entity's lock, so concurrent reports for the same id apply in
    /// arrival order and reports for different ids run in parallel.
    pub async fn report_outcome_sample(
        &self,
        entity_id: EntityId,
        outcome_value: f64,
        confidence: f64,
        family: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        self.samples
            .record(OutcomeSample {
                entity_id,
                family: family.to_string(),
                outcome_value,
                confidence,
                timestamp,
            })
            .await;

        match self.aggregator.aggregate(entity_id, family).await? {
            TelemetryReading::Ready(summary) => {
                self.updater.apply(entity_id, summary, Utc::now()).await
            }
            TelemetryReading::Insufficient { sample_count } => {
                self.event_bus
                    .publish(ResonanceEvent::UpdateSkipped {
                        entity_id,
                        sample_count,
                        min_samples: self.min_samples,
                        timestamp: Utc::now(),
                    })
                    .await?;
                Ok(UpdateOutcome::Skipped { sample_count })
            }
        }
    }

    /// Accept candidate experiments and rebuild the queue.
    pub async fn submit_candidates(
        &self,
        candidates: Vec<CandidateExperiment>,
    ) -> Result<Arc<BuiltQueue>> {
        self.queue.submit(candidates).await;
        self.queue.rebuild().await
    }

    /// Rebuild the queue from the currently pending candidates.
    pub async fn rebuild_queue(&self) -> Result<Arc<BuiltQueue>> {
        self.queue.rebuild().await
    }

    /// Explicitly trigger a global field tick (debounced).
    pub async fn trigger_field_tick(&self) -> Result<TickOutcome> {
        self.field.trigger().await
    }

    // ---- outbound ----------------------------------------------------------

    /// Current resonance state for an entity, if it has ever been seen.
    pub async fn entity_resonance(&self, entity_id: EntityId) -> Option<EntityResonance> {
        let entity = self.entities.get(entity_id).await?;
        Some(EntityResonance {
            phi: entity.phi,
            rho: entity.rho,
            last_updated: entity.phi_updated_at.max(entity.rho_updated_at),
        })
    }

    /// Current global field state.
    pub async fn global_field(&self) -> GlobalField {
        self.field.current().await
    }

    /// Top admitted candidates with the published family counts.
    pub fn top_candidates(&self, limit: usize) -> (Vec<ScoredCandidate>, HashMap<String, usize>) {
        self.queue.top_candidates(limit)
    }
}
