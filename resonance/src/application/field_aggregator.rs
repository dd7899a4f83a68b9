// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Global field aggregation - Background task for the decaying θ aggregate
//!
//! Implements the global context field from ADR-042: every tick folds the
//! active entities' phi·rho contributions into a slowly-decaying scalar.
//! Runs on an independent timer or by explicit trigger; both paths share the
//! same debounce window, so a run landing within `tick_interval` of the last
//! update is a no-op, not an error.
//!
//! The entity read is an eventually-consistent snapshot. θ is intentionally
//! slow-moving and tolerates staleness within one tick interval, which keeps
//! the tick free of cross-entity locking.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::application::EventBus;
use crate::domain::{FieldConfig, GlobalField, ResonanceEvent};
use crate::infrastructure::EntityReader;

/// Result of one tick attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Ticked { theta: f64, active_entities: usize },
    /// The field was updated less than `tick_interval` ago.
    Debounced,
}

pub struct GlobalFieldAggregator {
    entities: Arc<dyn EntityReader>,
    event_bus: Arc<dyn EventBus>,
    field: RwLock<GlobalField>,
    config: FieldConfig,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl GlobalFieldAggregator {
    pub fn new(
        entities: Arc<dyn EntityReader>,
        event_bus: Arc<dyn EventBus>,
        config: FieldConfig,
    ) -> Self {
        let field = GlobalField::new(&config, Utc::now());
        Self {
            entities,
            event_bus,
            field: RwLock::new(field),
            config,
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.shutdown_token.clone()
    }

    /// Current field state (read-only copy).
    pub async fn current(&self) -> GlobalField {
        self.field.read().await.clone()
    }

    /// Explicitly trigger a tick, subject to the debounce window.
    pub async fn trigger(&self) -> Result<TickOutcome> {
        self.tick(Utc::now()).await
    }

    /// Start the aggregator background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the tick loop with graceful shutdown support
    async fn run(&self) {
        if !self.config.enabled {
            info!("Global field aggregator is disabled");
            return;
        }

        info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            decay = self.config.decay,
            activity_threshold = self.config.activity_threshold,
            "Starting global field aggregator background task"
        );

        let mut tick = interval(self.config.tick_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(TickOutcome::Ticked { theta, active_entities }) => {
                            debug!(theta, active_entities, "Global field tick completed");
                        }
                        Ok(TickOutcome::Debounced) => {
                            debug!("Global field tick debounced");
                        }
                        Err(e) => {
                            warn!("Global field tick failed: {}", e);
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping global field aggregator");
                    break;
                }
            }
        }

        info!("Global field aggregator background task stopped");
    }

    /// Execute a single tick: debounce check, snapshot, fold, publish.
    ///
    /// The field write lock is held from the debounce check through the
    /// update so concurrent ticks serialize and at most one applies the
    /// decay fold per interval. No task holds an entity lock while waiting
    /// on the field, so the snapshot under the lock cannot deadlock.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let debounce = ChronoDuration::from_std(self.config.tick_interval)
            .unwrap_or_else(|_| ChronoDuration::seconds(600));

        let mut field = self.field.write().await;
        if now - field.updated_at < debounce {
            let last_updated = field.updated_at;
            drop(field);

            counter!("resonance_field_ticks_debounced_total").increment(1);
            self.event_bus
                .publish(ResonanceEvent::FieldTickDebounced {
                    last_updated,
                    timestamp: now,
                })
                .await?;
            return Ok(TickOutcome::Debounced);
        }

        let window = ChronoDuration::hours(self.config.window_hours);
        let snapshot = self.entities.snapshot().await;
        let active: Vec<_> = snapshot
            .iter()
            .filter(|e| e.is_active(self.config.activity_threshold, window, now))
            .collect();

        // S and hbar are both 0 when nothing is active, so theta decays
        // monotonically toward 0 on quiet ticks.
        let s: f64 = active.iter().map(|e| e.phi * e.rho).sum();
        let hbar = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|e| e.telemetry.surprise).sum::<f64>() / active.len() as f64
        };

        field.theta = (1.0 - self.config.decay) * field.theta + hbar * s;
        field.updated_at = now;
        let theta = field.theta;
        drop(field);

        gauge!("resonance_theta").set(theta);
        self.event_bus
            .publish(ResonanceEvent::FieldTicked {
                theta,
                active_entities: active.len(),
                timestamp: now,
            })
            .await?;

        Ok(TickOutcome::Ticked {
            theta,
            active_entities: active.len(),
        })
    }
}
