// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Global context field (θ) — slow-moving aggregate over active entities
//! Implements ADR-042 (Global Context Field)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

/// Singleton aggregate state. Owned and mutated only by the field
/// aggregator's tick; read-only to every other component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalField {
    pub theta: f64,
    pub updated_at: DateTime<Utc>,
    pub window_hours: i64,
    pub decay: f64,
    pub learning_rate: f64,
    pub momentum: f64,
    pub rho_min: f64,
    pub rho_max: f64,
}

impl GlobalField {
    pub fn new(config: &FieldConfig, now: DateTime<Utc>) -> Self {
        Self {
            theta: 0.0,
            updated_at: now,
            window_hours: config.window_hours,
            decay: config.decay,
            learning_rate: config.learning_rate,
            momentum: config.momentum,
            rho_min: config.rho_min,
            rho_max: config.rho_max,
        }
    }
}

/// Configuration for the global field aggregator.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// How often the periodic tick fires; also the debounce window for
    /// explicitly triggered runs.
    pub tick_interval: StdDuration,
    /// Decay factor δ applied to theta_prev each tick.
    pub decay: f64,
    /// Entities with phi at or below this do not contribute.
    pub activity_threshold: f64,
    /// Trailing activity window in hours.
    pub window_hours: i64,
    pub learning_rate: f64,
    pub momentum: f64,
    pub rho_min: f64,
    pub rho_max: f64,
    /// Whether the background tick task runs at all.
    pub enabled: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_secs(600), // Every 10 minutes
            decay: 0.05,
            activity_threshold: 0.1,
            window_hours: 24,
            learning_rate: 0.1,
            momentum: 0.1,
            rho_min: 0.1,
            rho_max: 2.0,
            enabled: true,
        }
    }
}
