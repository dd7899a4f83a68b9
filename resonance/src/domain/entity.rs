// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scored entity (motif) state for the resonance engine
//! Implements ADR-041 (Recursive Resonance Scoring)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::telemetry::TelemetrySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-entity resonance state.
///
/// Created on the first telemetry event for an id and mutated only through
/// the recursive update equation under the per-id write lock. Entities are
/// never deleted; inactive ones soft-decay toward zero through the natural
/// recursion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub id: EntityId,
    /// Resonance strength, clamped to `[0, phi_max]`.
    pub phi: f64,
    /// Recursive feedback factor, clamped to `[rho_min, rho_max]`.
    pub rho: f64,
    /// Last trustworthy telemetry summary applied to this entity.
    pub telemetry: TelemetrySummary,
    pub phi_updated_at: DateTime<Utc>,
    pub rho_updated_at: DateTime<Utc>,
}

impl ScoredEntity {
    /// Initial state before the first update: phi=0, rho=1 (ADR-041 §Seed).
    pub fn new(id: EntityId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            phi: 0.0,
            rho: 1.0,
            telemetry: TelemetrySummary::default(),
            phi_updated_at: now,
            rho_updated_at: now,
        }
    }

    /// Whether this entity contributes to the global field: phi above the
    /// activity threshold and a telemetry update within the trailing window.
    pub fn is_active(&self, threshold: f64, window: Duration, now: DateTime<Utc>) -> bool {
        self.phi > threshold && now - self.phi_updated_at <= window
    }
}

/// Constants of the recursive update equation (ADR-041).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConstants {
    /// Confirmation-rate weight (λ1).
    pub lambda1: f64,
    /// Contradiction-rate weight (λ2).
    pub lambda2: f64,
    /// Learning rate for rho (α).
    pub alpha: f64,
    /// Momentum retained from phi_prev (γ).
    pub gamma: f64,
    /// Surprise boost factor (k).
    pub surprise_boost: f64,
    pub phi_max: f64,
    pub rho_min: f64,
    pub rho_max: f64,
}

impl Default for ResonanceConstants {
    fn default() -> Self {
        Self {
            lambda1: 0.3,
            lambda2: 0.5,
            alpha: 0.1,
            gamma: 0.1,
            surprise_boost: 0.2,
            phi_max: 2.0,
            rho_min: 0.1,
            rho_max: 2.0,
        }
    }
}

/// NaN/overflow/malformed numeric input to the update equation. Prior state
/// is retained; the fault is diagnostic, never fatal to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("computation fault: {reason}")]
pub struct ComputationFault {
    pub reason: String,
}

impl ComputationFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
