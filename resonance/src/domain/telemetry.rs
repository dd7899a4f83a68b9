// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Outcome samples and windowed telemetry summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

use super::entity::EntityId;

/// A raw outcome event reported by an upstream collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSample {
    pub entity_id: EntityId,
    /// Family the entity's motif belongs to. Assigned externally; this core
    /// never classifies motifs itself.
    pub family: String,
    /// Normalized outcome on [-1, 1].
    pub outcome_value: f64,
    /// Reporter confidence on [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Windowed statistical summary for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Fraction of samples with a positive outcome.
    pub sr: f64,
    /// Fraction of samples with confidence above the confirmation threshold.
    pub cr: f64,
    /// Fraction of samples with a strongly negative outcome.
    pub xr: f64,
    /// Rarity boost for the entity's family, see [`surprise_score`].
    pub surprise: f64,
    pub sample_count: usize,
}

impl Default for TelemetrySummary {
    fn default() -> Self {
        Self {
            sr: 0.0,
            cr: 0.0,
            xr: 0.0,
            surprise: 0.0,
            sample_count: 0,
        }
    }
}

/// Rarity score from the count of *other* occurrences of a family within the
/// trailing 24h. Discrete step function; the breakpoints are part of the
/// scoring contract and must not be smoothed.
pub fn surprise_score(other_occurrences: usize) -> f64 {
    if other_occurrences == 0 {
        1.0
    } else if other_occurrences < 5 {
        0.8
    } else if other_occurrences < 20 {
        0.5
    } else {
        0.2
    }
}

/// Configuration for telemetry aggregation.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Trailing window over which outcome statistics are computed.
    pub window: StdDuration,
    /// Summaries with fewer samples than this are not trustworthy and
    /// produce no downstream update.
    pub min_samples: usize,
    /// Confidence above this counts toward `cr`.
    pub confirmation_threshold: f64,
    /// Outcomes below this count toward `xr`.
    pub contradiction_threshold: f64,
    /// Trailing window for the family rarity count behind [`surprise_score`].
    /// Fixed at 24h by contract, independent of `window`: shrinking the
    /// outcome window must not inflate surprise.
    pub rarity_window: StdDuration,
    /// Deadline for the sample fetch; timeout degrades to insufficient data.
    pub fetch_timeout: StdDuration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window: StdDuration::from_secs(24 * 3600),
            min_samples: 10,
            confirmation_threshold: 0.7,
            contradiction_threshold: -0.5,
            rarity_window: StdDuration::from_secs(24 * 3600),
            fetch_timeout: StdDuration::from_secs(5),
        }
    }
}
