// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Telemetry aggregation — windowed outcome statistics per entity
//!
//! Turns raw outcome samples into a [`TelemetrySummary`] of success,
//! confirmation, and contradiction rates plus the family-rarity surprise
//! boost. Summaries below the sample minimum are reported as
//! [`TelemetryReading::Insufficient`], which downstream treats as a no-op,
//! not an error.

use anyhow::Result;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::{surprise_score, EntityId, OutcomeSample, TelemetryConfig, TelemetrySummary};
use crate::infrastructure::SampleSource;

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryReading {
    /// Enough samples to trust; safe to feed the update equation.
    Ready(TelemetrySummary),
    /// Below the sample minimum (or fetch deadline hit); prior entity state
    /// must be retained unchanged.
    Insufficient { sample_count: usize },
}

pub struct TelemetryAggregator {
    source: Arc<dyn SampleSource>,
    config: TelemetryConfig,
}

impl TelemetryAggregator {
    pub fn new(source: Arc<dyn SampleSource>, config: TelemetryConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Aggregate the entity's trailing-window samples into a summary.
    ///
    /// The sample fetch is bounded by `fetch_timeout`; a timeout degrades to
    /// `Insufficient` rather than failing the dispatch cycle.
    pub async fn aggregate(&self, entity_id: EntityId, family: &str) -> Result<TelemetryReading> {
        let fetched = timeout(self.config.fetch_timeout, async {
            let samples = self.source.samples_for(entity_id, self.config.window).await?;
            let occurrences = self
                .source
                .family_occurrences(family, entity_id, self.config.rarity_window)
                .await?;
            Ok::<_, anyhow::Error>((samples, occurrences))
        })
        .await;

        let (samples, occurrences) = match fetched {
            Ok(result) => result?,
            Err(_) => {
                warn!(%entity_id, timeout_ms = self.config.fetch_timeout.as_millis() as u64,
                      "Telemetry fetch deadline exceeded, treating as insufficient data");
                return Ok(TelemetryReading::Insufficient { sample_count: 0 });
            }
        };

        if samples.len() < self.config.min_samples {
            return Ok(TelemetryReading::Insufficient {
                sample_count: samples.len(),
            });
        }

        Ok(TelemetryReading::Ready(summarize(
            &samples,
            occurrences,
            &self.config,
        )))
    }
}

/// Compute the summary statistics over an already-windowed sample set.
pub fn summarize(
    samples: &[OutcomeSample],
    family_occurrences: usize,
    config: &TelemetryConfig,
) -> TelemetrySummary {
    let n = samples.len() as f64;

    let sr = samples.iter().filter(|s| s.outcome_value > 0.0).count() as f64 / n;
    let cr = samples
        .iter()
        .filter(|s| s.confidence > config.confirmation_threshold)
        .count() as f64
        / n;
    let xr = samples
        .iter()
        .filter(|s| s.outcome_value < config.contradiction_threshold)
        .count() as f64
        / n;

    TelemetrySummary {
        sr,
        cr,
        xr,
        surprise: surprise_score(family_occurrences),
        sample_count: samples.len(),
    }
}
