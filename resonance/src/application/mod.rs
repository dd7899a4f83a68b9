// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements mod

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::ResonanceEvent;

pub mod dispatcher;
pub mod field_aggregator;
pub mod queue_builder;
pub mod resonance_updater;
pub mod telemetry_aggregator;

/// Event bus trait for publishing domain events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: ResonanceEvent) -> Result<()>;
}

pub use dispatcher::{EngineConfig, EntityResonance, EventDispatcher};
pub use field_aggregator::{GlobalFieldAggregator, TickOutcome};
pub use queue_builder::{build_queue, PriorityQueueService};
pub use resonance_updater::{apply_equation, ResonanceUpdater, UpdateOutcome};
pub use telemetry_aggregator::{summarize, TelemetryAggregator, TelemetryReading};
