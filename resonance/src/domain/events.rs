// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the resonance bounded context
//! Published to the EventBus for observability and host integration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::entity::EntityId;

/// Resonance domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResonanceEvent {
    /// An entity's (phi, rho) state advanced through the update equation
    EntityScored {
        entity_id: EntityId,
        old_phi: f64,
        new_phi: f64,
        old_rho: f64,
        new_rho: f64,
        sample_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Telemetry was below the trust minimum; prior state retained
    UpdateSkipped {
        entity_id: EntityId,
        sample_count: usize,
        min_samples: usize,
        timestamp: DateTime<Utc>,
    },

    /// NaN/overflow during the update; prior state retained
    ComputationFault {
        entity_id: EntityId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The global field advanced one tick
    FieldTicked {
        theta: f64,
        active_entities: usize,
        timestamp: DateTime<Utc>,
    },

    /// A triggered field run landed inside the debounce window
    FieldTickDebounced {
        last_updated: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A fresh priority queue snapshot was published
    QueueRebuilt {
        admitted: usize,
        submitted: usize,
        family_counts: HashMap<String, usize>,
        timestamp: DateTime<Utc>,
    },
}

impl ResonanceEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ResonanceEvent::EntityScored { timestamp, .. } => *timestamp,
            ResonanceEvent::UpdateSkipped { timestamp, .. } => *timestamp,
            ResonanceEvent::ComputationFault { timestamp, .. } => *timestamp,
            ResonanceEvent::FieldTicked { timestamp, .. } => *timestamp,
            ResonanceEvent::FieldTickDebounced { timestamp, .. } => *timestamp,
            ResonanceEvent::QueueRebuilt { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ResonanceEvent::EntityScored { .. } => "entity_scored",
            ResonanceEvent::UpdateSkipped { .. } => "update_skipped",
            ResonanceEvent::ComputationFault { .. } => "computation_fault",
            ResonanceEvent::FieldTicked { .. } => "field_ticked",
            ResonanceEvent::FieldTickDebounced { .. } => "field_tick_debounced",
            ResonanceEvent::QueueRebuilt { .. } => "queue_rebuilt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ResonanceEvent::EntityScored {
            entity_id: EntityId::new(),
            old_phi: 0.5,
            new_phi: 0.55744,
            old_rho: 1.0,
            new_rho: 1.08,
            sample_count: 12,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ResonanceEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
    }

    #[test]
    fn test_event_types() {
        let now = Utc::now();
        let event = ResonanceEvent::FieldTickDebounced {
            last_updated: now,
            timestamp: now,
        };

        assert_eq!(event.event_type(), "field_tick_debounced");
        assert_eq!(event.timestamp(), now);
    }
}
