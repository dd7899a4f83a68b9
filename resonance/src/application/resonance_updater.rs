// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Recursive resonance update — the (phi, rho) equation (ADR-041)
//!
//! The update is a non-commutative read-modify-write: two updates for the
//! same entity applied out of order produce a different result than applied
//! in causal order. All writes therefore go through the entity store's
//! per-id lock; different ids update fully independently.
//!
//! Numeric faults (NaN, overflow, non-finite telemetry) retain the entity's
//! last-known-good state and surface as a diagnostic, never a crash.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::EventBus;
use crate::domain::{
    ComputationFault, EntityId, ResonanceConstants, ResonanceEvent, TelemetrySummary,
};
use crate::infrastructure::EntityStore;

/// Result of applying one telemetry summary to an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The equation advanced the entity's state.
    Applied { phi: f64, rho: f64 },
    /// Telemetry was below the trust minimum; state untouched.
    Skipped { sample_count: usize },
    /// Numeric fault; state rolled forward unchanged.
    Faulted { fault: ComputationFault },
}

/// Apply the recursive update equation to one prior state.
///
/// ```text
/// delta_phi = (sr + λ1·cr − λ2·xr) − phi_prev
/// rho_new   = clip(rho_prev + α·delta_phi, rho_min, rho_max)
/// phi_mid   = (1−γ)·(phi_prev·rho_new) + γ·phi_prev
/// phi_new   = clip(phi_mid·(1 + surprise·k), 0, phi_max)
/// ```
///
/// Fails (without side effects) on any non-finite input or intermediate.
pub fn apply_equation(
    phi_prev: f64,
    rho_prev: f64,
    telemetry: &TelemetrySummary,
    constants: &ResonanceConstants,
) -> Result<(f64, f64), ComputationFault> {
    let inputs = [
        phi_prev,
        rho_prev,
        telemetry.sr,
        telemetry.cr,
        telemetry.xr,
        telemetry.surprise,
    ];
    if inputs.iter().any(|v| !v.is_finite()) {
        return Err(ComputationFault::new(format!(
            "non-finite input: phi_prev={phi_prev}, rho_prev={rho_prev}, telemetry={telemetry:?}"
        )));
    }

    let delta_phi =
        (telemetry.sr + constants.lambda1 * telemetry.cr - constants.lambda2 * telemetry.xr)
            - phi_prev;
    let rho_new = (rho_prev + constants.alpha * delta_phi)
        .clamp(constants.rho_min, constants.rho_max);

    let phi_mid = (1.0 - constants.gamma) * (phi_prev * rho_new) + constants.gamma * phi_prev;
    let phi_new = (phi_mid * (1.0 + telemetry.surprise * constants.surprise_boost))
        .clamp(0.0, constants.phi_max);

    if !phi_new.is_finite() || !rho_new.is_finite() {
        return Err(ComputationFault::new(format!(
            "non-finite result: phi_new={phi_new}, rho_new={rho_new}"
        )));
    }

    Ok((phi_new, rho_new))
}

pub struct ResonanceUpdater {
    store: Arc<EntityStore>,
    event_bus: Arc<dyn EventBus>,
    constants: ResonanceConstants,
}

impl ResonanceUpdater {
    pub fn new(
        store: Arc<EntityStore>,
        event_bus: Arc<dyn EventBus>,
        constants: ResonanceConstants,
    ) -> Self {
        Self {
            store,
            event_bus,
            constants,
        }
    }

    /// Apply a trustworthy telemetry summary to the entity, serialized on
    /// the per-id lock. A fault leaves the entity byte-identical.
    pub async fn apply(
        &self,
        entity_id: EntityId,
        telemetry: TelemetrySummary,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        // First contact seeds phi=0, rho=1 before the formula applies.
        let mut entity = self.store.lock_entry(entity_id, now).await;

        let (old_phi, old_rho) = (entity.phi, entity.rho);
        match apply_equation(old_phi, old_rho, &telemetry, &self.constants) {
            Ok((phi_new, rho_new)) => {
                entity.phi = phi_new;
                entity.rho = rho_new;
                entity.telemetry = telemetry.clone();
                // Timestamps are monotone even if the caller's clock is not.
                entity.phi_updated_at = entity.phi_updated_at.max(now);
                entity.rho_updated_at = entity.rho_updated_at.max(now);
                drop(entity);

                debug!(%entity_id, phi = phi_new, rho = rho_new, "Entity resonance updated");
                self.event_bus
                    .publish(ResonanceEvent::EntityScored {
                        entity_id,
                        old_phi,
                        new_phi: phi_new,
                        old_rho,
                        new_rho: rho_new,
                        sample_count: telemetry.sample_count,
                        timestamp: now,
                    })
                    .await?;

                Ok(UpdateOutcome::Applied {
                    phi: phi_new,
                    rho: rho_new,
                })
            }
            Err(fault) => {
                drop(entity);
                warn!(%entity_id, reason = %fault.reason, "Computation fault, retaining prior state");
                counter!("resonance_computation_faults_total").increment(1);

                self.event_bus
                    .publish(ResonanceEvent::ComputationFault {
                        entity_id,
                        reason: fault.reason.clone(),
                        timestamp: now,
                    })
                    .await?;

                Ok(UpdateOutcome::Faulted { fault })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::EntityReader;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn telemetry(sr: f64, cr: f64, xr: f64, surprise: f64) -> TelemetrySummary {
        TelemetrySummary {
            sr,
            cr,
            xr,
            surprise,
            sample_count: 12,
        }
    }

    struct MockEventBus {
        events: Arc<Mutex<Vec<ResonanceEvent>>>,
    }

    impl MockEventBus {
        fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn get_events(&self) -> Vec<ResonanceEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventBus for MockEventBus {
        async fn publish(&self, event: ResonanceEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_seed_reference_values() {
        // phi_prev=0.5, rho_prev=1.0, sr=1.0, cr=1.0, xr=0.0, surprise=0.2
        // => rho_new=1.08, phi_new≈0.5574
        let (phi, rho) = apply_equation(
            0.5,
            1.0,
            &telemetry(1.0, 1.0, 0.0, 0.2),
            &ResonanceConstants::default(),
        )
        .unwrap();

        assert!((rho - 1.08).abs() < 1e-9);
        assert!((phi - 0.5574).abs() < 1e-4);
    }

    #[test]
    fn test_results_stay_clamped() {
        let constants = ResonanceConstants::default();

        // Strongly positive telemetry from a high-phi entity
        let (phi, rho) = apply_equation(1.9, 1.9, &telemetry(1.0, 1.0, 0.0, 1.0), &constants).unwrap();
        assert!(phi <= constants.phi_max);
        assert!(rho <= constants.rho_max);

        // Strongly contradicted entity
        let (phi, rho) = apply_equation(1.9, 0.2, &telemetry(0.0, 0.0, 1.0, 0.2), &constants).unwrap();
        assert!(phi >= 0.0);
        assert!(rho >= constants.rho_min);
    }

    #[test]
    fn test_nan_input_is_a_typed_fault() {
        let fault = apply_equation(
            f64::NAN,
            1.0,
            &telemetry(1.0, 1.0, 0.0, 0.2),
            &ResonanceConstants::default(),
        )
        .unwrap_err();
        assert!(fault.reason.contains("non-finite input"));

        let fault = apply_equation(
            0.5,
            1.0,
            &telemetry(f64::INFINITY, 0.0, 0.0, 0.2),
            &ResonanceConstants::default(),
        )
        .unwrap_err();
        assert!(fault.reason.contains("non-finite input"));
    }

    #[tokio::test]
    async fn test_first_update_uses_seed_state() {
        let store = Arc::new(EntityStore::new());
        let bus = Arc::new(MockEventBus::new());
        let updater = ResonanceUpdater::new(store.clone(), bus.clone(), ResonanceConstants::default());

        let id = EntityId::new();
        let outcome = updater
            .apply(id, telemetry(1.0, 1.0, 0.0, 1.0), Utc::now())
            .await
            .unwrap();

        // phi_prev=0, rho_prev=1: delta=1.3, rho=1.13, phi_mid=0, phi=0
        match outcome {
            UpdateOutcome::Applied { phi, rho } => {
                assert!((rho - 1.13).abs() < 1e-9);
                assert_eq!(phi, 0.0);
            }
            other => panic!("Expected applied outcome, got {:?}", other),
        }

        let events = bus.get_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "entity_scored");
    }

    #[tokio::test]
    async fn test_fault_retains_prior_state() {
        let store = Arc::new(EntityStore::new());
        let bus = Arc::new(MockEventBus::new());
        let updater = ResonanceUpdater::new(store.clone(), bus.clone(), ResonanceConstants::default());

        let id = EntityId::new();
        updater
            .apply(id, telemetry(1.0, 1.0, 0.0, 1.0), Utc::now())
            .await
            .unwrap();
        let before = store.get(id).await.unwrap();

        let outcome = updater
            .apply(id, telemetry(f64::NAN, 0.0, 0.0, 0.2), Utc::now())
            .await
            .unwrap();
        match outcome {
            UpdateOutcome::Faulted { fault } => assert!(fault.reason.contains("non-finite")),
            other => panic!("Expected faulted outcome, got {:?}", other),
        }

        let after = store.get(id).await.unwrap();
        assert_eq!(after.phi, before.phi);
        assert_eq!(after.rho, before.rho);
        assert_eq!(after.phi_updated_at, before.phi_updated_at);

        let events = bus.get_events();
        assert_eq!(events.last().unwrap().event_type(), "computation_fault");
    }

    #[tokio::test]
    async fn test_causal_order_matters() {
        // The equation is non-commutative: (a then b) != (b then a).
        let constants = ResonanceConstants::default();
        let a = telemetry(1.0, 1.0, 0.0, 0.8);
        let b = telemetry(0.2, 0.1, 0.5, 0.2);

        let (phi_ab, rho_ab) = {
            let (phi, rho) = apply_equation(0.5, 1.0, &a, &constants).unwrap();
            apply_equation(phi, rho, &b, &constants).unwrap()
        };
        let (phi_ba, rho_ba) = {
            let (phi, rho) = apply_equation(0.5, 1.0, &b, &constants).unwrap();
            apply_equation(phi, rho, &a, &constants).unwrap()
        };

        assert!((phi_ab - phi_ba).abs() > 1e-12 || (rho_ab - rho_ba).abs() > 1e-12);
    }
}
