// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the resonance bounded context

pub mod entity_store;
pub mod event_bus;
pub mod queue_publisher;
pub mod repository;
pub mod sample_store;

pub use entity_store::{EntityGuard, EntityStore};
pub use event_bus::{BroadcastEventBus, EventBusError, EventReceiver};
pub use queue_publisher::{BuiltQueue, QueuePublisher};
pub use repository::{EntityReader, SampleSource};
pub use sample_store::SampleStore;
