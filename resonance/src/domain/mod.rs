// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod candidate;
pub mod entity;
pub mod events;
pub mod field;
pub mod telemetry;

pub use candidate::*;
pub use entity::*;
pub use events::*;
pub use field::*;
pub use telemetry::*;
