//! Telerig firmware library.
//!
//! Shared by both firmware images (`camera-node`, `sensor-node`) and the
//! host test suites.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod ticker;

pub mod adapters;
pub mod drivers;
