//! # beacon-core
//!
//! Foundation types and utilities shared by every Beacon crate.
//!
//! - **IDs**: [`ids::Snowflake`] entity identifiers and [`ids::CompoundKey`]
//!   for per-guild-per-user cache entries
//! - **Backoff**: [`retry::BackoffConfig`] and exponential delay calculation
//!   used by the gateway reconnect supervisor
//! - **JSON**: [`json::deep_merge`] for layered settings, [`json::merge_patch`] for partial updates
//! - **Logging**: [`logging::init_subscriber`] and the in-memory
//!   [`logging::capture_logs`] helper for tests
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other beacon crates.

#![deny(unsafe_code)]

pub mod ids;
pub mod json;
pub mod logging;
pub mod retry;
