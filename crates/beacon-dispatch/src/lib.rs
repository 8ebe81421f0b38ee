//! # beacon-dispatch
//!
//! Turns raw Dispatch frames into typed domain events and keeps the entity
//! caches consistent with them.
//!
//! - [`wire::DispatchEvent`]: closed union of known wire payloads plus an
//!   `Unknown` catch-all
//! - [`models`]: domain entities built from payload fields
//! - [`cache`]: keyed [`cache::CacheStore`] collaborators and the in-memory
//!   default
//! - [`Normalizer`]: cache mutation followed by emission on the [`EventBus`]
//! - [`names::normalize_event_name`]: `GUILD_MEMBER_ADD` → `guildMemberAdd`
//!
//! ## Crate Position
//!
//! Depends on beacon-core. Fed by beacon-gateway, one frame at a time, in
//! socket order.

#![deny(unsafe_code)]

pub mod bus;
pub mod cache;
pub mod events;
pub mod models;
pub mod names;
pub mod normalizer;
pub mod wire;

pub use bus::EventBus;
pub use cache::{CacheStore, Cached, Caches, MemoryCache};
pub use events::{ClientEvent, NormalizedEvent, Removed, Update};
pub use names::normalize_event_name;
pub use normalizer::Normalizer;
pub use wire::DispatchEvent;
