//! Market Router Core - Shared types library.
//!
//! This crate provides common types used across all market router components:
//! - `gateway` - The routing service (HTTP + library)
//! - `cli` - Command-line tools for migrations, index builds and one-shot routing
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows API clients to depend on it
//! for the response envelope alone.
//!
//! # Modules
//!
//! - [`types`] - Operation ids, subscription tiers, output formats, and the
//!   routing and documentation envelopes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
