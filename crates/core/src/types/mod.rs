//! Core types for the market router.
//!
//! This module provides type-safe wrappers for the concepts shared by the
//! gateway, the CLI, and clients of the routing and documentation APIs.

pub mod docs;
pub mod format;
pub mod id;
pub mod routing;
pub mod tier;

pub use docs::DocAnswer;
pub use format::{OutputFormat, UnknownFormat};
pub use id::{OperationId, OperationIdError};
pub use routing::RoutingResult;
pub use tier::{Tier, UnknownTier};
