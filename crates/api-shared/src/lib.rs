//! # API Shared
//!
//! Shared definitions for the cardio HTTP surfaces.
//!
//! Contains:
//! - JSON request/response bodies with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the CLI's JSON output.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
