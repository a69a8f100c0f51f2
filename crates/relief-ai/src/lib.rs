//! Humanitarian relief pipeline: hazard escalation, resource depletion forecasting,
//! profile-to-service matching, and feedback routing.

pub mod config;
pub mod context;
pub mod error;
pub mod geo;
pub mod telemetry;
pub mod workflows;

pub use context::PipelineContext;
pub use error::AppError;
