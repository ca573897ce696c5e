//! # Axum Helpers
//!
//! Shared HTTP plumbing for the control-plane services.
//!
//! - **[`errors`]**: [`AppError`], stable [`ErrorCode`]s, field validators
//!   and [`MutationResponse`]
//! - **[`extractors`]**: [`IdPath`] and [`JsonBody`] with structured rejections
//! - **[`http`]**: CORS and security headers
//! - **[`server`]**: router assembly with OpenAPI docs, health, readiness,
//!   graceful shutdown

pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use errors::{AppError, ErrorCode, ErrorResponse, FieldValidator, MutationResponse};
pub use extractors::{IdPath, JsonBody};
pub use http::{create_cors_layer, security_headers};
pub use server::{
    HealthCheckFuture, HealthResponse, create_router, health_router, run_health_checks, serve,
    shutdown_signal,
};
