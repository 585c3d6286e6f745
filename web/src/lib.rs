//! Shared HTTP plumbing for Tixie services.
//!
//! Every axum binary in the workspace uses the same error response shape,
//! the same health endpoints and the same graceful-shutdown signal handling;
//! this crate is where those live.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod health;
pub mod shutdown;

pub use error::AppError;
