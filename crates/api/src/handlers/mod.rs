//! Request handlers.
//!
//! Handlers validate at the boundary, delegate to the shared
//! [`EventRelay`](verifyflow_events::EventRelay) and map errors via
//! [`AppError`](crate::error::AppError).

pub mod webhook;
