//! Verification-step relay server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket sessions) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;
