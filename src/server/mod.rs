//! Axum-based HTTP surface for adforge.
//!
//! Exposes ad generation, voice synthesis, campaign usage and cache statistics
//! as a small JSON API, plus `/health` and a Prometheus `/metrics` endpoint.
//!
//! # Components
//!
//! - `handlers`: Implementation of individual endpoints.
//! - `middleware`: Request ID tracking layers.
//! - `routes`: The router that ties state, handlers and layers together.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod routes;

pub use routes::{create_router, AppState};
