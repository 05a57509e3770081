//! HTTP server for the depot upload service.
//!
//! Wires the session registry, chunk store and assembler behind the four
//! wire operations (init, status, chunk, complete) plus health and metrics.

pub mod assemble;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod metrics;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod sweep;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
