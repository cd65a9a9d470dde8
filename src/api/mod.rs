//! HTTP API over the custody service.
//!
//! Routes live under `/api/`, live events under `/ws/events`. Handlers are
//! thin: they parse the request, hand the work to `CustodyState` on the
//! blocking pool and map `CustodyError` to a status code.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer};
pub use types::ApiContext;
