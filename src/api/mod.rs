//! HTTP surface for polling clients: job control, gateway status, audit
//! tail, and learning validation. Auth is handled upstream.

pub mod envelope;
pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::api_routes;
