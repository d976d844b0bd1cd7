//! archihub HTTP control plane
//!
//! A local JSON API over an in-memory ArchiMate model: declarative BOM
//! application with an async operation queue, consistent read snapshots,
//! and diagram layout/export.

pub mod config;
pub mod envelope;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::build_router;
pub use state::AppState;
