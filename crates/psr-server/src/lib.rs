//! HTTP front end for the PSR analysis pipeline: upload management,
//! analysis, previews and exports.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

/// Version tag carried in every v1 response envelope.
pub const API_VERSION: &str = "v1";
