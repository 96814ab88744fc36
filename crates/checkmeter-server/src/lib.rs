//! Checkmeter Server
//!
//! HTTP front end for meter photo classification: upload validation, daily
//! quota, the vision pipeline and the decision policy, wired into an axum
//! router.

pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod routes;
pub mod security;
pub mod state;
pub mod telemetry;
pub mod upload;

pub use cli::Cli;
pub use config::{HttpConfig, ServerConfig, UploadConfig};
pub use error::AppError;
pub use pipeline::{AnalysisOutcome, ClassificationPipeline};
pub use routes::create_router;
pub use state::{build_backend, spawn_usage_pruner, AppState};
