pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{OpenRouterAdapter, RemoveBgAdapter};
pub use app::{router, AppState};
pub use config::{ProviderKind, ServiceConfig};
pub use crate::core::{
    interpreter::ResponseInterpreter, normalizer::normalize, orchestrator::Orchestrator,
};
pub use utils::error::{CutoutError, Result, TransportError, TransportErrorKind};
