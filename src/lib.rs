pub mod audit;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod service;

pub use audit::{AuditSink, CallerContext};
pub use config::{EngineConfig, ProviderSettings, RetrievalStrategyKind};
pub use models::{DiagnosticResult, PatientCase};
pub use pipeline::diagnosis::DiagnosticOrchestrator;
pub use pipeline::DiagnosticError;
pub use service::DiagnosticService;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` or the default filter.
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
    installed
}
