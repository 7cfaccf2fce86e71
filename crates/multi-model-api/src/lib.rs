pub mod api;
pub mod config;
pub mod metrics;
pub mod model_runtime;
pub mod server;
pub mod shared_state;
pub mod telemetry;

// Public API exports
pub use config::{Config, ConfigOverrides};
pub use model_runtime::{LoadStrategy, ModelKind, ModelRegistry};
pub use server::{build_router, run_server};
pub use shared_state::AppState;
