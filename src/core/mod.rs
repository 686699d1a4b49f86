//! Core building blocks of the inference runtime.
//!
//! - Error handling shared by every pipeline stage
//! - Model configuration loaded from YAML
//! - The execution context wrapping backend and provider selection

pub mod config;
pub mod context;
pub mod errors;

pub use config::{DetectorModelInfo, ModelConfig, OcrModelInfo};
pub use context::{
    ExecutionContext, ExecutionProvider, Framework, is_supported, supported_providers,
};
pub use errors::{VisionError, VisionResult};

/// Initializes the tracing subscriber for logging.
///
/// Sets up the environment-filtered formatting layer. Typically called once
/// at the start of the hosting process.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
