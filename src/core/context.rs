//! Execution context: backend framework and execution-provider selection.
//!
//! One [`ExecutionContext`] is created per process and shared by every loaded
//! model. It validates the requested framework/provider combination against a
//! static capability table before any backend call, then builds sessions from
//! serialized graph bytes with the device and threading options the serving
//! runtime relies on (thread spinning disabled for determinism).

use crate::core::errors::{VisionError, VisionResult};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::str::FromStr;

/// Inference framework backing a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    /// ONNX Runtime.
    OnnxRuntime,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framework::OnnxRuntime => write!(f, "onnxruntime"),
        }
    }
}

impl FromStr for Framework {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "onnxruntime" | "ort" => Ok(Framework::OnnxRuntime),
            other => Err(VisionError::parameter(format!(
                "unknown framework: {other}"
            ))),
        }
    }
}

/// Execution provider the backend dispatches work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    /// CPU provider, always available.
    Cpu,
    /// NVIDIA CUDA provider.
    Cuda,
    /// DirectML provider.
    DirectMl,
    /// TensorRT provider.
    TensorRt,
}

impl ExecutionProvider {
    /// Whether the provider was compiled into this build.
    ///
    /// Optional providers sit behind crate features; this surfaces the build
    /// configuration as a queryable capability instead of a bare `#[cfg]`.
    pub fn is_available(&self) -> bool {
        match self {
            ExecutionProvider::Cpu => true,
            ExecutionProvider::Cuda => cfg!(feature = "cuda"),
            ExecutionProvider::DirectMl => cfg!(feature = "directml"),
            ExecutionProvider::TensorRt => cfg!(feature = "tensorrt"),
        }
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionProvider::Cpu => write!(f, "cpu"),
            ExecutionProvider::Cuda => write!(f, "cuda"),
            ExecutionProvider::DirectMl => write!(f, "directml"),
            ExecutionProvider::TensorRt => write!(f, "tensorrt"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" => Ok(ExecutionProvider::Cuda),
            "directml" | "dml" => Ok(ExecutionProvider::DirectMl),
            "tensorrt" | "trt" => Ok(ExecutionProvider::TensorRt),
            other => Err(VisionError::parameter(format!(
                "unknown execution provider: {other}"
            ))),
        }
    }
}

/// Providers each framework can drive.
pub fn supported_providers(framework: Framework) -> &'static [ExecutionProvider] {
    match framework {
        Framework::OnnxRuntime => &[
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda,
            ExecutionProvider::DirectMl,
            ExecutionProvider::TensorRt,
        ],
    }
}

/// Whether a framework/provider combination is valid.
pub fn is_supported(framework: Framework, provider: ExecutionProvider) -> bool {
    supported_providers(framework).contains(&provider)
}

/// Shared backend environment and provider selection.
///
/// Read-only after construction; session creation may run concurrently from
/// multiple loader threads during cache warm-up.
#[derive(Debug)]
pub struct ExecutionContext {
    framework: Framework,
    provider: ExecutionProvider,
    device_id: i32,
    intra_threads: Option<usize>,
}

impl ExecutionContext {
    /// Creates a context for the given framework, provider and device index.
    ///
    /// Fails fast with a parameter error when the combination is not in the
    /// capability table. A provider that is valid but compiled out is only
    /// rejected at session build time, as a runtime error.
    pub fn new(
        framework: Framework,
        provider: ExecutionProvider,
        device_id: i32,
    ) -> VisionResult<Self> {
        if !is_supported(framework, provider) {
            return Err(VisionError::parameter(format!(
                "unsupported framework({framework}) or ep({provider})"
            )));
        }
        Ok(Self {
            framework,
            provider,
            device_id,
            intra_threads: None,
        })
    }

    /// Sets the number of intra-op threads each session runs with.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// The framework this context drives.
    pub fn framework(&self) -> Framework {
        self.framework
    }

    /// The selected execution provider.
    pub fn execution_provider(&self) -> ExecutionProvider {
        self.provider
    }

    /// The selected device index.
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Builds a session from serialized graph bytes.
    ///
    /// Backend rejections (bad graph bytes, provider unavailable in this
    /// build) surface as runtime errors with the engine message preserved.
    pub fn create_session(&self, bytes: &[u8]) -> VisionResult<Session> {
        let mut builder = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_config_entry("session.intra_op.allow_spinning", "0")?;
        if let Some(threads) = self.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let builder = self.apply_provider(builder)?;
        builder
            .commit_from_memory(bytes)
            .map_err(|e| VisionError::runtime(format!("unable to create session: {e}")))
    }

    fn apply_provider(&self, builder: SessionBuilder) -> VisionResult<SessionBuilder> {
        match self.provider {
            ExecutionProvider::Cpu => Ok(builder),
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                let provider = ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(self.device_id)
                    .build();
                Ok(builder.with_execution_providers([provider])?)
            }
            #[cfg(feature = "directml")]
            ExecutionProvider::DirectMl => {
                let provider = ort::execution_providers::DirectMLExecutionProvider::default()
                    .with_device_id(self.device_id)
                    .build();
                Ok(builder.with_execution_providers([provider])?)
            }
            #[cfg(feature = "tensorrt")]
            ExecutionProvider::TensorRt => {
                let provider = ort::execution_providers::TensorRTExecutionProvider::default()
                    .with_device_id(self.device_id)
                    .build();
                Ok(builder.with_execution_providers([provider])?)
            }
            #[allow(unreachable_patterns)]
            compiled_out => {
                let _ = builder;
                Err(VisionError::runtime(format!(
                    "{compiled_out} execution provider is not compiled into this build"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_lists_all_ort_providers() {
        let providers = supported_providers(Framework::OnnxRuntime);
        assert!(providers.contains(&ExecutionProvider::Cpu));
        assert!(providers.contains(&ExecutionProvider::Cuda));
        assert!(providers.contains(&ExecutionProvider::DirectMl));
        assert!(providers.contains(&ExecutionProvider::TensorRt));
    }

    #[test]
    fn cpu_is_always_available() {
        assert!(ExecutionProvider::Cpu.is_available());
    }

    #[test]
    fn context_accepts_supported_combination() {
        let ctx = ExecutionContext::new(Framework::OnnxRuntime, ExecutionProvider::Cpu, 0).unwrap();
        assert_eq!(ctx.framework(), Framework::OnnxRuntime);
        assert_eq!(ctx.execution_provider(), ExecutionProvider::Cpu);
        assert_eq!(ctx.device_id(), 0);
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!(
            "dml".parse::<ExecutionProvider>().unwrap(),
            ExecutionProvider::DirectMl
        );
        assert_eq!(
            "CUDA".parse::<ExecutionProvider>().unwrap(),
            ExecutionProvider::Cuda
        );
        assert!("npu".parse::<ExecutionProvider>().is_err());
        assert_eq!(
            "ort".parse::<Framework>().unwrap(),
            Framework::OnnxRuntime
        );
    }
}
