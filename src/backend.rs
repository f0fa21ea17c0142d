//! Execution backend selection and ONNX Runtime sessions.
//!
//! Requested providers are registered so that failing to initialize one is a
//! hard error. A session built for CUDA either runs on CUDA or is not built
//! at all; falling back to CPU is the caller's decision.
//!
//! The ONNX Runtime shared library is loaded on first use through
//! [`load_runtime`]. A missing or incompatible library is reported as an
//! error rather than aborting the process.

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::embedding::Embedding;
use crate::error::{Error, Result};
use crate::preprocess::{FaceTensor, CHANNELS, INPUT_SIZE};

/// Hardware path used to run the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cuda { device_id: i32 },
    Cpu,
}

impl Backend {
    fn dispatch(&self) -> ExecutionProviderDispatch {
        match self {
            Backend::Cuda { device_id } => CUDAExecutionProvider::default()
                .with_device_id(*device_id)
                .build()
                .error_on_failure(),
            Backend::Cpu => CPUExecutionProvider::default().build().error_on_failure(),
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Backend::Cuda { .. })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cuda { device_id } => write!(f, "CUDA:{}", device_id),
            Backend::Cpu => f.write_str("CPU"),
        }
    }
}

/// Everything needed to build a session, passed explicitly rather than read
/// from the process environment.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOptions {
    /// Providers in priority order.
    pub backends: Vec<Backend>,
    pub intra_threads: usize,
    pub optimization_level: u8,
    /// ONNX Runtime shared library to load. `None` uses `ORT_DYLIB_PATH`,
    /// then the platform's default library name.
    pub runtime_library: Option<PathBuf>,
}

impl BackendOptions {
    pub fn gpu(device_id: i32) -> Self {
        Self {
            backends: vec![Backend::Cuda { device_id }],
            ..Self::cpu()
        }
    }

    pub fn cpu() -> Self {
        Self {
            backends: vec![Backend::Cpu],
            intra_threads: 4,
            optimization_level: 3,
            runtime_library: None,
        }
    }

    /// Options for the boolean GPU preference used by the simple constructor.
    pub fn for_preference(use_gpu: bool) -> Self {
        if use_gpu {
            Self::gpu(0)
        } else {
            Self::cpu()
        }
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }

    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level.min(3);
        self
    }

    pub fn with_runtime_library(mut self, path: Option<PathBuf>) -> Self {
        self.runtime_library = path;
        self
    }

    pub fn wants_gpu(&self) -> bool {
        self.backends.iter().any(Backend::is_gpu)
    }

    /// Short label for reports ("GPU" or "CPU").
    pub fn device_label(&self) -> &'static str {
        if self.wants_gpu() {
            "GPU"
        } else {
            "CPU"
        }
    }

    fn graph_optimization(&self) -> GraphOptimizationLevel {
        match self.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }
}

/// Anything that can turn a preprocessed face tensor into an embedding.
pub trait InferenceBackend {
    fn run(&mut self, input: FaceTensor) -> Result<Embedding>;

    /// Human-readable description of where inference runs.
    fn describe(&self) -> String;
}

/// ONNX Runtime session bound to the model's first input and first output.
pub struct OrtBackend {
    session: Session,
    options: BackendOptions,
}

impl OrtBackend {
    /// Load the model and create a session on the requested backends.
    pub fn load(model_path: &Path, options: &BackendOptions) -> Result<Self> {
        let model_error = |reason: String| Error::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        };

        if !model_path.is_file() {
            return Err(model_error("model file not found".to_string()));
        }
        if options.backends.is_empty() {
            return Err(model_error("no execution backend requested".to_string()));
        }

        load_runtime(options.runtime_library.as_deref()).map_err(|e| model_error(e.to_string()))?;

        let session =
            build_session(model_path, options).map_err(|e| model_error(e.to_string()))?;

        if session.inputs().is_empty() || session.outputs().is_empty() {
            return Err(model_error(
                "model must declare at least one input and one output".to_string(),
            ));
        }

        tracing::info!(
            model = ?model_path,
            backends = ?options.backends,
            input = %session.inputs()[0].name(),
            output = %session.outputs()[0].name(),
            "Inference session created"
        );

        Ok(Self {
            session,
            options: options.clone(),
        })
    }
}

fn build_session(
    model_path: &Path,
    options: &BackendOptions,
) -> std::result::Result<Session, Box<dyn std::error::Error + Send + Sync>> {
    let providers: Vec<ExecutionProviderDispatch> =
        options.backends.iter().map(Backend::dispatch).collect();

    let session = Session::builder()?
        .with_optimization_level(options.graph_optimization())?
        .with_intra_threads(options.intra_threads)?
        .with_execution_providers(providers)?
        .commit_from_file(model_path)?;

    Ok(session)
}

impl InferenceBackend for OrtBackend {
    fn run(&mut self, input: FaceTensor) -> Result<Embedding> {
        let size = INPUT_SIZE as usize;
        let data: Vec<f32> = input.iter().copied().collect();

        let input_tensor =
            Tensor::from_array(([1usize, CHANNELS, size, size], data.into_boxed_slice()))?;

        // Bound by position: the model's names are not part of the contract
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let embedding_output = outputs
            .iter()
            .next()
            .ok_or_else(|| Error::Inference(ort::Error::new("model produced no outputs")))?;

        let (shape, embedding_data) = embedding_output.1.try_extract_tensor::<f32>()?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        Ok(Embedding::new(shape, embedding_data.to_vec()))
    }

    fn describe(&self) -> String {
        let backends: Vec<String> = self.options.backends.iter().map(|b| b.to_string()).collect();
        format!("ONNX Runtime [{}]", backends.join(", "))
    }
}

/// Provider availability as reported by the loaded ONNX Runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: &'static str,
    pub available: bool,
    pub detail: Option<String>,
}

#[cfg(target_os = "windows")]
const RUNTIME_LIBRARY_NAME: &str = "onnxruntime.dll";
#[cfg(any(target_os = "macos", target_os = "ios"))]
const RUNTIME_LIBRARY_NAME: &str = "libonnxruntime.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "ios")))]
const RUNTIME_LIBRARY_NAME: &str = "libonnxruntime.so";

/// The shared library that [`load_runtime`] opens for `explicit`.
pub fn runtime_library_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os("ORT_DYLIB_PATH") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(RUNTIME_LIBRARY_NAME),
    }
}

/// Load the ONNX Runtime shared library if no library is loaded yet.
///
/// Must run before any other `ort` call: those load the library on their own
/// and abort the process when it is missing. Once a library is loaded it
/// stays loaded, and later calls succeed whatever path they name.
pub fn load_runtime(explicit: Option<&Path>) -> ort::Result<()> {
    let path = runtime_library_path(explicit);
    let committed = ort::init_from(&path)?.commit();
    if committed {
        tracing::debug!(library = ?path, "ONNX Runtime environment configured");
    }
    Ok(())
}

/// Query which execution providers the runtime was built with.
///
/// When the runtime library itself cannot be loaded every provider is
/// reported unavailable, with the load error as detail.
pub fn available_backends(runtime_library: Option<&Path>) -> Vec<ProviderStatus> {
    if let Err(e) = load_runtime(runtime_library) {
        let detail = e.to_string();
        return ["CPUExecutionProvider", "CUDAExecutionProvider"]
            .into_iter()
            .map(|name| ProviderStatus {
                name,
                available: false,
                detail: Some(detail.clone()),
            })
            .collect();
    }

    vec![
        provider_status("CPUExecutionProvider", CPUExecutionProvider::default().is_available()),
        provider_status("CUDAExecutionProvider", CUDAExecutionProvider::default().is_available()),
    ]
}

fn provider_status(name: &'static str, result: ort::Result<bool>) -> ProviderStatus {
    match result {
        Ok(available) => ProviderStatus {
            name,
            available,
            detail: None,
        },
        Err(e) => ProviderStatus {
            name,
            available: false,
            detail: Some(e.to_string()),
        },
    }
}
