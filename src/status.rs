//! Environment report for GPU inference readiness.
//!
//! Lists the execution providers the loaded ONNX Runtime supports, checks
//! the configured model file and locates CUDA runtime libraries. The library
//! directories are only reported; nothing here touches `PATH` or any other
//! process-wide state.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::backend::{available_backends, runtime_library_path, ProviderStatus};

/// Facts about the model file on disk.
#[derive(Debug, Clone)]
pub struct ModelStatus {
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
    pub sha256: Option<String>,
}

impl ModelStatus {
    pub fn inspect(path: &Path) -> Self {
        let size_bytes = std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len());
        let sha256 = size_bytes.and_then(|_| file_sha256(path).ok());

        Self {
            path: path.to_path_buf(),
            size_bytes,
            sha256,
        }
    }

    pub fn exists(&self) -> bool {
        self.size_bytes.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub version: &'static str,
    /// ONNX Runtime library the providers were queried from.
    pub runtime_library: PathBuf,
    pub providers: Vec<ProviderStatus>,
    pub model: ModelStatus,
    pub cuda_library_dirs: Vec<PathBuf>,
}

impl StatusReport {
    /// Gather the full report. `python_env` is an optional virtual
    /// environment root that may carry pip-installed NVIDIA wheels.
    pub fn collect(
        model_path: &Path,
        python_env: Option<&Path>,
        runtime_library: Option<&Path>,
    ) -> Self {
        let mut cuda_library_dirs = Vec::new();

        if let Some(root) = python_env {
            cuda_library_dirs.extend(nvidia_wheel_dirs(root));
        }

        if let Ok(cuda_path) = std::env::var("CUDA_PATH") {
            let bin = PathBuf::from(cuda_path).join("bin");
            if bin.is_dir() {
                cuda_library_dirs.push(bin);
            }
        }

        Self {
            version: env!("CARGO_PKG_VERSION"),
            runtime_library: runtime_library_path(runtime_library),
            providers: available_backends(runtime_library),
            model: ModelStatus::inspect(model_path),
            cuda_library_dirs,
        }
    }

    pub fn gpu_ready(&self) -> bool {
        self.model.exists() && self.provider_available("CUDAExecutionProvider")
    }

    pub fn cpu_ready(&self) -> bool {
        self.model.exists() && self.provider_available("CPUExecutionProvider")
    }

    fn provider_available(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name && p.available)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LVFace status (lvface {})", self.version)?;
        writeln!(f, "{}", "=".repeat(50))?;

        writeln!(f, "\nONNX Runtime: {}", self.runtime_library.display())?;
        writeln!(f, "\nExecution providers:")?;
        for provider in &self.providers {
            let mark = if provider.available { "✅" } else { "❌" };
            write!(f, "  {} {}", mark, provider.name)?;
            if let Some(detail) = &provider.detail {
                write!(f, " ({})", detail)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\nModel:")?;
        writeln!(f, "  Path: {}", self.model.path.display())?;
        match self.model.size_bytes {
            Some(size) => {
                writeln!(f, "  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0))?;
                if let Some(hash) = &self.model.sha256 {
                    writeln!(f, "  SHA-256: {}", hash)?;
                }
            }
            None => writeln!(f, "  ❌ Not found")?,
        }

        writeln!(f, "\nCUDA library directories:")?;
        if self.cuda_library_dirs.is_empty() {
            writeln!(f, "  (none found)")?;
        }
        for dir in &self.cuda_library_dirs {
            writeln!(f, "  {}", dir.display())?;
        }

        let verdict = if self.gpu_ready() {
            "🚀 Ready for GPU inference"
        } else if self.cpu_ready() {
            "🔄 Ready for CPU inference (GPU unavailable)"
        } else if !self.model.exists() {
            "❌ Model missing"
        } else {
            "❌ ONNX Runtime unavailable"
        };
        writeln!(f, "\n{}", verdict)
    }
}

/// Find `nvidia/<package>/{bin,lib}` directories inside a Python environment.
///
/// Covers the Windows layout (`Lib/site-packages`) and the POSIX one
/// (`lib/pythonX.Y/site-packages`).
pub fn nvidia_wheel_dirs(env_root: &Path) -> Vec<PathBuf> {
    let mut site_packages = vec![env_root.join("Lib").join("site-packages")];

    if let Ok(entries) = std::fs::read_dir(env_root.join("lib")) {
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.file_name().to_string_lossy().starts_with("python") {
                site_packages.push(entry.path().join("site-packages"));
            }
        }
    }

    let mut dirs = Vec::new();
    for site in site_packages {
        let nvidia = site.join("nvidia");
        if !nvidia.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&nvidia)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() && (name == "bin" || name == "lib") {
                dirs.push(entry.path().to_path_buf());
            }
        }
    }

    dirs.sort();
    dirs
}

fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
