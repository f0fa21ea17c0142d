use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::BackendOptions;
use crate::error::{Error, Result};
use crate::preprocess::ResizeFilter;
use crate::similarity::MatchThresholds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub preprocess: PreprocessConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Try the CUDA provider before falling back to CPU.
    #[serde(default = "default_prefer_gpu")]
    pub prefer_gpu: bool,

    #[serde(default)]
    pub device_id: i32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// ONNX Runtime graph optimization level (0-3).
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u8,

    /// ONNX Runtime shared library (defaults to `ORT_DYLIB_PATH`, then the
    /// platform library name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_library: Option<PathBuf>,
}

fn default_prefer_gpu() -> bool {
    true
}

fn default_intra_threads() -> usize {
    4
}

fn default_optimization_level() -> u8 {
    3
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            prefer_gpu: default_prefer_gpu(),
            device_id: 0,
            intra_threads: default_intra_threads(),
            optimization_level: default_optimization_level(),
            runtime_library: None,
        }
    }
}

impl BackendConfig {
    /// Backend options for the preferred device (GPU when `prefer_gpu` is set).
    pub fn preferred(&self) -> BackendOptions {
        if self.prefer_gpu {
            self.gpu()
        } else {
            self.cpu()
        }
    }

    pub fn gpu(&self) -> BackendOptions {
        BackendOptions::gpu(self.device_id)
            .with_intra_threads(self.intra_threads)
            .with_optimization_level(self.optimization_level)
            .with_runtime_library(self.runtime_library.clone())
    }

    pub fn cpu(&self) -> BackendOptions {
        BackendOptions::cpu()
            .with_intra_threads(self.intra_threads)
            .with_optimization_level(self.optimization_level)
            .with_runtime_library(self.runtime_library.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub filter: ResizeFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Scores above this are reported as the same person.
    #[serde(default = "default_same_person")]
    pub same_person: f32,

    /// Scores above this (and not above `same_person`) are a possible match.
    #[serde(default = "default_possibly_same")]
    pub possibly_same: f32,
}

fn default_same_person() -> f32 {
    0.7
}

fn default_possibly_same() -> f32 {
    0.5
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            same_person: default_same_person(),
            possibly_same: default_possibly_same(),
        }
    }
}

impl MatchingConfig {
    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            same_person: self.same_person,
            possibly_same: self.possibly_same,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "bmp".to_string(),
        "webp".to_string(),
        "tif".to_string(),
        "tiff".to_string(),
    ]
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

fn default_model_path() -> PathBuf {
    Config::data_dir()
        .join("models")
        .join("LVFace-B_Glint360K.onnx")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            backend: BackendConfig::default(),
            network: NetworkConfig::default(),
            preprocess: PreprocessConfig::default(),
            matching: MatchingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Load from `LVFACE_CONFIG` or the default location, writing a default
    /// config file if none exists yet.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("LVFACE_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lvface")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lvface")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.backend.prefer_gpu);
        assert_eq!(config.network.timeout_secs, 10);
        assert_eq!(config.matching.same_person, 0.7);
        assert_eq!(config.matching.possibly_same, 0.5);
        assert_eq!(config.preprocess.filter, ResizeFilter::Triangle);
        assert!(config.batch.image_extensions.contains(&"jpg".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "model_path = \"/models/lvface.onnx\"\n\n[backend]\nprefer_gpu = false\n\n[preprocess]\nfilter = \"lanczos3\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/lvface.onnx"));
        assert!(!config.backend.prefer_gpu);
        assert_eq!(config.backend.intra_threads, 4);
        assert_eq!(config.preprocess.filter, ResizeFilter::Lanczos3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.network.timeout_secs = 3;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.network.timeout_secs, 3);
        assert_eq!(loaded.model_path, config.model_path);
    }

    #[test]
    fn test_invalid_file_reports_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend]\nprefer_gpu = \"sometimes\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_preferred_backend_follows_prefer_gpu() {
        let mut backend = BackendConfig::default();
        assert!(backend.preferred().wants_gpu());

        backend.prefer_gpu = false;
        assert!(!backend.preferred().wants_gpu());
    }

    #[test]
    fn test_runtime_library_reaches_backend_options() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nruntime_library = \"/opt/onnxruntime/lib/libonnxruntime.so\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        let expected = Some(PathBuf::from("/opt/onnxruntime/lib/libonnxruntime.so"));
        assert_eq!(config.backend.gpu().runtime_library, expected);
        assert_eq!(config.backend.cpu().runtime_library, expected);
        assert_eq!(BackendConfig::default().preferred().runtime_library, None);
    }
}
