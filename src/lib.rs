//! Face embedding extraction and comparison with LVFace ONNX models.
//!
//! The core is [`FaceEmbedder`]: it decodes an image and resizes it to
//! 112x112. It then normalizes it to [-1, 1], runs one ONNX Runtime forward
//! pass and returns the [`Embedding`]. Two embeddings are compared with
//! [`cosine_similarity`].

pub mod backend;
pub mod batch;
pub mod benchmark;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetch;
pub mod image_input;
pub mod logging;
pub mod preprocess;
pub mod similarity;
pub mod status;

pub use backend::{Backend, BackendOptions, InferenceBackend, OrtBackend};
pub use config::Config;
pub use embedding::Embedding;
pub use error::{Error, Result};
pub use extractor::FaceEmbedder;
pub use image_input::ChannelOrder;
pub use similarity::{cosine_similarity, MatchThresholds, Verdict};
