//! Face embedding extraction.

use image::DynamicImage;
use std::path::Path;
use std::time::Duration;

use crate::backend::{BackendOptions, InferenceBackend, OrtBackend};
use crate::embedding::Embedding;
use crate::error::{Error, Result};
use crate::fetch::{self, DEFAULT_TIMEOUT};
use crate::image_input::{self, ChannelOrder};
use crate::preprocess::{self, FaceTensor, ResizeFilter};

/// Extracts LVFace embeddings from images.
///
/// Every call runs the full decode, preprocess and inference path; nothing
/// is cached. The inference backend is fixed for the lifetime of the
/// instance.
pub struct FaceEmbedder<B = OrtBackend> {
    backend: B,
    filter: ResizeFilter,
    timeout: Duration,
    dimension: Option<usize>,
}

impl FaceEmbedder<OrtBackend> {
    /// Load an ONNX model, on CUDA when `use_gpu` is set, otherwise on CPU.
    pub fn new(model_path: &Path, use_gpu: bool) -> Result<Self> {
        Self::with_options(model_path, &BackendOptions::for_preference(use_gpu))
    }

    /// Load an ONNX model with explicit backend options.
    ///
    /// Fails with [`Error::ModelLoad`] if none of the requested backends can
    /// be initialized; there is no automatic fallback.
    pub fn with_options(model_path: &Path, options: &BackendOptions) -> Result<Self> {
        let backend = OrtBackend::load(model_path, options)?;
        Ok(Self::from_backend(backend))
    }
}

impl<B: InferenceBackend> FaceEmbedder<B> {
    pub fn from_backend(backend: B) -> Self {
        Self {
            backend,
            filter: ResizeFilter::default(),
            timeout: DEFAULT_TIMEOUT,
            dimension: None,
        }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Embedding length of this model, known after the first inference.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Convert an image into the model input tensor.
    pub fn preprocess(&self, img: &DynamicImage) -> FaceTensor {
        preprocess::preprocess(img, self.filter)
    }

    /// Embed a local image file.
    pub fn embed_file(&mut self, path: &Path) -> Result<Embedding> {
        let img = image_input::load_image(path)?;
        tracing::debug!(path = ?path, "Embedding image file");
        self.embed_image(&img)
    }

    /// Embed an image downloaded from `url`.
    pub fn embed_url(&mut self, url: &str) -> Result<Embedding> {
        let bytes = fetch::fetch_bytes(url, self.timeout)?;
        let img = image_input::decode_image(&bytes, url)?;
        self.embed_image(&img)
    }

    /// Embed an encoded image held in memory.
    pub fn embed_bytes(&mut self, bytes: &[u8]) -> Result<Embedding> {
        let img = image_input::decode_image(bytes, "memory")?;
        self.embed_image(&img)
    }

    /// Embed a raw 8-bit, 3-channel pixel buffer.
    pub fn embed_frame(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        order: ChannelOrder,
    ) -> Result<Embedding> {
        let img = image_input::image_from_frame(data, width, height, order)?;
        self.embed_image(&img)
    }

    /// Embed an already decoded image.
    pub fn embed_image(&mut self, img: &DynamicImage) -> Result<Embedding> {
        let tensor = self.preprocess(img);
        let embedding = self.backend.run(tensor)?;

        match self.dimension {
            Some(dim) if dim != embedding.len() => {
                return Err(Error::DimensionMismatch {
                    left: dim,
                    right: embedding.len(),
                })
            }
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }

        Ok(embedding)
    }

    /// Embed two image files and return their cosine similarity.
    pub fn compare_files(&mut self, a: &Path, b: &Path) -> Result<f32> {
        let first = self.embed_file(a)?;
        let second = self.embed_file(b)?;
        first.similarity(&second)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::test_server::{serve_once, serve_silent};
    use image::{Rgb, RgbImage};
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::tempdir;

    /// Deterministic stand-in for a model: pools each channel over image
    /// quadrants into a 12-value embedding.
    pub(crate) struct PoolingBackend {
        pub calls: Rc<Cell<usize>>,
    }

    impl PoolingBackend {
        pub fn new() -> Self {
            Self {
                calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl InferenceBackend for PoolingBackend {
        fn run(&mut self, input: FaceTensor) -> Result<Embedding> {
            self.calls.set(self.calls.get() + 1);
            let half = input.shape()[2] / 2;
            let mut values = Vec::with_capacity(12);
            for c in 0..3 {
                for (qy, qx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    let mut sum = 0.0f32;
                    for y in 0..half {
                        for x in 0..half {
                            sum += input[[0, c, qy * half + y, qx * half + x]];
                        }
                    }
                    values.push(sum / (half * half) as f32 + 0.25 * c as f32);
                }
            }
            Ok(Embedding::new(vec![1, values.len()], values))
        }

        fn describe(&self) -> String {
            "pooling".to_string()
        }
    }

    /// Returns an embedding one longer on every call.
    struct GrowingBackend(usize);

    impl InferenceBackend for GrowingBackend {
        fn run(&mut self, _input: FaceTensor) -> Result<Embedding> {
            self.0 += 1;
            Ok(Embedding::from_vec(vec![1.0; self.0]))
        }

        fn describe(&self) -> String {
            "growing".to_string()
        }
    }

    fn solid(color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(112, 112, Rgb(color)))
    }

    #[test]
    fn test_missing_model_is_model_load_error() {
        let dir = tempdir().unwrap();
        let result = FaceEmbedder::new(&dir.path().join("LVFace-T.onnx"), false);
        assert!(matches!(result, Err(Error::ModelLoad { .. })));
    }

    #[test]
    fn test_identical_images_give_identical_embeddings() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        solid([90, 140, 200]).save(&a).unwrap();
        solid([90, 140, 200]).save(&b).unwrap();

        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());
        let ea = embedder.embed_file(&a).unwrap();
        let eb = embedder.embed_file(&b).unwrap();

        assert_eq!(ea, eb);
        assert!((ea.similarity(&eb).unwrap() - 1.0).abs() < 1e-6);
        assert!((embedder.compare_files(&a, &b).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(embedder.dimension(), Some(12));
    }

    #[test]
    fn test_missing_image_never_reaches_backend() {
        let dir = tempdir().unwrap();
        let backend = PoolingBackend::new();
        let calls = backend.calls.clone();
        let mut embedder = FaceEmbedder::from_backend(backend);

        let result = embedder.embed_file(&dir.path().join("ghost.jpg"));
        assert!(matches!(result, Err(Error::ImageDecode { .. })));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_url_404_is_network_error() {
        let (url, handle) = serve_once("404 Not Found", b"<html>nope</html>".to_vec());
        let backend = PoolingBackend::new();
        let calls = backend.calls.clone();
        let mut embedder = FaceEmbedder::from_backend(backend);

        assert!(matches!(embedder.embed_url(&url), Err(Error::Network { .. })));
        assert_eq!(calls.get(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn test_url_timeout_uses_configured_timeout() {
        let (url, handle) = serve_silent(Duration::from_secs(3));
        let backend = PoolingBackend::new();
        let calls = backend.calls.clone();
        let mut embedder =
            FaceEmbedder::from_backend(backend).with_timeout(Duration::from_millis(500));

        assert!(matches!(embedder.embed_url(&url), Err(Error::Network { .. })));
        assert_eq!(calls.get(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn test_url_with_undecodable_body() {
        let (url, handle) = serve_once("200 OK", b"plain text, not an image".to_vec());
        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());

        assert!(matches!(embedder.embed_url(&url), Err(Error::ImageDecode { .. })));
        handle.join().unwrap();
    }

    #[test]
    fn test_url_matches_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("face.png");
        solid([12, 200, 77]).save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        let (url, handle) = serve_once("200 OK", bytes.clone());
        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());

        let from_url = embedder.embed_url(&url).unwrap();
        let from_file = embedder.embed_file(&path).unwrap();
        let from_bytes = embedder.embed_bytes(&bytes).unwrap();
        assert_eq!(from_url, from_file);
        assert_eq!(from_bytes, from_file);
        handle.join().unwrap();
    }

    #[test]
    fn test_bgr_frame_matches_rgb_image() {
        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());
        let rgb = embedder.embed_image(&solid([10, 20, 30])).unwrap();

        let bgr: Vec<u8> = std::iter::repeat([30u8, 20, 10])
            .take(64 * 48)
            .flatten()
            .collect();
        let frame = embedder
            .embed_frame(&bgr, 64, 48, ChannelOrder::Bgr)
            .unwrap();

        assert_eq!(rgb, frame);
    }

    #[test]
    fn test_different_colors_are_less_similar() {
        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());
        let a = embedder.embed_image(&solid([250, 10, 10])).unwrap();
        let b = embedder.embed_image(&solid([10, 10, 250])).unwrap();
        assert!(a.similarity(&b).unwrap() < 1.0);
    }

    #[test]
    fn test_dimension_is_fixed_per_instance() {
        let mut embedder = FaceEmbedder::from_backend(GrowingBackend(0));
        embedder.embed_image(&solid([0, 0, 0])).unwrap();

        assert!(matches!(
            embedder.embed_image(&solid([0, 0, 0])),
            Err(Error::DimensionMismatch { left: 1, right: 2 })
        ));
    }

    /// Runs against a real model when `LVFACE_TEST_MODEL` points at one.
    #[test]
    #[ignore]
    fn test_real_model_self_similarity() {
        let model = std::env::var("LVFACE_TEST_MODEL").expect("LVFACE_TEST_MODEL not set");
        let mut embedder = FaceEmbedder::new(Path::new(&model), false).unwrap();

        let a = embedder.embed_image(&solid([128, 128, 128])).unwrap();
        let b = embedder.embed_image(&solid([128, 128, 128])).unwrap();
        assert_eq!(a, b);
        assert!((a.similarity(&b).unwrap() - 1.0).abs() < 1e-5);
    }
}
