//! Inference timing on a synthetic face-sized image.

use image::{DynamicImage, Rgb, RgbImage};
use std::time::{Duration, Instant};

use crate::backend::InferenceBackend;
use crate::error::Result;
use crate::extractor::FaceEmbedder;
use crate::preprocess::INPUT_SIZE;

#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub runs: Vec<Duration>,
    pub embedding_shape: Vec<usize>,
}

impl BenchmarkResult {
    pub fn average(&self) -> Duration {
        if self.runs.is_empty() {
            return Duration::ZERO;
        }
        self.runs.iter().sum::<Duration>() / self.runs.len() as u32
    }

    /// Throughput implied by the average run time.
    pub fn images_per_second(&self) -> f64 {
        let avg = self.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }
}

/// Deterministic 112x112 test pattern.
pub fn synthetic_face() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(INPUT_SIZE, INPUT_SIZE, |x, y| {
        Rgb([
            (x * 2) as u8,
            (y * 2) as u8,
            ((x * 7 + y * 13) % 256) as u8,
        ])
    }))
}

/// One untimed warm-up pass, then `runs` timed passes.
pub fn run<B: InferenceBackend>(embedder: &mut FaceEmbedder<B>, runs: usize) -> Result<BenchmarkResult> {
    let img = synthetic_face();

    let warmup = embedder.embed_image(&img)?;
    let mut timings = Vec::with_capacity(runs);

    for i in 0..runs {
        let start = Instant::now();
        embedder.embed_image(&img)?;
        let elapsed = start.elapsed();
        tracing::debug!(run = i + 1, ms = elapsed.as_secs_f64() * 1000.0, "Benchmark run");
        timings.push(elapsed);
    }

    Ok(BenchmarkResult {
        runs: timings,
        embedding_shape: warmup.shape().to_vec(),
    })
}
