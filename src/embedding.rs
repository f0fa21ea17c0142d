use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::similarity::cosine_similarity;

/// Feature vector produced by one forward pass.
///
/// `shape` is the shape of the model output (e.g. `[1, 512]`); `values`
/// holds the same data flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// One-dimensional embedding, shape `[len]`.
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The first `n` values, for display.
    pub fn head(&self, n: usize) -> &[f32] {
        &self.values[..n.min(self.values.len())]
    }

    /// Cosine similarity against another embedding.
    pub fn similarity(&self, other: &Embedding) -> Result<f32> {
        cosine_similarity(&self.values, &other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_is_clamped() {
        let e = Embedding::new(vec![1, 3], vec![0.1, 0.2, 0.3]);
        assert_eq!(e.head(2), &[0.1, 0.2]);
        assert_eq!(e.head(10).len(), 3);
        assert_eq!(e.shape(), &[1, 3]);
    }

    #[test]
    fn test_similarity_ignores_shape() {
        let a = Embedding::new(vec![1, 3], vec![1.0, 2.0, 3.0]);
        let b = Embedding::from_vec(vec![1.0, 2.0, 3.0]);
        assert!((a.similarity(&b).unwrap() - 1.0).abs() < 1e-6);
    }
}
