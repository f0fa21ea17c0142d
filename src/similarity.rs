//! Embedding comparison.

use std::fmt;

use crate::error::{Error, Result};

/// Calculate cosine similarity between two embeddings.
///
/// Returns a value between -1 and 1 (higher = more similar). When either
/// vector has zero norm the result is `0.0`. Vectors of different length
/// are rejected.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
    } else {
        Ok(0.0)
    }
}

/// Score boundaries used to interpret a similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub same_person: f32,
    pub possibly_same: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            same_person: 0.7,
            possibly_same: 0.5,
        }
    }
}

/// Human interpretation of a face similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    SamePerson,
    PossiblySame,
    Different,
}

impl Verdict {
    /// Both thresholds are exclusive: a score equal to `same_person` is
    /// only a possible match.
    pub fn from_score(score: f32, thresholds: &MatchThresholds) -> Self {
        if score > thresholds.same_person {
            Verdict::SamePerson
        } else if score > thresholds.possibly_same {
            Verdict::PossiblySame
        } else {
            Verdict::Different
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::SamePerson => "Likely the same person",
            Verdict::PossiblySame => "Possibly the same person",
            Verdict::Different => "Likely different people",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f32> {
        (0..512).map(|i| ((i as f32) * 0.37).sin()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c).unwrap() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_self_and_opposite() {
        let v = sample();
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();

        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-5);
        assert!((cosine_similarity(&v, &neg).unwrap() + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_vector_is_zero() {
        let zero = vec![0.0; 512];
        assert_eq!(cosine_similarity(&zero, &sample()).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&sample(), &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = sample();
        let b: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.11).cos()).collect();
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_length_mismatch() {
        let result = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_verdict_thresholds_are_exclusive() {
        let t = MatchThresholds::default();
        assert_eq!(Verdict::from_score(0.95, &t), Verdict::SamePerson);
        assert_eq!(Verdict::from_score(0.7, &t), Verdict::PossiblySame);
        assert_eq!(Verdict::from_score(0.6, &t), Verdict::PossiblySame);
        assert_eq!(Verdict::from_score(0.5, &t), Verdict::Different);
        assert_eq!(Verdict::from_score(-0.2, &t), Verdict::Different);
    }
}
