//! Embedding whole directories of images and ranking them against a query.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::backend::InferenceBackend;
use crate::embedding::Embedding;
use crate::error::Result;
use crate::extractor::FaceEmbedder;

/// Embedding of one image file.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRecord {
    pub path: PathBuf,
    pub embedding: Embedding,
}

/// An image that could not be embedded.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<EmbeddingRecord>,
    pub failures: Vec<BatchFailure>,
}

/// A record scored against a query embedding.
#[derive(Debug, Clone)]
pub struct RankedMatch<'a> {
    pub record: &'a EmbeddingRecord,
    pub score: f32,
}

/// A directory entry the walk could not read.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Image files found under a directory, plus what could not be walked.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted by path.
    pub images: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
}

/// Collect files under `directory` whose extension matches one of
/// `extensions`, ignoring case. Symlinks are not followed.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Discovery {
    let mut discovery = Discovery::default();

    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf);
                tracing::warn!(path = ?path, error = %e, "Cannot read directory entry");
                discovery.skipped.push(SkippedEntry {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if matches {
            discovery.images.push(entry.into_path());
        }
    }

    discovery.images.sort();
    tracing::debug!(
        root = ?directory,
        images = discovery.images.len(),
        skipped = discovery.skipped.len(),
        "Discovery complete"
    );

    discovery
}

/// Embed every path in order. A file that fails is recorded and skipped.
pub fn embed_all<B: InferenceBackend>(
    embedder: &mut FaceEmbedder<B>,
    paths: &[PathBuf],
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (idx, path) in paths.iter().enumerate() {
        tracing::debug!(current = idx + 1, total = paths.len(), path = ?path, "Embedding");

        match embedder.embed_file(path) {
            Ok(embedding) => outcome.records.push(EmbeddingRecord {
                path: path.clone(),
                embedding,
            }),
            Err(e) => {
                let message = e.full_message();
                tracing::warn!(path = ?path, error = %message, "Skipping image");
                outcome.failures.push(BatchFailure {
                    path: path.clone(),
                    message,
                });
            }
        }
    }

    tracing::info!(
        embedded = outcome.records.len(),
        failed = outcome.failures.len(),
        "Batch complete"
    );

    outcome
}

/// Score every record against `query`, best first, keeping at most `top_k`.
pub fn rank_against<'a>(
    query: &Embedding,
    records: &'a [EmbeddingRecord],
    top_k: usize,
) -> Result<Vec<RankedMatch<'a>>> {
    let mut ranked = records
        .iter()
        .map(|record| {
            query
                .similarity(&record.embedding)
                .map(|score| RankedMatch { record, score })
        })
        .collect::<Result<Vec<_>>>()?;

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_k);

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::extractor::tests::PoolingBackend;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn save_solid(path: &Path, color: [u8; 3]) {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb(color)))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("face1.jpg")).unwrap();
        File::create(dir.path().join("face2.PNG")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/face3.jpeg")).unwrap();

        let extensions = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
        let discovery = discover_images(dir.path(), &extensions);

        assert_eq!(
            discovery.images,
            vec![
                dir.path().join("face1.jpg"),
                dir.path().join("face2.PNG"),
                dir.path().join("subdir/face3.jpeg"),
            ]
        );
        assert!(discovery.skipped.is_empty());
    }

    #[test]
    fn test_discover_images_reports_unreadable_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");

        let discovery = discover_images(&missing, &["jpg".to_string()]);
        assert!(discovery.images.is_empty());
        assert_eq!(discovery.skipped.len(), 1);
        assert_eq!(discovery.skipped[0].path.as_deref(), Some(missing.as_path()));
    }

    #[test]
    fn test_failures_do_not_abort() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("a.png");
        let bad = dir.path().join("b.png");
        let also_good = dir.path().join("c.png");
        save_solid(&good, [200, 10, 10]);
        fs::write(&bad, b"corrupt").unwrap();
        save_solid(&also_good, [10, 10, 200]);

        let mut embedder = FaceEmbedder::from_backend(PoolingBackend::new());
        let outcome = embed_all(&mut embedder, &[good.clone(), bad.clone(), also_good.clone()]);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, bad);
        let prefix = format!("failed to decode image from {}: ", bad.display());
        assert!(outcome.failures[0].message.starts_with(&prefix));
        assert!(outcome.failures[0].message.len() > prefix.len());
        assert_eq!(outcome.records[0].path, good);
        assert_eq!(outcome.records[1].path, also_good);
    }

    #[test]
    fn test_rank_against_orders_by_score() {
        let records = vec![
            EmbeddingRecord {
                path: PathBuf::from("orthogonal.jpg"),
                embedding: Embedding::from_vec(vec![0.0, 1.0]),
            },
            EmbeddingRecord {
                path: PathBuf::from("same.jpg"),
                embedding: Embedding::from_vec(vec![2.0, 0.0]),
            },
            EmbeddingRecord {
                path: PathBuf::from("opposite.jpg"),
                embedding: Embedding::from_vec(vec![-1.0, 0.0]),
            },
        ];
        let query = Embedding::from_vec(vec![1.0, 0.0]);

        let ranked = rank_against(&query, &records, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].record.path, PathBuf::from("same.jpg"));
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].record.path, PathBuf::from("orthogonal.jpg"));
    }

    #[test]
    fn test_rank_against_rejects_mismatched_dimensions() {
        let records = vec![EmbeddingRecord {
            path: PathBuf::from("x.jpg"),
            embedding: Embedding::from_vec(vec![1.0, 0.0, 0.0]),
        }];
        let query = Embedding::from_vec(vec![1.0, 0.0]);

        assert!(matches!(
            rank_against(&query, &records, 5),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
