use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::batch::EmbeddingRecord;
use crate::error::{Error, Result};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
            .unwrap_or(ExportFormat::Json)
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    generated_at: DateTime<Utc>,
    model: String,
    count: usize,
    records: &'a [EmbeddingRecord],
}

/// Write embeddings to `output_path`, returning the number written.
pub fn export_embeddings(
    records: &[EmbeddingRecord],
    model: &Path,
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    let result = match format {
        ExportFormat::Json => export_json(records, model, output_path),
        ExportFormat::Csv => export_csv(records, output_path),
    };

    result.map_err(|e| Error::Export {
        path: output_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    tracing::info!(path = ?output_path, count = records.len(), "Embeddings exported");
    Ok(records.len())
}

fn export_json(
    records: &[EmbeddingRecord],
    model: &Path,
    output_path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let document = ExportDocument {
        generated_at: Utc::now(),
        model: model.display().to_string(),
        count: records.len(),
        records,
    };

    let json = serde_json::to_string_pretty(&document)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(
    records: &[EmbeddingRecord],
    output_path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(["path", "dim", "embedding"])?;

    for record in records {
        let values: Vec<String> = record
            .embedding
            .as_slice()
            .iter()
            .map(|v| v.to_string())
            .collect();

        wtr.write_record([
            record.path.display().to_string(),
            record.embedding.len().to_string(),
            values.join(";"),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
