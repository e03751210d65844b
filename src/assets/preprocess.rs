//! Turns raw rows into the cleaned [`AssetSet`] consumed by clustering.

use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, warn};

use super::{parse_embedding, AssetRecord, AssetSet, RawAssetRow};
use crate::config::PreprocessConfig;
use crate::error::{ClusterError, ClusterResult, RecordError};

/// What happened to the rows handed to [`preprocess`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessReport {
    pub rows_in: usize,
    pub kept: usize,
    pub dropped_timestamp: usize,
    pub dropped_embedding: usize,
    /// Embedding length used for the run (0 when nothing survived).
    pub dimension: usize,
}

impl PreprocessReport {
    pub fn dropped(&self) -> usize {
        self.dropped_timestamp + self.dropped_embedding
    }
}

/// Validate every row, dropping (and logging) the ones that cannot be used.
///
/// The embedding length is taken from the config, or else it is the most
/// common length among rows that parse (ties go to the length seen first).
/// Rows with any other length are dropped.
pub fn preprocess(
    rows: &[RawAssetRow],
    config: &PreprocessConfig,
) -> ClusterResult<(AssetSet, PreprocessReport)> {
    let mut report = PreprocessReport {
        rows_in: rows.len(),
        ..Default::default()
    };

    let parsed: Vec<Result<(AssetRecord, Vec<f32>), RecordError>> =
        rows.iter().map(clean_row).collect();

    let dimension = config
        .embedding_dimension
        .or_else(|| majority_dimension(&parsed))
        .unwrap_or(0);

    let mut records = Vec::with_capacity(rows.len());
    let mut flat: Vec<f32> = Vec::new();

    for (row, result) in rows.iter().zip(parsed) {
        let checked = result.and_then(|(record, embedding)| {
            if embedding.len() == dimension {
                Ok((record, embedding))
            } else {
                Err(RecordError::DimensionMismatch {
                    expected: dimension,
                    found: embedding.len(),
                })
            }
        });

        match checked {
            Ok((record, embedding)) => {
                flat.extend_from_slice(&embedding);
                records.push(record);
            }
            Err(e) => {
                warn!("Dropping asset {}: {}", row.id, e);
                if e.is_timestamp() {
                    report.dropped_timestamp += 1;
                } else {
                    report.dropped_embedding += 1;
                }
            }
        }
    }

    report.kept = records.len();
    report.dimension = dimension;

    let embeddings = Array2::from_shape_vec((records.len(), dimension), flat)
        .map_err(|e| ClusterError::Invariant(format!("embedding matrix shape: {}", e)))?;
    let assets = AssetSet::new(records, embeddings)
        .ok_or_else(|| ClusterError::Invariant("embedding rows do not match records".to_string()))?;

    debug!(
        "Preprocessed {} rows: {} kept, {} bad timestamps, {} bad embeddings (D={})",
        report.rows_in, report.kept, report.dropped_timestamp, report.dropped_embedding, dimension
    );

    Ok((assets, report))
}

fn clean_row(row: &RawAssetRow) -> Result<(AssetRecord, Vec<f32>), RecordError> {
    let record = AssetRecord::from_row(row)?;
    let embedding = parse_embedding(&row.embedding)?;
    Ok((record, embedding))
}

/// Most frequent embedding length among parsed rows; earliest wins a tie.
fn majority_dimension(parsed: &[Result<(AssetRecord, Vec<f32>), RecordError>]) -> Option<usize> {
    // (length, count) in order of first appearance
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for (_, embedding) in parsed.iter().flatten() {
        match counts.iter_mut().find(|(len, _)| *len == embedding.len()) {
            Some((_, count)) => *count += 1,
            None => counts.push((embedding.len(), 1)),
        }
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (len, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((len, count)),
        })
        .map(|(len, _)| len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, created: &str, embedding: &str) -> RawAssetRow {
        RawAssetRow {
            id: id.to_string(),
            created_at: Some(created.to_string()),
            embedding: embedding.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_drops_bad_rows_and_keeps_order() {
        let rows = vec![
            row("a", "2024-01-01T00:00:00Z", "[1,0,0]"),
            row("b", "not a date", "[1,0,0]"),
            row("c", "2024-01-01T00:01:00Z", "[1,0,0"),
            row("d", "2024-01-01T00:02:00Z", "[oops]"),
            row("e", "2024-01-01T00:03:00Z", "[0,1]"),
            row("f", "2024-01-01T00:04:00Z", "[0,0,1]"),
        ];

        let (assets, report) = preprocess(&rows, &PreprocessConfig::default()).unwrap();

        let ids: Vec<&str> = assets.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "f"]);
        assert_eq!(report.rows_in, 6);
        assert_eq!(report.kept, 3);
        assert_eq!(report.dropped_timestamp, 1);
        assert_eq!(report.dropped_embedding, 2);
        assert_eq!(report.dimension, 3);
        assert_eq!(assets.embedding(2).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_truncated_first_row_does_not_set_dimension() {
        let mut rows: Vec<RawAssetRow> = (0..10)
            .map(|i| row(&format!("a{}", i), "2024-01-01T00:00:00Z", "[0.5,0.5,0.1]"))
            .collect();
        rows[0].embedding = "[0.5".to_string();

        let (assets, report) = preprocess(&rows, &PreprocessConfig::default()).unwrap();
        assert_eq!(report.dimension, 3);
        assert_eq!(report.kept, 9);
        assert_eq!(report.dropped_embedding, 1);
        assert_eq!(assets.record(0).id, "a1");
    }

    #[test]
    fn test_dimension_tie_goes_to_first_seen() {
        let rows = vec![
            row("a", "2024-01-01T00:00:00Z", "[1,0]"),
            row("b", "2024-01-01T00:00:00Z", "[1,0,0]"),
            row("c", "2024-01-01T00:00:00Z", "[0,1,0]"),
            row("d", "2024-01-01T00:00:00Z", "[0,1]"),
        ];

        let (assets, report) = preprocess(&rows, &PreprocessConfig::default()).unwrap();
        assert_eq!(report.dimension, 2);
        let ids: Vec<&str> = assets.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_configured_dimension_wins() {
        let rows = vec![
            row("a", "2024-01-01T00:00:00Z", "[1,0,0]"),
            row("b", "2024-01-01T00:00:00Z", "[1,0]"),
        ];
        let config = PreprocessConfig {
            embedding_dimension: Some(2),
        };

        let (assets, report) = preprocess(&rows, &config).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets.record(0).id, "b");
        assert_eq!(report.dropped_embedding, 1);
    }

    #[test]
    fn test_empty_input() {
        let (assets, report) = preprocess(&[], &PreprocessConfig::default()).unwrap();
        assert!(assets.is_empty());
        assert_eq!(report.dimension, 0);
        assert_eq!(report.dropped(), 0);
    }
}
