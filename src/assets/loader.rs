//! Reading asset exports from disk and narrowing them before a run.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use super::{parse_timestamp, RawAssetRow};

/// Load raw rows from a `.json` array or a `.csv` file with a header row.
pub fn load_rows(path: &Path) -> Result<Vec<RawAssetRow>> {
    let rows = match extension(path).as_deref() {
        Some("json") => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse asset rows from {:?}", path))?
        }
        Some("csv") => {
            let mut reader = csv::Reader::from_path(path)
                .with_context(|| format!("Failed to open {:?}", path))?;
            let mut rows = Vec::new();
            for (line, record) in reader.deserialize::<RawAssetRow>().enumerate() {
                let row = record.with_context(|| format!("Bad CSV record {} in {:?}", line + 1, path))?;
                rows.push(row);
            }
            rows
        }
        _ => bail!("Unsupported asset file {:?} (expected .json or .csv)", path),
    };

    info!("Loaded {} asset rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Load ids of assets that earlier runs already placed in a suggestion.
///
/// Accepts a JSON array of strings or plain text with one id per line.
pub fn load_excluded_ids(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read exclusion list {:?}", path))?;

    if extension(path).as_deref() == Some("json") {
        let ids: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse exclusion list {:?}", path))?;
        return Ok(ids.into_iter().collect());
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Drop excluded ids, then optionally keep only the newest `limit` rows.
///
/// With a limit the result is ordered newest first by creation time; rows
/// whose creation time cannot be read sort last.
pub fn filter_rows(
    rows: Vec<RawAssetRow>,
    excluded: &HashSet<String>,
    limit: Option<usize>,
) -> Vec<RawAssetRow> {
    let before = rows.len();
    let mut rows: Vec<RawAssetRow> = rows
        .into_iter()
        .filter(|row| !excluded.contains(&row.id))
        .collect();

    if before != rows.len() {
        info!("Excluded {} previously processed assets", before - rows.len());
    }

    if let Some(limit) = limit {
        let mut keyed: Vec<(Option<DateTime<Utc>>, RawAssetRow)> = rows
            .into_iter()
            .map(|row| {
                let created = row.created_at.as_deref().and_then(|s| parse_timestamp(s).ok());
                (created, row)
            })
            .collect();
        // None < Some, so reversing the order puts unknown dates last
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        keyed.truncate(limit);
        info!("Dev mode: limited to {} most recent assets", keyed.len());
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    rows
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
