//! Writing clustering output for the review and persistence side.

pub mod suggestion;

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::additions::Additions;
use crate::clustering::{AlbumCandidate, ClusteringReport, Strength};
use crate::config::DefaultsConfig;

pub use suggestion::{SuggestionDraft, SuggestionStatus};

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

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown export format {:?} (expected json or csv)", other),
        }
    }
}

/// Candidate plus its draft suggestion, as written to JSON.
#[derive(Debug, Serialize)]
pub struct ExportedCandidate<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub candidate: &'a AlbumCandidate,
    pub suggestion: SuggestionDraft,
}

#[derive(Debug, Serialize)]
struct CandidateFile<'a> {
    report: &'a ClusteringReport,
    candidates: Vec<ExportedCandidate<'a>>,
}

/// Export candidates to a file. Returns the number of candidates written.
pub fn export_candidates(
    candidates: &[AlbumCandidate],
    report: &ClusteringReport,
    defaults: &DefaultsConfig,
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    match format {
        ExportFormat::Json => export_json(candidates, report, defaults, output_path)?,
        ExportFormat::Csv => export_csv(candidates, output_path)?,
    }

    Ok(candidates.len())
}

fn export_json(
    candidates: &[AlbumCandidate],
    report: &ClusteringReport,
    defaults: &DefaultsConfig,
    output_path: &Path,
) -> Result<()> {
    let created_at = Utc::now();
    let file = CandidateFile {
        report,
        candidates: candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| ExportedCandidate {
                index,
                candidate,
                // Place names come from the geocoder later in the pipeline.
                suggestion: SuggestionDraft::from_candidate(candidate, None, defaults, created_at),
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&file)?;
    let mut out = File::create(output_path)?;
    out.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(candidates: &[AlbumCandidate], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(["candidate", "asset_id", "strength", "min_date", "max_date"])?;

    for (index, candidate) in candidates.iter().enumerate() {
        let index = index.to_string();
        let min_date = candidate.min_date.to_rfc3339();
        let max_date = candidate.max_date.to_rfc3339();

        for (ids, strength) in [
            (&candidate.strong_asset_ids, Strength::Strong),
            (&candidate.weak_asset_ids, Strength::Weak),
        ] {
            for id in ids {
                wtr.write_record([
                    index.as_str(),
                    id.as_str(),
                    strength.as_str(),
                    min_date.as_str(),
                    max_date.as_str(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Write the album id to asset ids map as pretty JSON.
pub fn export_additions(additions: &Additions, output_path: &Path) -> Result<usize> {
    let json = serde_json::to_string_pretty(additions)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(additions.values().map(Vec::len).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate() -> AlbumCandidate {
        AlbumCandidate {
            strong_asset_ids: vec!["s1".to_string(), "s2".to_string()],
            weak_asset_ids: vec!["w1".to_string()],
            min_date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            max_date: Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap(),
            gps_coords: vec![(1.0, 2.0)],
            strong_eventlet_ids: vec!["geo_0".to_string(), "geo_2".to_string()],
            weak_eventlet_ids: vec!["geo_1".to_string()],
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("CSV").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse("json").unwrap().extension(), "json");
        assert!(ExportFormat::parse("html").is_err());
    }

    #[test]
    fn test_export_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let written = export_candidates(
            &[candidate()],
            &ClusteringReport::default(),
            &DefaultsConfig::default(),
            &path,
            ExportFormat::Csv,
        )
        .unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("candidate,asset_id,strength"));
        assert!(lines[3].starts_with("0,w1,weak,"));
    }

    #[test]
    fn test_export_json_includes_draft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        export_candidates(
            &[candidate()],
            &ClusteringReport::default(),
            &DefaultsConfig::default(),
            &path,
            ExportFormat::Json,
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let exported = &value["candidates"][0];
        assert_eq!(exported["index"], 0);
        assert_eq!(exported["weak_asset_ids"][0], "w1");
        assert_eq!(exported["suggestion"]["title"], "Event from February 2024");
        assert_eq!(exported["suggestion"]["status"], "pending_enrichment");
        assert!(value["report"]["preprocess"].is_object());
    }

    #[test]
    fn test_export_additions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("additions.json");
        let mut additions = Additions::new();
        additions.insert("album".to_string(), vec!["a".to_string(), "b".to_string()]);

        assert_eq!(export_additions(&additions, &path).unwrap(), 2);
        let back: Additions =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, additions);
    }
}
