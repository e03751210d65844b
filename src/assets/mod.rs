//! Asset rows as delivered by the photo server, and the cleaned form the
//! clustering stages work on.

pub mod loader;
pub mod preprocess;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

pub use loader::{filter_rows, load_excluded_ids, load_rows};
pub use preprocess::{preprocess, PreprocessReport};

/// One row from the asset export, before any validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAssetRow {
    #[serde(alias = "assetId")]
    pub id: String,

    #[serde(default, alias = "fileCreatedAt")]
    pub created_at: Option<String>,

    /// EXIF capture time, preferred over `created_at` when present.
    #[serde(default, alias = "dateTimeOriginal")]
    pub original_at: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Delimited float list such as `[0.1,0.2,0.3]`.
    #[serde(default)]
    pub embedding: String,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reverse-geocoded place names attached by the photo server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceNames {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl PlaceNames {
    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none()
    }

    /// Non-empty name components, most specific first.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
    }
}

/// A validated asset. Its embedding lives in the owning [`AssetSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub unix_time: i64,
    pub location: Option<GeoPoint>,
    pub place: PlaceNames,
}

impl AssetRecord {
    /// Resolve timestamp, GPS and place names from a raw row.
    ///
    /// The capture time wins over the creation time whenever it is present;
    /// an unparsable capture time drops the row rather than falling back.
    /// Latitude without longitude (or vice versa) is treated as no location.
    pub fn from_row(row: &RawAssetRow) -> Result<Self, RecordError> {
        let timestamp_text = non_blank(&row.original_at)
            .or_else(|| non_blank(&row.created_at))
            .ok_or(RecordError::MissingTimestamp)?;
        let timestamp = parse_timestamp(timestamp_text)?;

        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(GeoPoint { latitude, longitude })
            }
            _ => None,
        };

        Ok(Self {
            id: row.id.clone(),
            timestamp,
            unix_time: timestamp.timestamp(),
            location,
            place: PlaceNames {
                city: row.city.clone(),
                state: row.state.clone(),
                country: row.country.clone(),
            },
        })
    }

    pub fn is_geotagged(&self) -> bool {
        self.location.is_some()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Naive formats are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y:%m:%d %H:%M:%S",
];

/// Parse the timestamp shapes produced by the photo server and EXIF tools.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, RecordError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Postgres style: "2024-07-01 10:00:00.123+02"
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(RecordError::BadTimestamp(text.to_string()))
}

/// Parse `"[v1,v2,...]"` (brackets optional) into a float vector.
pub fn parse_embedding(text: &str) -> Result<Vec<f32>, RecordError> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() {
        return Err(RecordError::BadEmbedding("empty".to_string()));
    }

    inner
        .split(',')
        .map(|token| {
            let token = token.trim();
            match token.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(RecordError::BadEmbedding(format!("invalid component {:?}", token))),
            }
        })
        .collect()
}

/// The cleaned snapshot for one run: records plus one embedding row each.
#[derive(Debug, Clone)]
pub struct AssetSet {
    records: Vec<AssetRecord>,
    embeddings: Array2<f32>,
}

impl AssetSet {
    /// `embeddings` must have exactly one row per record.
    pub fn new(records: Vec<AssetRecord>, embeddings: Array2<f32>) -> Option<Self> {
        (records.len() == embeddings.nrows()).then_some(Self { records, embeddings })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> &AssetRecord {
        &self.records[index]
    }

    pub fn embedding(&self, index: usize) -> ArrayView1<'_, f32> {
        self.embeddings.row(index)
    }
}
