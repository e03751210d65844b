//! Proposing unclustered assets as additions to finalized albums.
//!
//! Matching uses each album's date range widened by a margin, narrowed by
//! the album's free-text location when the candidates carry place names.
//! Embeddings are not compared here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use crate::assets::AssetRecord;
use crate::config::AdditionsConfig;
use crate::error::ConfigError;

/// The parts of an existing album that matching looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumSummary {
    #[serde(alias = "albumId", alias = "id")]
    pub album_id: String,

    #[serde(default, alias = "startDate")]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(default, alias = "endDate")]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default, alias = "assetIds")]
    pub asset_ids: HashSet<String>,
}

impl AlbumSummary {
    /// Date range of the album; a single known date stands for both ends.
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start.min(end), start.max(end))),
            (Some(date), None) | (None, Some(date)) => Some((date, date)),
            (None, None) => None,
        }
    }

    fn location_filter(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
            .map(str::to_lowercase)
    }
}

/// Load album summaries from a JSON array.
pub fn load_albums(path: &Path) -> Result<Vec<AlbumSummary>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let albums: Vec<AlbumSummary> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse album summaries from {:?}", path))?;
    info!("Loaded {} albums from {:?}", albums.len(), path);
    Ok(albums)
}

/// Album id to the pool asset ids proposed for it.
pub type Additions = BTreeMap<String, Vec<String>>;

/// Find pool assets that plausibly belong to each album.
///
/// Albums without any date are skipped; albums that match nothing are left
/// out of the result. Assets already in an album are never proposed for it.
pub fn find_additions(
    pool: &[AssetRecord],
    albums: &[AlbumSummary],
    config: &AdditionsConfig,
) -> Result<Additions, ConfigError> {
    config.validate()?;
    let margin = config.margin();
    let mut additions = Additions::new();

    for album in albums {
        let Some((start, end)) = album.date_range() else {
            debug!("Skipping album {}: no dates", album.album_id);
            continue;
        };
        let (window_start, window_end) = (start - margin, end + margin);

        let in_window: Vec<&AssetRecord> = pool
            .iter()
            .filter(|asset| !album.asset_ids.contains(&asset.id))
            .filter(|asset| asset.timestamp >= window_start && asset.timestamp <= window_end)
            .collect();

        let matched = match album.location_filter() {
            Some(location) if in_window.iter().any(|asset| !asset.place.is_empty()) => {
                let at_location: Vec<&AssetRecord> = in_window
                    .iter()
                    .copied()
                    .filter(|asset| {
                        asset
                            .place
                            .parts()
                            .any(|part| part.to_lowercase().contains(&location))
                    })
                    .collect();

                if at_location.is_empty() {
                    in_window
                } else {
                    at_location
                }
            }
            _ => in_window,
        };

        if !matched.is_empty() {
            debug!("Album {}: {} candidate additions", album.album_id, matched.len());
            additions.insert(
                album.album_id.clone(),
                matched.into_iter().map(|asset| asset.id.clone()).collect(),
            );
        }
    }

    info!(
        "Found additions for {} of {} albums",
        additions.len(),
        albums.len()
    );
    Ok(additions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::PlaceNames;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, hour, 0, 0).unwrap()
    }

    fn asset(id: &str, timestamp: DateTime<Utc>, city: Option<&str>) -> AssetRecord {
        AssetRecord {
            id: id.to_string(),
            timestamp,
            unix_time: timestamp.timestamp(),
            location: None,
            place: PlaceNames {
                city: city.map(str::to_string),
                ..Default::default()
            },
        }
    }

    fn album(id: &str, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> AlbumSummary {
        AlbumSummary {
            album_id: id.to_string(),
            start_date: start,
            end_date: end,
            ..Default::default()
        }
    }

    fn config() -> AdditionsConfig {
        AdditionsConfig {
            time_threshold_hours: 6.0,
        }
    }

    #[test]
    fn test_window_includes_margin() {
        let pool = vec![
            asset("early", at(10, 0) - Duration::hours(12), None),
            asset("too_early", at(10, 0) - Duration::hours(13), None),
            asset("during", at(11, 9), None),
            asset("late", at(12, 11), None),
            asset("too_late", at(13, 1), None),
        ];
        let albums = vec![album("trip", Some(at(10, 0)), Some(at(12, 0)))];

        let additions = find_additions(&pool, &albums, &config()).unwrap();
        assert_eq!(additions["trip"], vec!["early", "during", "late"]);
    }

    #[test]
    fn test_album_without_dates_is_skipped() {
        let pool = vec![asset("a", at(10, 0), None)];
        let albums = vec![album("undated", None, None), album("nothing", Some(at(20, 0)), None)];

        let additions = find_additions(&pool, &albums, &config()).unwrap();
        assert!(additions.is_empty());
    }

    #[test]
    fn test_single_date_is_used_for_both_ends() {
        let pool = vec![asset("a", at(10, 5), None)];
        let albums = vec![album("day", None, Some(at(10, 0)))];

        let additions = find_additions(&pool, &albums, &config()).unwrap();
        assert_eq!(additions["day"], vec!["a"]);
    }

    #[test]
    fn test_existing_members_are_not_proposed() {
        let pool = vec![asset("member", at(10, 1), None), asset("new", at(10, 2), None)];
        let mut existing = album("trip", Some(at(10, 0)), Some(at(10, 3)));
        existing.asset_ids.insert("member".to_string());

        let additions = find_additions(&pool, &[existing], &config()).unwrap();
        assert_eq!(additions["trip"], vec!["new"]);
    }

    #[test]
    fn test_location_filter_and_fallback() {
        let pool = vec![
            asset("rome", at(10, 1), Some("Rome")),
            asset("milan", at(10, 2), Some("Milan")),
            asset("unknown", at(10, 3), None),
        ];

        let mut roman = album("roman", Some(at(10, 0)), Some(at(10, 4)));
        roman.location = Some("rom".to_string());
        let mut paris = album("paris", Some(at(10, 0)), Some(at(10, 4)));
        paris.location = Some("Paris".to_string());

        let additions = find_additions(&pool, &[roman, paris], &config()).unwrap();
        assert_eq!(additions["roman"], vec!["rome"]);
        // No asset mentions Paris, so the whole time window is kept.
        assert_eq!(additions["paris"], vec!["rome", "milan", "unknown"]);
    }

    #[test]
    fn test_location_ignored_without_place_names() {
        let pool = vec![asset("a", at(10, 1), None)];
        let mut tagged = album("tagged", Some(at(10, 0)), Some(at(10, 2)));
        tagged.location = Some("Norway".to_string());

        let additions = find_additions(&pool, &[tagged], &config()).unwrap();
        assert_eq!(additions["tagged"], vec!["a"]);
    }

    #[test]
    fn test_invalid_threshold() {
        let bad = AdditionsConfig {
            time_threshold_hours: 0.0,
        };
        assert!(find_additions(&[], &[], &bad).is_err());
    }

    #[test]
    fn test_load_albums_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("albums.json");
        std::fs::write(
            &path,
            r#"[{"id": "a", "location": "Oslo"}, {"album_id": "b", "end_date": "2024-08-10T00:00:00Z"}]"#,
        )
        .unwrap();

        let albums = load_albums(&path).unwrap();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].location.as_deref(), Some("Oslo"));
        assert_eq!(albums[1].date_range(), Some((at(10, 0), at(10, 0))));
        assert!(load_albums(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_summary_deserializes_server_names() {
        let album: AlbumSummary = serde_json::from_str(
            r#"{"albumId": "x1", "startDate": "2024-08-10T00:00:00Z", "assetIds": ["a", "b"]}"#,
        )
        .unwrap();
        assert_eq!(album.album_id, "x1");
        assert_eq!(album.date_range(), Some((at(10, 0), at(10, 0))));
        assert_eq!(album.asset_ids.len(), 2);
    }
}
