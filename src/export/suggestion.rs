//! The initial review record for a freshly clustered candidate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clustering::AlbumCandidate;
use crate::config::DefaultsConfig;

/// Status a draft is stored under. Drafts are only ever created here; the
/// review workflow that moves them on owns every later state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    #[default]
    PendingEnrichment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionDraft {
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub event_start_date: DateTime<Utc>,
    pub event_end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub title: String,
    pub description: String,
    pub cover_asset_id: Option<String>,
    pub strong_asset_ids: Vec<String>,
    pub weak_asset_ids: Vec<String>,
}

impl SuggestionDraft {
    /// Build a draft with placeholder text until a caption is generated.
    pub fn from_candidate(
        candidate: &AlbumCandidate,
        location: Option<String>,
        defaults: &DefaultsConfig,
        created_at: DateTime<Utc>,
    ) -> Self {
        let date_str = candidate.min_date.format("%B %Y").to_string();

        Self {
            status: SuggestionStatus::PendingEnrichment,
            created_at,
            event_start_date: candidate.min_date,
            event_end_date: candidate.max_date,
            location,
            title: defaults.title_template.replace("{date_str}", &date_str),
            description: defaults.description.clone(),
            cover_asset_id: candidate.all_asset_ids().next().map(str::to_string),
            strong_asset_ids: candidate.strong_asset_ids.clone(),
            weak_asset_ids: candidate.weak_asset_ids.clone(),
        }
    }
}
