//! Two-stage album clustering.
//!
//! Stage 1 groups assets into dense bursts in time (and space, when GPS is
//! available). Stage 2 links bursts whose mean embeddings are close and whose
//! time ranges are not too far apart; each linked group large enough becomes
//! an [`AlbumCandidate`]. Inside a candidate, bursts that hold the group
//! together (cut vertices) are reported as weak, the rest as strong.

pub mod candidates;
pub mod dbscan;
pub mod eventlets;
pub mod graph;
pub mod similarity;

use serde::Serialize;
use tracing::info;

use crate::assets::{preprocess, AssetSet, PreprocessReport, RawAssetRow};
use crate::config::{Config, Stage1Config, Stage2Config};
use crate::error::ClusterResult;

pub use candidates::{assemble_candidate, AlbumCandidate, Strength};
pub use eventlets::{find_eventlets, Eventlet, EventletId, EventletKind, Stage1Report};
pub use graph::{build_similarity_graph, EventletGraph};

/// Counters for one clustering run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusteringReport {
    pub preprocess: PreprocessReport,
    pub stage1: Stage1Report,
    pub eventlets: usize,
    pub edges: usize,
    pub components: usize,
    pub candidates: usize,
}

/// Run both stages over an already cleaned asset set.
///
/// Both stage configs are validated before any work starts.
pub fn find_album_candidates(
    assets: &AssetSet,
    stage1: &Stage1Config,
    stage2: &Stage2Config,
) -> ClusterResult<(Vec<AlbumCandidate>, ClusteringReport)> {
    stage1.validate()?;
    stage2.validate()?;

    let mut report = ClusteringReport::default();
    if assets.is_empty() {
        info!("No assets to cluster");
        return Ok((Vec::new(), report));
    }

    info!("Stage 1: finding eventlets among {} assets", assets.len());
    let (eventlets, stage1_report) = find_eventlets(assets, stage1)?;
    report.stage1 = stage1_report;
    report.eventlets = eventlets.len();

    if eventlets.is_empty() {
        info!("Stage 1 did not produce any eventlets");
        return Ok((Vec::new(), report));
    }
    info!("Stage 1 found {} eventlets", eventlets.len());

    let graph = build_similarity_graph(&eventlets, stage2);
    let components = graph.connected_components();
    report.edges = graph.edge_count();
    report.components = components.len();

    let candidates = components
        .iter()
        .filter(|component| component.len() >= stage2.min_eventlets_for_album)
        .map(|component| assemble_candidate(assets, &eventlets, &graph, component))
        .collect::<ClusterResult<Vec<_>>>()?;
    report.candidates = candidates.len();

    info!(
        "Stage 2 merged {} eventlets ({} edges) into {} album candidates",
        report.eventlets, report.edges, report.candidates
    );

    Ok((candidates, report))
}

/// Validate the config, clean the rows, and cluster them.
pub fn cluster_rows(
    rows: &[RawAssetRow],
    config: &Config,
) -> ClusterResult<(Vec<AlbumCandidate>, ClusteringReport)> {
    config.validate()?;

    let (assets, preprocess_report) = preprocess(rows, &config.preprocess)?;
    if preprocess_report.dropped() > 0 {
        info!(
            "Dropped {} of {} rows during preprocessing",
            preprocess_report.dropped(),
            preprocess_report.rows_in
        );
    }

    let (candidates, mut report) = find_album_candidates(&assets, &config.stage1, &config.stage2)?;
    report.preprocess = preprocess_report;
    Ok((candidates, report))
}
