//! Stage 1: dense spatiotemporal bursts ("eventlets").
//!
//! Geotagged assets are clustered on (time, latitude, longitude) and the rest
//! on time alone, each axis divided by its configured window so that a unit
//! radius means "within one window".

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::dbscan::Dbscan;
use crate::assets::AssetSet;
use crate::config::Stage1Config;
use crate::error::{ClusterError, ClusterResult};

/// Neighbourhood radius in window-normalised feature space.
const NORMALIZED_RADIUS: f64 = 1.0;

/// Which sub-run produced an eventlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventletKind {
    Geo,
    Time,
}

impl EventletKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EventletKind::Geo => "geo",
            EventletKind::Time => "time",
        }
    }
}

/// `geo_<label>` or `time_<label>`; labels restart at 0 in each sub-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventletId {
    pub kind: EventletKind,
    pub label: usize,
}

impl fmt::Display for EventletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.label)
    }
}

#[derive(Debug, Clone)]
pub struct Eventlet {
    pub id: EventletId,
    /// Indices into the run's [`AssetSet`], ascending.
    pub members: Vec<usize>,
    pub mean_embedding: Array1<f64>,
    pub min_time: i64,
    pub max_time: i64,
}

impl Eventlet {
    pub fn member_ids<'a>(&'a self, assets: &'a AssetSet) -> impl Iterator<Item = &'a str> + 'a {
        self.members.iter().map(move |&i| assets.record(i).id.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stage1Report {
    pub geotagged: usize,
    pub non_geotagged: usize,
    pub geo_eventlets: usize,
    pub time_eventlets: usize,
    pub noise_assets: usize,
}

/// Cluster assets into eventlets, geo eventlets first, each group by label.
pub fn find_eventlets(
    assets: &AssetSet,
    config: &Stage1Config,
) -> ClusterResult<(Vec<Eventlet>, Stage1Report)> {
    config.validate()?;

    let (geo_rows, time_rows): (Vec<usize>, Vec<usize>) =
        (0..assets.len()).partition(|&i| assets.record(i).is_geotagged());

    let mut report = Stage1Report {
        geotagged: geo_rows.len(),
        non_geotagged: time_rows.len(),
        ..Default::default()
    };

    let dbscan = Dbscan::new(NORMALIZED_RADIUS, config.min_cluster_size);
    let mut groups: Vec<(EventletId, Vec<usize>)> = Vec::new();

    for (kind, rows) in [(EventletKind::Geo, &geo_rows), (EventletKind::Time, &time_rows)] {
        if rows.is_empty() {
            continue;
        }

        let features = features_for(assets, rows, kind, config)?;
        let clustering = dbscan.fit(features.view());
        report.noise_assets += clustering.noise_count();

        match kind {
            EventletKind::Geo => report.geo_eventlets = clustering.n_clusters,
            EventletKind::Time => report.time_eventlets = clustering.n_clusters,
        }

        for (label, local_members) in clustering.members().into_iter().enumerate() {
            let members = local_members.into_iter().map(|local| rows[local]).collect();
            groups.push((EventletId { kind, label }, members));
        }
    }

    debug!(
        "Stage 1: {} geo eventlets from {} geotagged assets, {} time eventlets from {} others, {} noise",
        report.geo_eventlets,
        report.geotagged,
        report.time_eventlets,
        report.non_geotagged,
        report.noise_assets
    );

    let eventlets = groups
        .into_par_iter()
        .map(|(id, members)| summarize(assets, id, members))
        .collect::<ClusterResult<Vec<_>>>()?;

    Ok((eventlets, report))
}

fn features_for(
    assets: &AssetSet,
    rows: &[usize],
    kind: EventletKind,
    config: &Stage1Config,
) -> ClusterResult<Array2<f64>> {
    let mut features = Array2::zeros((rows.len(), if kind == EventletKind::Geo { 3 } else { 1 }));

    for (r, &i) in rows.iter().enumerate() {
        let record = assets.record(i);
        features[[r, 0]] = record.unix_time as f64 / config.time_window_seconds;

        if kind == EventletKind::Geo {
            let point = record.location.ok_or_else(|| {
                ClusterError::Invariant(format!("asset {} in geo subset has no location", record.id))
            })?;
            features[[r, 1]] = point.latitude / config.space_window_degrees;
            features[[r, 2]] = point.longitude / config.space_window_degrees;
        }
    }

    Ok(features)
}

/// Reduce one eventlet's members to a mean embedding and a time interval.
pub fn summarize(assets: &AssetSet, id: EventletId, members: Vec<usize>) -> ClusterResult<Eventlet> {
    if members.is_empty() {
        return Err(ClusterError::Invariant(format!("eventlet {} has no members", id)));
    }

    let mut sum = Array1::<f64>::zeros(assets.dimension());
    let mut min_time = i64::MAX;
    let mut max_time = i64::MIN;

    for &i in &members {
        sum.zip_mut_with(&assets.embedding(i), |acc, &v| *acc += f64::from(v));
        let unix_time = assets.record(i).unix_time;
        min_time = min_time.min(unix_time);
        max_time = max_time.max(unix_time);
    }

    Ok(Eventlet {
        id,
        mean_embedding: sum / members.len() as f64,
        members,
        min_time,
        max_time,
    })
}
