//! Turning graph components into album candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::eventlets::Eventlet;
use super::graph::EventletGraph;
use crate::assets::AssetSet;
use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// Structurally central to its candidate.
    Strong,
    /// A bridge between parts of the candidate.
    Weak,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Strong => "strong",
            Strength::Weak => "weak",
        }
    }
}

/// A proposed album: one connected component of the eventlet graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumCandidate {
    pub strong_asset_ids: Vec<String>,
    pub weak_asset_ids: Vec<String>,
    pub min_date: DateTime<Utc>,
    pub max_date: DateTime<Utc>,
    /// One entry per geotagged member, duplicates kept.
    pub gps_coords: Vec<(f64, f64)>,
    pub strong_eventlet_ids: Vec<String>,
    pub weak_eventlet_ids: Vec<String>,
}

impl AlbumCandidate {
    /// Strong ids followed by weak ids.
    pub fn all_asset_ids(&self) -> impl Iterator<Item = &str> {
        self.strong_asset_ids
            .iter()
            .chain(self.weak_asset_ids.iter())
            .map(String::as_str)
    }

    pub fn asset_count(&self) -> usize {
        self.strong_asset_ids.len() + self.weak_asset_ids.len()
    }

    pub fn eventlet_count(&self) -> usize {
        self.strong_eventlet_ids.len() + self.weak_eventlet_ids.len()
    }

    pub fn strength_of(&self, asset_id: &str) -> Option<Strength> {
        if self.strong_asset_ids.iter().any(|id| id == asset_id) {
            Some(Strength::Strong)
        } else if self.weak_asset_ids.iter().any(|id| id == asset_id) {
            Some(Strength::Weak)
        } else {
            None
        }
    }
}

/// Label a component's eventlets and flatten them into asset-level output.
///
/// Eventlets that are articulation points of the component's induced
/// subgraph are weak, every other eventlet is strong.
pub fn assemble_candidate(
    assets: &AssetSet,
    eventlets: &[Eventlet],
    graph: &EventletGraph,
    component: &[usize],
) -> ClusterResult<AlbumCandidate> {
    if component.is_empty() {
        return Err(ClusterError::Invariant("empty graph component".to_string()));
    }

    let weak: HashSet<usize> = graph.articulation_points(component).into_iter().collect();

    let mut candidate = AlbumCandidate {
        strong_asset_ids: Vec::new(),
        weak_asset_ids: Vec::new(),
        min_date: DateTime::<Utc>::MAX_UTC,
        max_date: DateTime::<Utc>::MIN_UTC,
        gps_coords: Vec::new(),
        strong_eventlet_ids: Vec::new(),
        weak_eventlet_ids: Vec::new(),
    };

    for &node in component {
        let eventlet = eventlets.get(node).ok_or_else(|| {
            ClusterError::Invariant(format!("graph node {} has no eventlet summary", node))
        })?;

        let (asset_ids, eventlet_ids) = if weak.contains(&node) {
            (&mut candidate.weak_asset_ids, &mut candidate.weak_eventlet_ids)
        } else {
            (&mut candidate.strong_asset_ids, &mut candidate.strong_eventlet_ids)
        };
        eventlet_ids.push(eventlet.id.to_string());

        for &member in &eventlet.members {
            let record = assets.record(member);
            asset_ids.push(record.id.clone());
            candidate.min_date = candidate.min_date.min(record.timestamp);
            candidate.max_date = candidate.max_date.max(record.timestamp);
            if let Some(point) = record.location {
                candidate.gps_coords.push((point.latitude, point.longitude));
            }
        }
    }

    if candidate.asset_count() == 0 {
        return Err(ClusterError::Invariant(format!(
            "component starting at eventlet {} has no assets",
            component[0]
        )));
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{preprocess, RawAssetRow};
    use crate::clustering::eventlets::{summarize, EventletId, EventletKind};
    use crate::config::PreprocessConfig;

    fn row(id: &str, created: &str, gps: Option<(f64, f64)>) -> RawAssetRow {
        RawAssetRow {
            id: id.to_string(),
            created_at: Some(created.to_string()),
            latitude: gps.map(|g| g.0),
            longitude: gps.map(|g| g.1),
            embedding: "[1,0]".to_string(),
            ..Default::default()
        }
    }

    fn fixture() -> (AssetSet, Vec<Eventlet>) {
        let rows = vec![
            row("a1", "2024-03-01T10:00:00Z", Some((1.0, 2.0))),
            row("a2", "2024-03-01T11:00:00Z", Some((1.0, 2.0))),
            row("b1", "2024-03-05T09:00:00Z", None),
            row("c1", "2024-03-09T08:00:00Z", Some((3.0, 4.0))),
            row("c2", "2024-03-09T12:00:00Z", None),
        ];
        let (assets, _) = preprocess(&rows, &PreprocessConfig::default()).unwrap();
        let groups = [vec![0, 1], vec![2], vec![3, 4]];
        let eventlets = groups
            .into_iter()
            .enumerate()
            .map(|(label, members)| {
                let id = EventletId {
                    kind: EventletKind::Time,
                    label,
                };
                summarize(&assets, id, members).unwrap()
            })
            .collect();
        (assets, eventlets)
    }

    #[test]
    fn test_chain_marks_middle_weak() {
        let (assets, eventlets) = fixture();
        let mut graph = EventletGraph::with_nodes(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);

        let candidate = assemble_candidate(&assets, &eventlets, &graph, &[0, 1, 2]).unwrap();
        assert_eq!(candidate.strong_asset_ids, vec!["a1", "a2", "c1", "c2"]);
        assert_eq!(candidate.weak_asset_ids, vec!["b1"]);
        assert_eq!(candidate.weak_eventlet_ids, vec!["time_1"]);
        assert_eq!(candidate.strength_of("b1"), Some(Strength::Weak));
        assert_eq!(candidate.strength_of("zz"), None);
        assert_eq!(candidate.min_date.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(candidate.max_date.to_rfc3339(), "2024-03-09T12:00:00+00:00");
        assert_eq!(candidate.gps_coords, vec![(1.0, 2.0), (1.0, 2.0), (3.0, 4.0)]);
    }

    #[test]
    fn test_strong_and_weak_partition_members() {
        let (assets, eventlets) = fixture();
        let mut graph = EventletGraph::with_nodes(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);

        let candidate = assemble_candidate(&assets, &eventlets, &graph, &[0, 1, 2]).unwrap();
        let strong: HashSet<&str> = candidate.strong_asset_ids.iter().map(String::as_str).collect();
        let weak: HashSet<&str> = candidate.weak_asset_ids.iter().map(String::as_str).collect();
        assert!(strong.is_disjoint(&weak));

        let all: HashSet<&str> = candidate.all_asset_ids().collect();
        let expected: HashSet<&str> = assets.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(all, expected);
        assert_eq!(candidate.asset_count(), 5);
    }

    #[test]
    fn test_pair_is_all_strong() {
        let (assets, eventlets) = fixture();
        let mut graph = EventletGraph::with_nodes(3);
        graph.add_edge(0, 2);

        let candidate = assemble_candidate(&assets, &eventlets, &graph, &[0, 2]).unwrap();
        assert!(candidate.weak_asset_ids.is_empty());
        assert_eq!(candidate.eventlet_count(), 2);
    }

    #[test]
    fn test_unknown_node_is_invariant_error() {
        let (assets, eventlets) = fixture();
        let graph = EventletGraph::with_nodes(4);
        assert!(matches!(
            assemble_candidate(&assets, &eventlets, &graph, &[3]),
            Err(ClusterError::Invariant(_))
        ));
    }
}
