//! Extraction results and the geometry-gap report.

use crate::constraint::AxisGroup;
use crate::error::{Error, Result};
use crate::graph::{ConstraintGraph, ConstraintGraphDump};
use serde::{Deserialize, Serialize};

/// A source/target pair where some but not all axis groups matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMatch {
    pub source_id: String,
    pub target_id: String,
    pub matched_axes: Vec<AxisGroup>,
}

/// An item whose host tag could not be resolved to an item or face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedHost {
    pub item_id: String,
    pub host_tag: String,
}

/// Geometry gaps found during extraction.
///
/// None of these abort extraction; they are collected for the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    /// Items that ended without constraints.
    pub unanchored: Vec<String>,
    /// Discarded 1- or 2-axis matches.
    pub partial_matches: Vec<PartialMatch>,
    pub unresolved_hosts: Vec<UnresolvedHost>,
    /// Regions whose type has no extraction rules.
    pub unsupported_regions: Vec<String>,
    /// Containers with a degenerate footprint.
    pub degenerate_containers: Vec<String>,
}

impl ExtractionReport {
    /// Returns true when no gap was recorded.
    pub fn is_complete(&self) -> bool {
        self.unanchored.is_empty()
            && self.partial_matches.is_empty()
            && self.unresolved_hosts.is_empty()
            && self.unsupported_regions.is_empty()
            && self.degenerate_containers.is_empty()
    }

    /// Appends another report.
    pub fn merge(&mut self, other: ExtractionReport) {
        self.unanchored.extend(other.unanchored);
        self.partial_matches.extend(other.partial_matches);
        self.unresolved_hosts.extend(other.unresolved_hosts);
        self.unsupported_regions.extend(other.unsupported_regions);
        for id in other.degenerate_containers {
            if !self.degenerate_containers.contains(&id) {
                self.degenerate_containers.push(id);
            }
        }
    }
}

/// A constraint graph together with its gap report.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub graph: ConstraintGraph,
    pub report: ExtractionReport,
}

impl Extraction {
    /// Snapshots the graph.
    pub fn dump(&self) -> ConstraintGraphDump {
        self.graph.dump()
    }

    /// Fails with [`Error::Unanchored`] when any item is left without
    /// constraints.
    pub fn ensure_anchored(self) -> Result<ConstraintGraph> {
        if self.report.unanchored.is_empty() {
            Ok(self.graph)
        } else {
            Err(Error::Unanchored(self.report.unanchored))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RoomMeta;

    #[test]
    fn test_report_complete() {
        let mut report = ExtractionReport::default();
        assert!(report.is_complete());
        report.partial_matches.push(PartialMatch {
            source_id: "rug".into(),
            target_id: "bed".into(),
            matched_axes: vec![AxisGroup::FrontBack, AxisGroup::LeftRight],
        });
        assert!(!report.is_complete());
    }

    #[test]
    fn test_merge_dedups_degenerate() {
        let mut a = ExtractionReport {
            degenerate_containers: vec!["room".into()],
            ..Default::default()
        };
        let b = ExtractionReport {
            degenerate_containers: vec!["room".into()],
            unanchored: vec!["x".into()],
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.degenerate_containers.len(), 1);
        assert_eq!(a.unanchored, vec!["x"]);
    }

    #[test]
    fn test_ensure_anchored() {
        let extraction = Extraction {
            graph: ConstraintGraph::new(RoomMeta::default()),
            report: ExtractionReport {
                unanchored: vec!["lamp".into()],
                ..Default::default()
            },
        };
        match extraction.ensure_anchored() {
            Err(Error::Unanchored(ids)) => assert_eq!(ids, vec!["lamp"]),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
