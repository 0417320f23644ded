//! Segment graph construction.
//!
//! 1. Classify every hit into its sector (parallel).
//! 2. For every occupied sector and every connected target sector, form a
//!    two-hit segment from each outer hit to each inner hit.
//! 3. For every parent segment, test the segments starting at its inner hit
//!    against the criteria (parallel across parents) and link the accepted
//!    pairs.

use crate::connector::SectorConnector;
use crate::criteria::{Criterion, Diagnostics};
use crate::segment::{SegmentGraph, SegmentId};
use catrack_core::{Hit, Position, Result, Sector, SectorSystem};
use rayon::prelude::*;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// One criterion evaluation, kept for offline tuning.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DiagnosticRecord {
    /// Parent segment.
    pub parent: SegmentId,
    /// Child segment.
    pub child: SegmentId,
    /// Criterion name.
    pub criterion: &'static str,
    /// Decision of the criterion.
    pub accepted: bool,
    /// Values recorded during the evaluation.
    pub values: Diagnostics,
}

/// Counters from one graph build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BuildStatistics {
    /// Hits classified.
    pub hits: usize,
    /// Sectors holding at least one hit.
    pub occupied_sectors: usize,
    /// Segments created.
    pub segments: usize,
    /// Parent/child pairs sharing a middle hit.
    pub pairs_evaluated: usize,
    /// Pairs accepted by every criterion.
    pub edges: usize,
}

/// Result of a graph build.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    /// The segment graph.
    pub graph: SegmentGraph,
    /// Sector of every hit, indexed like the input slice.
    pub hit_sectors: Vec<Sector>,
    /// Criterion evaluations, empty unless diagnostics were requested.
    pub diagnostics: Vec<DiagnosticRecord>,
    /// Build counters.
    pub statistics: BuildStatistics,
}

/// Builds segment graphs from hits.
pub struct GraphBuilder<'a, S, C> {
    sectors: &'a S,
    connector: &'a C,
    criteria: &'a [Box<dyn Criterion>],
    max_skipped_layers: u32,
    collect_diagnostics: bool,
    parallel: bool,
}

impl<'a, S: SectorSystem, C: SectorConnector> GraphBuilder<'a, S, C> {
    /// Creates a builder over the given address system, connector and criteria.
    pub fn new(sectors: &'a S, connector: &'a C, criteria: &'a [Box<dyn Criterion>]) -> Self {
        Self {
            sectors,
            connector,
            criteria,
            max_skipped_layers: 0,
            collect_diagnostics: false,
            parallel: true,
        }
    }

    /// Keeps segments that jump over at most `layers` layers.
    #[must_use]
    pub fn with_max_skipped_layers(mut self, layers: u32) -> Self {
        self.max_skipped_layers = layers;
        self
    }

    /// Records every criterion evaluation.
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.collect_diagnostics = enabled;
        self
    }

    /// Sets whether to use parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Classifies every hit into its sector.
    ///
    /// # Errors
    /// Returns [`catrack_core::Error::CoordinateOutOfRange`] for the first hit
    /// whose coordinate lies outside the geometry.
    pub fn classify<H>(&self, hits: &[H]) -> Result<Vec<Sector>>
    where
        H: Hit<Coord = S::Coord>,
    {
        if self.parallel {
            hits.par_iter()
                .map(|hit| self.sectors.encode(hit.coord()))
                .collect()
        } else {
            hits.iter()
                .map(|hit| self.sectors.encode(hit.coord()))
                .collect()
        }
    }

    /// Builds the graph for one event.
    ///
    /// # Errors
    /// Propagates sector range errors from classification and the connector,
    /// and [`catrack_core::Error::BadSegmentLength`] from the criteria.
    pub fn build<H>(&self, hits: &[H]) -> Result<BuiltGraph>
    where
        H: Hit<Coord = S::Coord>,
    {
        let hit_sectors = self.classify(hits)?;
        let positions: Vec<Position> = hits.iter().map(Hit::position).collect();

        let mut by_sector: BTreeMap<Sector, Vec<usize>> = BTreeMap::new();
        for (hit, &sector) in hit_sectors.iter().enumerate() {
            by_sector.entry(sector).or_default().push(hit);
        }

        let mut graph = SegmentGraph::new(self.max_skipped_layers as usize + 1);
        for (&sector, outer_hits) in &by_sector {
            let outer_layer = self.sectors.layer(sector)?;
            for target in self.connector.target_sectors(sector)? {
                let Some(inner_hits) = by_sector.get(&target) else {
                    continue;
                };
                let inner_layer = self.sectors.layer(target)?;
                let skipped = outer_layer.saturating_sub(inner_layer + 1);
                if skipped > self.max_skipped_layers {
                    continue;
                }
                for &outer in outer_hits {
                    for &inner in inner_hits {
                        graph.add_segment((outer, sector), (inner, target), skipped);
                    }
                }
            }
        }

        let mut by_outer_hit: Vec<Vec<SegmentId>> = vec![Vec::new(); hits.len()];
        for (id, segment) in graph.iter() {
            by_outer_hit[segment.outer_hit()].push(id);
        }

        let graph_ref = &graph;
        let evaluate = |parent: SegmentId| -> Result<ParentEdges> {
            self.evaluate_parent(graph_ref, &positions, &by_outer_hit, parent)
        };
        let ids: Vec<SegmentId> = graph.iter().map(|(id, _)| id).collect();
        let evaluated: Vec<ParentEdges> = if self.parallel {
            ids.par_iter().map(|&id| evaluate(id)).collect::<Result<_>>()?
        } else {
            ids.iter().map(|&id| evaluate(id)).collect::<Result<_>>()?
        };

        let mut statistics = BuildStatistics {
            hits: hits.len(),
            occupied_sectors: by_sector.len(),
            segments: graph.len(),
            ..BuildStatistics::default()
        };
        let mut diagnostics = Vec::new();
        for (parent, result) in ids.iter().zip(evaluated) {
            statistics.pairs_evaluated += result.pairs;
            for child in result.accepted {
                graph.add_edge(*parent, child)?;
            }
            diagnostics.extend(result.records);
        }
        statistics.edges = graph.num_edges();

        log::debug!(
            "built graph: {} hits in {} sectors, {} segments, {}/{} pairs linked",
            statistics.hits,
            statistics.occupied_sectors,
            statistics.segments,
            statistics.edges,
            statistics.pairs_evaluated
        );

        Ok(BuiltGraph {
            graph,
            hit_sectors,
            diagnostics,
            statistics,
        })
    }

    fn evaluate_parent(
        &self,
        graph: &SegmentGraph,
        positions: &[Position],
        by_outer_hit: &[Vec<SegmentId>],
        parent: SegmentId,
    ) -> Result<ParentEdges> {
        let parent_segment = graph.get(parent)?;
        let parent_positions: Vec<Position> =
            parent_segment.hits().iter().map(|&h| positions[h]).collect();
        let candidates = &by_outer_hit[parent_segment.inner_hit()];

        let mut edges = ParentEdges {
            pairs: candidates.len(),
            ..ParentEdges::default()
        };
        for &child in candidates {
            let child_positions: Vec<Position> =
                graph.get(child)?.hits().iter().map(|&h| positions[h]).collect();
            if self.accepts(parent, child, &parent_positions, &child_positions, &mut edges.records)? {
                edges.accepted.push(child);
            }
        }
        Ok(edges)
    }

    fn accepts(
        &self,
        parent: SegmentId,
        child: SegmentId,
        parent_positions: &[Position],
        child_positions: &[Position],
        records: &mut Vec<DiagnosticRecord>,
    ) -> Result<bool> {
        for criterion in self.criteria {
            let accepted = if self.collect_diagnostics {
                let mut values = Diagnostics::new();
                let accepted =
                    criterion.is_compatible(parent_positions, child_positions, Some(&mut values))?;
                records.push(DiagnosticRecord {
                    parent,
                    child,
                    criterion: criterion.name(),
                    accepted,
                    values,
                });
                accepted
            } else {
                criterion.is_compatible(parent_positions, child_positions, None)?
            };
            if !accepted {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct ParentEdges {
    pairs: usize,
    accepted: Vec<SegmentId>,
    records: Vec<DiagnosticRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorConfig, PlanarConnector};
    use crate::criteria::{CriteriaConfig, RequiredHits};
    use catrack_core::{Error, PlanarCoord, PlanarHit, PlanarSectors};

    fn straight_hits(layers: u32) -> Vec<PlanarHit> {
        (0..layers)
            .map(|layer| {
                let r = 2.0 * f64::from(layer + 1);
                PlanarHit::new(Position::new(r, 0.0, 0.5 * r), PlanarCoord::new(0, layer, 0, 0))
            })
            .collect()
    }

    #[test]
    fn test_build_straight_track_without_shortcuts() {
        let sectors = PlanarSectors::new(5, 1, 1).unwrap();
        let connector =
            PlanarConnector::with_config(sectors, ConnectorConfig::new().without_shortcuts());
        let criteria = CriteriaConfig::default().build();
        let hits = straight_hits(5);

        let built = GraphBuilder::new(&sectors, &connector, &criteria)
            .build(&hits)
            .unwrap();

        assert_eq!(built.statistics.segments, 4);
        assert_eq!(built.statistics.edges, 3);
        assert_eq!(built.graph.roots().count(), 1);
        assert!(built.graph.edges_consistent());
        assert!(built.diagnostics.is_empty());
    }

    #[test]
    fn test_skip_depth_limits_segments() {
        let sectors = PlanarSectors::new(5, 1, 1).unwrap();
        let connector = PlanarConnector::new(sectors);
        let criteria = Vec::new();
        let hits = straight_hits(5);

        let no_skip = GraphBuilder::new(&sectors, &connector, &criteria)
            .build(&hits)
            .unwrap();
        assert_eq!(no_skip.statistics.segments, 4);

        let with_skip = GraphBuilder::new(&sectors, &connector, &criteria)
            .with_max_skipped_layers(3)
            .build(&hits)
            .unwrap();
        // layers 2, 3 and 4 add one shortcut each to layer 0
        assert_eq!(with_skip.statistics.segments, 7);
        assert_eq!(with_skip.graph.state_len(), 4);
        let skips: Vec<u32> = with_skip
            .graph
            .iter()
            .map(|(_, s)| s.skipped_layers())
            .filter(|&s| s > 0)
            .collect();
        assert_eq!(skips.len(), 3);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let sectors = PlanarSectors::new(5, 1, 1).unwrap();
        let connector = PlanarConnector::new(sectors);
        let criteria = CriteriaConfig::default().build();
        let mut hits = straight_hits(5);
        hits.extend(straight_hits(5).into_iter().map(|mut h| {
            h.position.y = 0.3 * h.position.x;
            h
        }));

        let build = |parallel| {
            GraphBuilder::new(&sectors, &connector, &criteria)
                .with_max_skipped_layers(3)
                .with_parallel(parallel)
                .build(&hits)
                .unwrap()
        };
        let a = build(true);
        let b = build(false);
        assert_eq!(a.statistics, b.statistics);
        let edges = |g: &SegmentGraph| {
            g.iter()
                .map(|(id, s)| (id, s.children().clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(edges(&a.graph), edges(&b.graph));
    }

    #[test]
    fn test_diagnostics_collected() {
        let sectors = PlanarSectors::new(3, 1, 1).unwrap();
        let connector = PlanarConnector::new(sectors);
        let criteria = CriteriaConfig::default().build();
        let hits = straight_hits(3);

        let built = GraphBuilder::new(&sectors, &connector, &criteria)
            .with_diagnostics(true)
            .build(&hits)
            .unwrap();

        assert_eq!(built.statistics.pairs_evaluated, 1);
        assert_eq!(built.diagnostics.len(), criteria.len());
        assert!(built.diagnostics.iter().all(|r| r.accepted));
        assert_eq!(built.diagnostics[0].criterion, "RzRatioChange");
        assert_eq!(built.diagnostics[2].values.get("pt"), Some(0.0));
    }

    #[test]
    fn test_out_of_range_hit_aborts() {
        let sectors = PlanarSectors::new(3, 1, 1).unwrap();
        let connector = PlanarConnector::new(sectors);
        let criteria = Vec::new();
        let mut hits = straight_hits(3);
        hits.push(PlanarHit::new(
            Position::new(1.0, 1.0, 1.0),
            PlanarCoord::new(0, 3, 0, 0),
        ));

        let err = GraphBuilder::new(&sectors, &connector, &criteria)
            .build(&hits)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CoordinateOutOfRange { field: "layer", .. }
        ));
    }

    struct Triplet;

    impl Criterion for Triplet {
        fn name(&self) -> &'static str {
            "Triplet"
        }

        fn required_hits(&self) -> RequiredHits {
            RequiredHits {
                parent: 3,
                child: 2,
            }
        }

        fn is_compatible(
            &self,
            parent: &[Position],
            child: &[Position],
            _diagnostics: Option<&mut Diagnostics>,
        ) -> Result<bool> {
            self.required_hits()
                .check(self.name(), parent.len(), child.len())?;
            Ok(true)
        }
    }

    #[test]
    fn test_bad_segment_length_propagates() {
        let sectors = PlanarSectors::new(3, 1, 1).unwrap();
        let connector = PlanarConnector::new(sectors);
        let criteria: Vec<Box<dyn Criterion>> = vec![Box::new(Triplet)];
        let hits = straight_hits(3);

        let err = GraphBuilder::new(&sectors, &connector, &criteria)
            .build(&hits)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BadSegmentLength {
                criterion: "Triplet",
                ..
            }
        ));
    }
}
