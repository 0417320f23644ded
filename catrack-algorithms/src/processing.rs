//! High-level track finding: graph build, propagation, extraction and
//! overlap resolution for one event.

use crate::automaton::{AutomatonConfig, CellularAutomaton, PropagationReport};
use crate::builder::{BuildStatistics, DiagnosticRecord, GraphBuilder};
use crate::connector::{AngularConnector, ConnectorConfig, PlanarConnector, SectorConnector};
use crate::criteria::{CriteriaConfig, Criterion, RequiredHits};
use crate::overlap::ConflictMatrix;
use crate::segment::SegmentGraph;
use catrack_core::{
    AngularSectors, Error, GeometryConfig, Hit, PlanarSectors, Result, Sector, SectorSystem,
    TrackCandidate,
};
use rayon::prelude::*;
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything needed to set up a [`TrackFinder`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FinderConfig {
    /// Detector geometry.
    pub geometry: GeometryConfig,
    /// Sector adjacency.
    pub connector: ConnectorConfig,
    /// Criterion parameters.
    pub criteria: CriteriaConfig,
    /// Automaton limits.
    pub automaton: AutomatonConfig,
    /// Record every criterion evaluation.
    pub diagnostics: bool,
}

impl FinderConfig {
    /// Builds a finder for a planar geometry.
    ///
    /// # Errors
    /// Returns a configuration or geometry error if the geometry is not planar
    /// or invalid.
    pub fn planar_finder(&self) -> Result<TrackFinder<PlanarSectors, PlanarConnector>> {
        let sectors = self.geometry.planar()?;
        let connector = PlanarConnector::with_config(sectors, self.connector.clone());
        Ok(TrackFinder::new(sectors, connector, self.criteria.build(), self.automaton.clone())?
            .with_diagnostics(self.diagnostics))
    }

    /// Builds a finder for an angular geometry.
    ///
    /// # Errors
    /// Returns a configuration or geometry error if the geometry is not
    /// angular or invalid.
    pub fn angular_finder(&self) -> Result<TrackFinder<AngularSectors, AngularConnector>> {
        let sectors = self.geometry.angular()?;
        let connector = AngularConnector::with_config(sectors, self.connector.clone());
        Ok(TrackFinder::new(sectors, connector, self.criteria.build(), self.automaton.clone())?
            .with_diagnostics(self.diagnostics))
    }
}

/// Output of one pattern-recognition pass.
#[derive(Debug, Clone)]
pub struct EventResult {
    /// Candidates in root order.
    pub candidates: Vec<TrackCandidate>,
    /// Hit-sharing conflicts between the candidates.
    pub conflicts: ConflictMatrix,
    /// One report per skip depth, shallowest first.
    pub reports: Vec<PropagationReport>,
    /// Graph build counters.
    pub statistics: BuildStatistics,
    /// Criterion evaluations, empty unless diagnostics are enabled.
    pub diagnostics: Vec<DiagnosticRecord>,
    /// Sector of every input hit.
    pub hit_sectors: Vec<Sector>,
    /// The propagated graph.
    pub graph: SegmentGraph,
}

/// Cellular-automaton track finder.
///
/// Owns its address system, connector and ordered criteria. Criteria are
/// evaluated in the order given.
pub struct TrackFinder<S, C> {
    sectors: S,
    connector: C,
    criteria: Vec<Box<dyn Criterion>>,
    automaton: CellularAutomaton,
    collect_diagnostics: bool,
}

impl<S: SectorSystem, C: SectorConnector> TrackFinder<S, C> {
    /// Creates a finder.
    ///
    /// # Errors
    /// Returns [`Error::BadSegmentLength`] if a criterion does not accept the
    /// two-hit segments the graph is built from.
    pub fn new(
        sectors: S,
        connector: C,
        criteria: Vec<Box<dyn Criterion>>,
        config: AutomatonConfig,
    ) -> Result<Self> {
        for criterion in &criteria {
            let required = criterion.required_hits();
            if required != RequiredHits::PAIR {
                return Err(Error::BadSegmentLength {
                    criterion: criterion.name(),
                    expected_parent: required.parent,
                    expected_child: required.child,
                    parent: RequiredHits::PAIR.parent,
                    child: RequiredHits::PAIR.child,
                });
            }
        }
        Ok(Self {
            sectors,
            connector,
            criteria,
            automaton: CellularAutomaton::new(config),
            collect_diagnostics: false,
        })
    }

    /// Enables recording of every criterion evaluation.
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.collect_diagnostics = enabled;
        self
    }

    /// Returns the address system.
    pub fn sectors(&self) -> &S {
        &self.sectors
    }

    /// Returns the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the criteria in evaluation order.
    pub fn criteria(&self) -> &[Box<dyn Criterion>] {
        &self.criteria
    }

    /// Returns the automaton configuration.
    pub fn config(&self) -> &AutomatonConfig {
        self.automaton.config()
    }

    /// Runs one pattern-recognition pass over an event's hits.
    ///
    /// Every skip depth up to `max_skipped_layers` is propagated into its own
    /// state slot. Candidates come from the deepest slot.
    ///
    /// # Errors
    /// Returns the first range or segment-length error; the pass is aborted.
    pub fn find<H>(&self, hits: &[H]) -> Result<EventResult>
    where
        H: Hit<Coord = S::Coord>,
    {
        let config = self.automaton.config();
        let built = GraphBuilder::new(&self.sectors, &self.connector, &self.criteria)
            .with_max_skipped_layers(config.max_skipped_layers)
            .with_diagnostics(self.collect_diagnostics)
            .with_parallel(config.parallel)
            .build(hits)?;

        let mut graph = built.graph;
        let deepest = graph.state_len() - 1;
        let reports = (0..=deepest)
            .map(|depth| self.automaton.propagate(&mut graph, depth))
            .collect::<Result<Vec<_>>>()?;
        let candidates = self.automaton.extract(&graph, deepest)?;
        let conflicts = ConflictMatrix::from_candidates(&candidates);

        log::debug!(
            "{} candidates, {} conflicting pairs",
            candidates.len(),
            conflicts.num_conflicting_pairs()
        );

        Ok(EventResult {
            candidates,
            conflicts,
            reports,
            statistics: built.statistics,
            diagnostics: built.diagnostics,
            hit_sectors: built.hit_sectors,
            graph,
        })
    }

    /// Runs [`Self::find`] over independent events in parallel.
    ///
    /// # Errors
    /// Returns the first error of any event.
    pub fn find_events<E, H>(&self, events: &[E]) -> Result<Vec<EventResult>>
    where
        E: Deref<Target = [H]> + Sync,
        H: Hit<Coord = S::Coord>,
    {
        events
            .par_iter()
            .map(|event| self.find(event))
            .collect()
    }
}
