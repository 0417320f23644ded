//! Cellular automaton over the segment graph.
//!
//! Propagation runs in synchronous rounds. In round `k` every segment takes
//! `1 + max(child state)` from round `k - 1`, or 1 without children. The
//! previous round lives in its own buffer, so no segment can observe a value
//! written in the current round. Once nothing changes, the state of a segment
//! is the number of segments in the longest chain starting at it.
//!
//! Pass `d` writes state slot `d` and only considers segments that skip at
//! most `d` layers.

use crate::segment::{Segment, SegmentGraph, SegmentId};
use catrack_core::{Error, Result, TrackCandidate};
use rayon::prelude::*;
use std::cmp::Reverse;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Automaton configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AutomatonConfig {
    /// Upper bound on propagation rounds.
    pub max_rounds: usize,
    /// Largest number of layers a segment may jump over.
    pub max_skipped_layers: u32,
    /// Minimum number of hits for an extracted candidate.
    pub min_track_hits: usize,
    /// Whether to compute rounds in parallel.
    pub parallel: bool,
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            max_rounds: 100,
            max_skipped_layers: 1,
            min_track_hits: 3,
            parallel: true,
        }
    }
}

impl AutomatonConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Sets the largest skip depth.
    #[must_use]
    pub fn with_max_skipped_layers(mut self, layers: u32) -> Self {
        self.max_skipped_layers = layers;
        self
    }

    /// Sets the minimum candidate length.
    #[must_use]
    pub fn with_min_track_hits(mut self, hits: usize) -> Self {
        self.min_track_hits = hits;
        self
    }

    /// Sets whether to use parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PropagationReport {
    /// State slot written.
    pub depth: usize,
    /// Rounds run, including the final unchanged round.
    pub rounds: usize,
    /// False if the round cap stopped propagation.
    pub converged: bool,
    /// Largest state reached.
    pub max_state: u32,
}

/// Synchronous state propagation and chain extraction.
#[derive(Debug, Clone, Default)]
pub struct CellularAutomaton {
    config: AutomatonConfig,
}

impl CellularAutomaton {
    /// Creates an automaton.
    #[must_use]
    pub fn new(config: AutomatonConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AutomatonConfig {
        &self.config
    }

    fn check_depth(graph: &SegmentGraph, depth: usize) -> Result<()> {
        if depth >= graph.state_len() {
            return Err(Error::ConfigError(format!(
                "skip depth {depth} needs {} state slots, graph has {}",
                depth + 1,
                graph.state_len()
            )));
        }
        Ok(())
    }

    fn eligible(graph: &SegmentGraph, depth: usize) -> Vec<bool> {
        let mut eligible = vec![false; graph.len()];
        for (id, segment) in graph.iter() {
            eligible[id.index()] = segment.skipped_layers() as usize <= depth;
        }
        eligible
    }

    /// Runs propagation for skip depth `depth`, overwriting that state slot.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the graph has no slot for `depth`.
    pub fn propagate(&self, graph: &mut SegmentGraph, depth: usize) -> Result<PropagationReport> {
        Self::check_depth(graph, depth)?;
        let eligible = Self::eligible(graph, depth);
        let segments: Vec<Option<&Segment>> = (0..graph.len())
            .map(|i| graph.get(SegmentId(i)).ok())
            .collect();

        let step = |i: usize, current: &[u32]| -> u32 {
            match segments[i] {
                Some(segment) if eligible[i] => {
                    1 + segment
                        .children()
                        .iter()
                        .filter(|c| eligible[c.index()])
                        .map(|c| current[c.index()])
                        .max()
                        .unwrap_or(0)
                }
                _ => 0,
            }
        };

        let mut current = vec![0u32; graph.len()];
        let mut next = vec![0u32; graph.len()];
        let mut report = PropagationReport {
            depth,
            ..PropagationReport::default()
        };

        while report.rounds < self.config.max_rounds {
            report.rounds += 1;
            if self.config.parallel {
                next.par_iter_mut()
                    .enumerate()
                    .for_each(|(i, value)| *value = step(i, &current));
            } else {
                for (i, value) in next.iter_mut().enumerate() {
                    *value = step(i, &current);
                }
            }
            let changed = next != current;
            std::mem::swap(&mut current, &mut next);
            if !changed {
                report.converged = true;
                break;
            }
        }

        report.max_state = current.iter().copied().max().unwrap_or(0);
        if report.converged {
            log::debug!(
                "propagation depth {depth} converged after {} rounds, max state {}",
                report.rounds,
                report.max_state
            );
        } else {
            log::warn!(
                "propagation depth {depth} stopped at round cap {} without converging",
                self.config.max_rounds
            );
        }

        graph.commit_state_slot(depth, &current);
        Ok(report)
    }

    /// Extracts one candidate per root from state slot `depth`.
    ///
    /// From each root the walk follows the child with the highest state.
    /// Ties go to the child whose inner hit has the lowest sector id, then to
    /// the lowest segment id. Candidates shorter than `min_track_hits` are
    /// dropped.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the graph has no slot for `depth`.
    pub fn extract(&self, graph: &SegmentGraph, depth: usize) -> Result<Vec<TrackCandidate>> {
        Self::check_depth(graph, depth)?;
        let eligible = Self::eligible(graph, depth);
        let state = graph.state_slot(depth);

        let best_child = |segment: &Segment| -> Option<SegmentId> {
            segment
                .children()
                .iter()
                .copied()
                .filter(|c| eligible[c.index()])
                .max_by_key(|&c| {
                    let inner = graph.get(c).map(Segment::inner_sector).unwrap_or_default();
                    (state[c.index()], Reverse(inner), Reverse(c))
                })
        };

        let mut candidates = Vec::new();
        for (root_id, root) in graph.iter() {
            if !eligible[root_id.index()]
                || root.parents().iter().any(|p| eligible[p.index()])
            {
                continue;
            }

            let mut hits = root.hits().to_vec();
            let mut current = root;
            while let Some(child) = best_child(current) {
                current = graph.get(child)?;
                hits.extend_from_slice(&current.hits()[1..]);
            }

            if hits.len() >= self.config.min_track_hits {
                candidates.push(TrackCandidate::new(hits, state[root_id.index()]));
            }
        }
        Ok(candidates)
    }

    /// Propagates and extracts for one skip depth.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the graph has no slot for `depth`.
    pub fn run(
        &self,
        graph: &mut SegmentGraph,
        depth: usize,
    ) -> Result<(PropagationReport, Vec<TrackCandidate>)> {
        let report = self.propagate(graph, depth)?;
        let candidates = self.extract(graph, depth)?;
        Ok((report, candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catrack_core::Sector;

    /// Segment from hit `outer` in sector `outer` to hit `inner` in sector `inner`.
    fn seg(graph: &mut SegmentGraph, outer: usize, inner: usize, skipped: u32) -> SegmentId {
        let sector = |h: usize| Sector::new(u32::try_from(h).unwrap());
        graph.add_segment((outer, sector(outer)), (inner, sector(inner)), skipped)
    }

    #[test]
    fn test_chain_states() {
        let mut graph = SegmentGraph::new(1);
        let a = seg(&mut graph, 4, 3, 0);
        let b = seg(&mut graph, 3, 2, 0);
        let c = seg(&mut graph, 2, 1, 0);
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let automaton = CellularAutomaton::default();
        let report = automaton.propagate(&mut graph, 0).unwrap();

        assert!(report.converged);
        assert_eq!(report.rounds, 4);
        assert_eq!(report.max_state, 3);
        assert_eq!(graph.state_slot(0), vec![3, 2, 1]);
    }

    #[test]
    fn test_longest_branch_wins() {
        // a -> b -> c and a -> d: the walk must take b
        let mut graph = SegmentGraph::new(1);
        let a = seg(&mut graph, 9, 8, 0);
        let d = seg(&mut graph, 8, 1, 0);
        let b = seg(&mut graph, 8, 7, 0);
        let c = seg(&mut graph, 7, 6, 0);
        graph.add_edge(a, d).unwrap();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let automaton = CellularAutomaton::default();
        let (_, candidates) = automaton.run(&mut graph, 0).unwrap();
        assert_eq!(candidates, vec![TrackCandidate::new(vec![9, 8, 7, 6], 3)]);
    }

    #[test]
    fn test_tie_break_lowest_inner_sector() {
        let mut graph = SegmentGraph::new(1);
        let a = seg(&mut graph, 9, 8, 0);
        let high = seg(&mut graph, 8, 5, 0);
        let low = seg(&mut graph, 8, 3, 0);
        graph.add_edge(a, high).unwrap();
        graph.add_edge(a, low).unwrap();

        let automaton = CellularAutomaton::default();
        let (_, candidates) = automaton.run(&mut graph, 0).unwrap();
        assert_eq!(candidates[0].hits, vec![9, 8, 3]);
    }

    #[test]
    fn test_skip_depth_filters_segments() {
        let mut graph = SegmentGraph::new(2);
        let a = seg(&mut graph, 4, 3, 0);
        let b = seg(&mut graph, 3, 2, 0);
        let shortcut = seg(&mut graph, 3, 0, 2);
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, shortcut).unwrap();

        let automaton = CellularAutomaton::new(AutomatonConfig::new().with_max_skipped_layers(1));
        automaton.propagate(&mut graph, 0).unwrap();
        automaton.propagate(&mut graph, 1).unwrap();
        assert_eq!(graph.state_slot(0), vec![2, 1, 0]);
        assert_eq!(graph.state_slot(1), vec![2, 1, 0]);

        assert!(matches!(
            automaton.propagate(&mut graph, 2),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_round_cap() {
        let mut graph = SegmentGraph::new(1);
        let ids: Vec<SegmentId> = (0..6).map(|i| seg(&mut graph, 10 - i, 9 - i, 0)).collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }

        let automaton = CellularAutomaton::new(AutomatonConfig::new().with_max_rounds(3));
        let report = automaton.propagate(&mut graph, 0).unwrap();
        assert!(!report.converged);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.max_state, 3);
    }

    #[test]
    fn test_min_track_hits() {
        let mut graph = SegmentGraph::new(1);
        seg(&mut graph, 5, 4, 0);
        let automaton = CellularAutomaton::default();
        let (_, candidates) = automaton.run(&mut graph, 0).unwrap();
        assert!(candidates.is_empty());

        let automaton = CellularAutomaton::new(AutomatonConfig::new().with_min_track_hits(2));
        let (_, candidates) = automaton.run(&mut graph, 0).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_removed_segments_ignored() {
        let mut graph = SegmentGraph::new(1);
        let a = seg(&mut graph, 4, 3, 0);
        let b = seg(&mut graph, 3, 2, 0);
        let c = seg(&mut graph, 2, 1, 0);
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.remove_segment(c).unwrap();

        let automaton = CellularAutomaton::default();
        let (report, candidates) = automaton.run(&mut graph, 0).unwrap();
        assert_eq!(report.max_state, 2);
        assert_eq!(candidates[0].hits, vec![4, 3, 2]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let build = || {
            let mut graph = SegmentGraph::new(1);
            let mut previous: Vec<SegmentId> = Vec::new();
            for layer in (1..6).rev() {
                let current: Vec<SegmentId> = (0..3)
                    .map(|k| seg(&mut graph, layer * 10 + k, (layer - 1) * 10 + k, 0))
                    .collect();
                for &p in &previous {
                    for &c in &current {
                        let _ = graph.add_edge(p, c);
                    }
                }
                previous = current;
            }
            graph
        };

        let mut parallel = build();
        let mut sequential = build();
        let a = CellularAutomaton::default().run(&mut parallel, 0).unwrap();
        let b = CellularAutomaton::new(AutomatonConfig::new().with_parallel(false))
            .run(&mut sequential, 0)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(parallel.state_slot(0), sequential.state_slot(0));
    }
}
