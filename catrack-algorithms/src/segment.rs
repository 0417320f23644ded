//! Segment graph storage.
//!
//! Segments live in an arena and refer to each other by [`SegmentId`].
//! Edges are stored on both ends (`children` on the parent, `parents` on the
//! child) and every mutation goes through [`SegmentGraph`], which keeps the
//! two sides in lock-step. Removed segments are tombstoned so ids stay
//! stable for the whole pass.

use catrack_core::{Error, Result, Sector};
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable index of a segment in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentId(pub usize);

impl SegmentId {
    /// Returns the arena index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the segment graph.
#[derive(Debug, Clone)]
pub struct Segment {
    hits: Vec<usize>,
    outer_sector: Sector,
    inner_sector: Sector,
    skipped_layers: u32,
    children: BTreeSet<SegmentId>,
    parents: BTreeSet<SegmentId>,
    state: Vec<u32>,
    active: bool,
}

impl Segment {
    /// Hit indices, ordered from the outer to the inner hit.
    #[must_use]
    pub fn hits(&self) -> &[usize] {
        &self.hits
    }

    /// Outermost hit.
    #[must_use]
    pub fn outer_hit(&self) -> usize {
        self.hits[0]
    }

    /// Innermost hit.
    #[must_use]
    pub fn inner_hit(&self) -> usize {
        self.hits[self.hits.len() - 1]
    }

    /// Sector of the outermost hit.
    #[must_use]
    pub fn outer_sector(&self) -> Sector {
        self.outer_sector
    }

    /// Sector of the innermost hit.
    #[must_use]
    pub fn inner_sector(&self) -> Sector {
        self.inner_sector
    }

    /// Number of detector layers jumped over between the two hits.
    #[must_use]
    pub fn skipped_layers(&self) -> u32 {
        self.skipped_layers
    }

    /// Segments that continue this one inward.
    #[must_use]
    pub fn children(&self) -> &BTreeSet<SegmentId> {
        &self.children
    }

    /// Segments this one continues.
    #[must_use]
    pub fn parents(&self) -> &BTreeSet<SegmentId> {
        &self.parents
    }

    /// Automaton state vector, one slot per skip depth.
    #[must_use]
    pub fn state(&self) -> &[u32] {
        &self.state
    }

    /// Returns false once the segment has been removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true if no segment leads into this one.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns true if no segment continues this one.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Zeroes the state vector without touching edges.
    pub fn reset_state(&mut self) {
        self.state.fill(0);
    }
}

/// Arena owning every segment of one pattern-recognition pass.
#[derive(Debug, Clone)]
pub struct SegmentGraph {
    segments: Vec<Segment>,
    state_len: usize,
    num_edges: usize,
}

impl Default for SegmentGraph {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SegmentGraph {
    /// Creates an empty graph whose segments carry `state_len` state slots.
    #[must_use]
    pub fn new(state_len: usize) -> Self {
        Self {
            segments: Vec::new(),
            state_len: state_len.max(1),
            num_edges: 0,
        }
    }

    /// Creates an empty graph with room for `capacity` segments.
    #[must_use]
    pub fn with_capacity(state_len: usize, capacity: usize) -> Self {
        let mut graph = Self::new(state_len);
        graph.segments.reserve(capacity);
        graph
    }

    /// Number of state slots per segment.
    #[must_use]
    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// Number of segments ever added, including removed ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if no segment was ever added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of live parent/child edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Adds a single-hit root segment.
    pub fn add_root(&mut self, hit: usize, sector: Sector) -> SegmentId {
        self.push(vec![hit], sector, sector, 0)
    }

    /// Adds a two-hit segment from `outer` to `inner`.
    pub fn add_segment(
        &mut self,
        outer: (usize, Sector),
        inner: (usize, Sector),
        skipped_layers: u32,
    ) -> SegmentId {
        self.push(vec![outer.0, inner.0], outer.1, inner.1, skipped_layers)
    }

    fn push(
        &mut self,
        hits: Vec<usize>,
        outer_sector: Sector,
        inner_sector: Sector,
        skipped_layers: u32,
    ) -> SegmentId {
        let id = SegmentId(self.segments.len());
        self.segments.push(Segment {
            hits,
            outer_sector,
            inner_sector,
            skipped_layers,
            children: BTreeSet::new(),
            parents: BTreeSet::new(),
            state: vec![0; self.state_len],
            active: true,
        });
        id
    }

    /// Returns a live segment.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegment`] if `id` is unknown or removed.
    pub fn get(&self, id: SegmentId) -> Result<&Segment> {
        self.segments
            .get(id.0)
            .filter(|s| s.active)
            .ok_or(Error::InvalidSegment(id.0))
    }

    fn get_mut(&mut self, id: SegmentId) -> Result<&mut Segment> {
        self.segments
            .get_mut(id.0)
            .filter(|s| s.active)
            .ok_or(Error::InvalidSegment(id.0))
    }

    /// Iterates over live segments in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(i, s)| (SegmentId(i), s))
    }

    /// Live segments without parents, in id order.
    pub fn roots(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.iter().filter(|(_, s)| s.is_root()).map(|(id, _)| id)
    }

    /// Links `parent -> child`. Returns false if the edge already existed.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegment`] if either id is unknown or removed,
    /// or if `parent == child`.
    pub fn add_edge(&mut self, parent: SegmentId, child: SegmentId) -> Result<bool> {
        if parent == child {
            return Err(Error::InvalidSegment(parent.0));
        }
        self.get(child)?;
        let inserted = self.get_mut(parent)?.children.insert(child);
        if inserted {
            self.get_mut(child)?.parents.insert(parent);
            self.num_edges += 1;
        }
        Ok(inserted)
    }

    /// Unlinks `parent -> child`. Returns false if there was no such edge.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegment`] if either id is unknown or removed.
    pub fn remove_edge(&mut self, parent: SegmentId, child: SegmentId) -> Result<bool> {
        self.get(child)?;
        let removed = self.get_mut(parent)?.children.remove(&child);
        if removed {
            self.get_mut(child)?.parents.remove(&parent);
            self.num_edges -= 1;
        }
        Ok(removed)
    }

    /// Removes a segment and every edge touching it.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegment`] if `id` is unknown or already removed.
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<()> {
        let segment = self.get_mut(id)?;
        let children = std::mem::take(&mut segment.children);
        let parents = std::mem::take(&mut segment.parents);
        segment.active = false;

        for child in &children {
            self.segments[child.0].parents.remove(&id);
        }
        for parent in &parents {
            self.segments[parent.0].children.remove(&id);
        }
        self.num_edges -= children.len() + parents.len();
        Ok(())
    }

    /// Zeroes the state of one segment.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegment`] if `id` is unknown or removed.
    pub fn reset_state(&mut self, id: SegmentId) -> Result<()> {
        self.get_mut(id)?.reset_state();
        Ok(())
    }

    /// Zeroes the state of every segment.
    pub fn reset_states(&mut self) {
        for segment in &mut self.segments {
            segment.reset_state();
        }
    }

    /// Reads one state slot of every segment (0 for removed segments).
    #[must_use]
    pub fn state_slot(&self, slot: usize) -> Vec<u32> {
        self.segments
            .iter()
            .map(|s| if s.active { s.state[slot] } else { 0 })
            .collect()
    }

    /// Writes one state slot of every segment from `values`.
    pub(crate) fn commit_state_slot(&mut self, slot: usize, values: &[u32]) {
        for (segment, &value) in self.segments.iter_mut().zip(values) {
            segment.state[slot] = value;
        }
    }

    /// Checks that every edge is recorded on both of its ends.
    #[must_use]
    pub fn edges_consistent(&self) -> bool {
        let mut count = 0;
        for (id, segment) in self.iter() {
            for child in &segment.children {
                match self.get(*child) {
                    Ok(c) if c.parents.contains(&id) => count += 1,
                    _ => return false,
                }
            }
            for parent in &segment.parents {
                match self.get(*parent) {
                    Ok(p) if p.children.contains(&id) => {}
                    _ => return false,
                }
            }
        }
        count == self.num_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> (SegmentGraph, Vec<SegmentId>) {
        let mut graph = SegmentGraph::new(2);
        let ids: Vec<SegmentId> = (0..n)
            .map(|i| {
                graph.add_segment(
                    (n - i, Sector::new(u32::try_from(n - i).unwrap())),
                    (n - i - 1, Sector::new(u32::try_from(n - i - 1).unwrap())),
                    0,
                )
            })
            .collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn test_add_segment() {
        let mut graph = SegmentGraph::new(3);
        let id = graph.add_segment((7, Sector::new(12)), (3, Sector::new(4)), 1);
        let segment = graph.get(id).unwrap();
        assert_eq!(segment.hits(), &[7, 3]);
        assert_eq!(segment.outer_hit(), 7);
        assert_eq!(segment.inner_hit(), 3);
        assert_eq!(segment.outer_sector(), Sector::new(12));
        assert_eq!(segment.inner_sector(), Sector::new(4));
        assert_eq!(segment.skipped_layers(), 1);
        assert_eq!(segment.state(), &[0, 0, 0]);
        assert!(segment.is_root() && segment.is_leaf());
    }

    #[test]
    fn test_add_root() {
        let mut graph = SegmentGraph::default();
        let root = graph.add_root(5, Sector::new(9));
        let next = graph.add_segment((5, Sector::new(9)), (2, Sector::new(3)), 0);
        graph.add_edge(root, next).unwrap();
        assert_eq!(graph.get(root).unwrap().hits(), &[5]);
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![root]);
    }

    #[test]
    fn test_edge_symmetry() {
        let (mut graph, ids) = chain(4);
        assert_eq!(graph.num_edges(), 3);
        assert!(graph.edges_consistent());
        assert!(graph.get(ids[1]).unwrap().children().contains(&ids[2]));
        assert!(graph.get(ids[2]).unwrap().parents().contains(&ids[1]));

        assert!(!graph.add_edge(ids[0], ids[1]).unwrap());
        assert_eq!(graph.num_edges(), 3);

        assert!(graph.remove_edge(ids[1], ids[2]).unwrap());
        assert!(!graph.get(ids[1]).unwrap().children().contains(&ids[2]));
        assert!(!graph.get(ids[2]).unwrap().parents().contains(&ids[1]));
        assert!(graph.edges_consistent());
        assert!(!graph.remove_edge(ids[1], ids[2]).unwrap());
    }

    #[test]
    fn test_remove_segment() {
        let (mut graph, ids) = chain(3);
        graph.remove_segment(ids[1]).unwrap();

        assert!(graph.get(ids[1]).is_err());
        assert!(graph.get(ids[0]).unwrap().is_leaf());
        assert!(graph.get(ids[2]).unwrap().is_root());
        assert_eq!(graph.num_edges(), 0);
        assert!(graph.edges_consistent());
        assert_eq!(graph.iter().count(), 2);
        assert_eq!(graph.len(), 3);

        assert!(matches!(
            graph.remove_segment(ids[1]),
            Err(Error::InvalidSegment(1))
        ));
        assert!(graph.add_edge(ids[0], ids[1]).is_err());
    }

    #[test]
    fn test_self_edge_rejected() {
        let (mut graph, ids) = chain(2);
        assert!(graph.add_edge(ids[0], ids[0]).is_err());
        assert!(graph.edges_consistent());
    }

    #[test]
    fn test_reset_state_keeps_edges() {
        let (mut graph, ids) = chain(3);
        graph.commit_state_slot(1, &[3, 2, 1]);
        assert_eq!(graph.state_slot(1), vec![3, 2, 1]);

        graph.reset_state(ids[0]).unwrap();
        assert_eq!(graph.state_slot(1), vec![0, 2, 1]);

        graph.reset_states();
        assert_eq!(graph.state_slot(1), vec![0, 0, 0]);
        assert_eq!(graph.num_edges(), 2);
        assert!(graph.edges_consistent());
    }
}
