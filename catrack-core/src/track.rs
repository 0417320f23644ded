//! Track candidate types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A chain of hits extracted from the segment graph.
///
/// Hits are referenced by their index in the event's hit slice, so two
/// candidates share a hit only when they hold the same index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackCandidate {
    /// Hit indices ordered from the outermost to the innermost hit.
    pub hits: Vec<usize>,
    /// Automaton state of the root segment (segments in the chain).
    pub state: u32,
}

impl TrackCandidate {
    /// Creates a candidate from ordered hit indices.
    #[must_use]
    pub fn new(hits: Vec<usize>, state: u32) -> Self {
        Self { hits, state }
    }

    /// Number of hits in the candidate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the candidate holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true if both candidates contain the same hit.
    #[must_use]
    pub fn shares_hit_with(&self, other: &Self) -> bool {
        self.hits.iter().any(|hit| other.hits.contains(hit))
    }

    /// Returns an iterator over the hit indices.
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.hits.iter()
    }
}

impl FromIterator<usize> for TrackCandidate {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let hits: Vec<usize> = iter.into_iter().collect();
        let state = u32::try_from(hits.len().saturating_sub(1)).unwrap_or(u32::MAX);
        Self { hits, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_operations() {
        let track = TrackCandidate::new(vec![4, 3, 2], 2);
        assert_eq!(track.len(), 3);
        assert!(!track.is_empty());
        assert_eq!(track.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
    }

    #[test]
    fn test_shares_hit() {
        let a: TrackCandidate = [1, 2, 3].into_iter().collect();
        let b: TrackCandidate = [3, 7, 8].into_iter().collect();
        let c: TrackCandidate = [9, 10].into_iter().collect();
        assert_eq!(a.state, 2);
        assert!(a.shares_hit_with(&b));
        assert!(b.shares_hit_with(&a));
        assert!(!a.shares_hit_with(&c));
    }
}
