//! Pairwise hit-sharing conflicts between track candidates.

use catrack_core::TrackCandidate;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Symmetric `n x n` relation: `conflict(i, j)` is true when candidates `i`
/// and `j` (with `i != j`) hold the same hit index. The diagonal is false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ConflictMatrix {
    n: usize,
    cells: Vec<bool>,
}

impl ConflictMatrix {
    /// Builds the relation for `candidates`.
    ///
    /// Quadratic in the number of candidates; each pair compares hit lists
    /// directly.
    #[must_use]
    pub fn from_candidates(candidates: &[TrackCandidate]) -> Self {
        let n = candidates.len();
        let mut cells = vec![false; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                if candidates[i].shares_hit_with(&candidates[j]) {
                    cells[i * n + j] = true;
                    cells[j * n + i] = true;
                }
            }
        }
        Self { n, cells }
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Returns true if built from no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns true if candidates `i` and `j` share a hit.
    ///
    /// # Panics
    /// Panics if `i` or `j` is out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> bool {
        assert!(i < self.n && j < self.n, "conflict index out of bounds");
        self.cells[i * self.n + j]
    }

    /// Indices of candidates conflicting with `i`, ascending.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    pub fn conflicts_of(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        assert!(i < self.n, "conflict index out of bounds");
        self.cells[i * self.n..(i + 1) * self.n]
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(j, _)| j)
    }

    /// Number of unordered conflicting pairs.
    #[must_use]
    pub fn num_conflicting_pairs(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count() / 2
    }

    /// Row-major copy of the relation.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.cells.chunks(self.n.max(1)).map(<[bool]>::to_vec).collect()
    }
}
