//! Nearest-neighbour index over chunk embeddings
//!
//! The index only knows row positions and vectors. Row `n` is the `n`-th
//! vector ever added, which is also the `n`-th chunk in the knowledge base.


use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use serde::Serialize;

use crate::{QaError, Result};

/// A vector embedding
pub type Embedding = Vec<f32>;

/// Position of a vector in the index and of its chunk in the chunk store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowId(pub usize);

impl RowId {
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: RowId,
    /// Squared euclidean distance to the query
    pub distance: f32,
}

/// Nearest-neighbour storage for fixed-dimension vectors.
///
/// The dimension is fixed by the first vectors added and never changes.
pub trait VectorIndex: Send + Sync {
    /// Append vectors, assigning them the next sequential rows.
    ///
    /// The batch is rejected as a whole if any vector has the wrong
    /// dimension; previously added rows are never modified.
    fn add(&mut self, vectors: &[Embedding]) -> Result<()>;

    /// Up to `k` closest rows, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    /// Dimension of the indexed vectors, once known
    fn dimension(&self) -> Option<usize>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact brute-force index using squared L2 distance.
///
/// Vectors live in one row-major buffer. Every query scans all rows, which is
/// fine for the few thousand chunks a single page or wiki space produces.
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl FlatL2Index {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index whose dimension is known up front, so the first
    /// mismatching embedding fails instead of defining the dimension.
    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    /// Stored vector for `row`
    #[inline]
    pub fn vector(&self, row: RowId) -> Option<&[f32]> {
        let dimension = self.dimension?;
        let start = row.get().checked_mul(dimension)?;
        self.data.get(start..start + dimension)
    }

    fn check_dimension(&self, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(QaError::DimensionMismatch { expected, actual })
        }
    }
}

impl VectorIndex for FlatL2Index {
    fn add(&mut self, vectors: &[Embedding]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let dimension = self.dimension.unwrap_or(first.len());
        if dimension == 0 {
            return Err(QaError::InvalidInput(
                "cannot index zero-dimensional vectors".to_string(),
            ));
        }
        for vector in vectors {
            self.check_dimension(dimension, vector.len())?;
        }

        self.dimension = Some(dimension);
        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(QaError::InvalidInput(
                "number of neighbours must be positive".to_string(),
            ));
        }
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        self.check_dimension(dimension, query.len())?;

        // Max-heap on distance holding the best k seen so far.
        let mut best = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        for (row, vector) in self.data.chunks_exact(dimension).enumerate() {
            let candidate = Candidate {
                distance: squared_l2(query, vector),
                row,
            };
            if best.len() < k {
                best.push(candidate);
            } else if best.peek().is_some_and(|worst| candidate < *worst) {
                best.pop();
                best.push(candidate);
            }
        }

        Ok(best
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                row: RowId(c.row),
                distance: c.distance,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.dimension
            .filter(|d| *d > 0)
            .map_or(0, |d| self.data.len() / d)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Heap entry ordered by distance, then row, so ties resolve to the
/// earlier chunk.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    row: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.row.cmp(&other.row))
    }
}

/// Squared euclidean distance between two vectors of equal length.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
