// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Flat (brute-force) nearest-neighbor index
//!
//! Every search scans all stored vectors and ranks them by squared Euclidean
//! distance. Vectors are stored contiguously, row-major, so the label of a
//! vector is simply its insertion ordinal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label used to pad search results when the index holds fewer than `k` vectors
pub const SENTINEL_LABEL: i64 = -1;

/// Errors raised by vector index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid index dimension: {0}")]
    InvalidDimension(usize),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to encode index: {0}")]
    Encode(String),

    #[error("Failed to decode index: {0}")]
    Decode(String),
}

/// One entry of a k-NN result: squared L2 distance and the vector's label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub label: i64,
}

impl Neighbor {
    fn sentinel() -> Self {
        Self {
            distance: f32::INFINITY,
            label: SENTINEL_LABEL,
        }
    }

    /// True for padding entries that do not refer to a stored vector
    pub fn is_sentinel(&self) -> bool {
        self.label == SENTINEL_LABEL
    }
}

/// Capability set of a vector index backend
///
/// Labels are assigned in insertion order starting at 0, so callers can keep
/// side tables (e.g. passage text) aligned by position.
pub trait VectorIndex: Send + Sync {
    /// Creates an empty index for vectors of `dimension` floats
    fn with_dimension(dimension: usize) -> Result<Self, IndexError>
    where
        Self: Sized;

    /// Restores an index previously produced by [`VectorIndex::to_bytes`]
    fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError>
    where
        Self: Sized;

    fn to_bytes(&self) -> Result<Vec<u8>, IndexError>;

    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks every vector's dimension, then appends them all
    ///
    /// Either all vectors are appended or none are.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError>;

    /// Drops every vector with label `>= len`
    fn truncate(&mut self, len: usize);

    /// Returns exactly `k` neighbors ordered by ascending distance, padded
    /// with sentinel entries when fewer than `k` vectors are stored
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;
}

/// Exact k-NN index using squared Euclidean distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatL2Index {
    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        if actual != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dimension)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

impl VectorIndex for FlatL2Index {
    fn with_dimension(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            vectors: Vec::new(),
        })
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let index: FlatL2Index =
            bincode::deserialize(bytes).map_err(|e| IndexError::Decode(e.to_string()))?;

        if index.dimension == 0 {
            return Err(IndexError::InvalidDimension(0));
        }
        if index.vectors.len() % index.dimension != 0 {
            return Err(IndexError::Decode(format!(
                "{} floats is not a whole number of {}-dim vectors",
                index.vectors.len(),
                index.dimension
            )));
        }

        Ok(index)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::Encode(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        for vector in vectors {
            self.check_dimension(vector.len())?;
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }

        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len * self.dimension);
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimension(query.len())?;

        let mut neighbors: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(label, row)| Neighbor {
                distance: squared_l2(query, row),
                label: label as i64,
            })
            .collect();

        // Stable sort keeps insertion order among equal distances.
        // total_cmp gives NaN distances a fixed place instead of an inconsistent order.
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        neighbors.resize(k, Neighbor::sentinel());

        Ok(neighbors)
    }
}
