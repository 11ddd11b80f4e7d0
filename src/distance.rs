//! Pairwise distance matrix and score reduction.

use ndarray::Array2;

use crate::embedding::Embedding;
use crate::error::{NomadError, Result};

/// Euclidean distances between degraded (rows) and reference (columns) embeddings.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    values: Array2<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise Euclidean distances between `degraded` and `reference`.
    pub fn pairwise(degraded: &[Embedding], reference: &[Embedding]) -> Result<Self> {
        if degraded.is_empty() {
            return Err(NomadError::EmptyInput("degraded embedding set is empty".into()));
        }
        if reference.is_empty() {
            return Err(NomadError::EmptyInput("reference embedding set is empty".into()));
        }
        let dim = reference[0].dim();
        if let Some(bad) = degraded.iter().chain(reference).find(|e| e.dim() != dim) {
            return Err(NomadError::invalid(format!(
                "embedding dimension mismatch: expected {dim}, got {}",
                bad.dim()
            )));
        }
        let values = Array2::from_shape_fn((degraded.len(), reference.len()), |(i, j)| {
            euclidean(&degraded[i], &reference[j])
        });
        Ok(Self { values })
    }

    /// Shape as (degraded count, reference count).
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied()
    }

    /// Mean over all m*n entries in a single pooled reduction.
    pub fn pooled_mean(&self) -> f64 {
        // Non-empty by construction.
        self.values.sum() / self.values.len() as f64
    }

    /// Mean distance of each degraded item to the whole reference set.
    pub fn row_means(&self) -> Vec<f64> {
        let cols = self.values.ncols() as f64;
        self.values
            .rows()
            .into_iter()
            .map(|row| row.sum() / cols)
            .collect()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

/// Pooled mean of the degraded-by-reference distance matrix.
pub fn nomad_score(degraded: &[Embedding], reference: &[Embedding]) -> Result<f64> {
    Ok(DistanceMatrix::pairwise(degraded, reference)?.pooled_mean())
}
