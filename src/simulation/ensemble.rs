//! Path ensemble: dense row-major price grid, one row per path

use crate::error::{Error, Result};

/// `n_paths x n_steps` grid produced by a simulation engine
#[derive(Debug, Clone)]
pub struct PathEnsemble {
    prices: Vec<f32>,
    n_paths: usize,
    n_steps: usize,
}

impl PathEnsemble {
    /// Wrap an engine buffer, rejecting empty or mis-sized grids
    pub fn from_flat(prices: Vec<f32>, n_paths: usize, n_steps: usize) -> Result<Self> {
        let expected = n_paths.checked_mul(n_steps).ok_or_else(|| {
            Error::Internal(format!("Grid of {} x {} overflows", n_paths, n_steps))
        })?;
        if n_paths == 0 || n_steps == 0 || prices.is_empty() {
            return Err(Error::EmptyEnsemble {
                paths: n_paths,
                steps: n_steps,
            });
        }
        if prices.len() != expected {
            return Err(Error::MalformedEnsemble {
                expected,
                actual: prices.len(),
            });
        }
        Ok(Self {
            prices,
            n_paths,
            n_steps,
        })
    }

    /// Build from per-path rows; all rows must share a length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_paths = rows.len();
        let n_steps = rows.first().map(|r| r.len()).unwrap_or(0);
        let prices: Vec<f32> = rows.iter().flatten().map(|&p| p as f32).collect();
        Self::from_flat(prices, n_paths, n_steps)
    }

    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn path(&self, index: usize) -> &[f32] {
        let start = index * self.n_steps;
        &self.prices[start..start + self.n_steps]
    }

    pub fn paths(&self) -> impl Iterator<Item = &[f32]> {
        self.prices.chunks_exact(self.n_steps)
    }

    /// Last column, widened to f64
    pub fn final_prices(&self) -> Vec<f64> {
        self.paths().map(|p| p[self.n_steps - 1] as f64).collect()
    }

    /// Copy of one row, widened to f64 for serialization
    pub fn path_to_vec(&self, index: usize) -> Vec<f64> {
        self.path(index).iter().map(|&p| p as f64).collect()
    }
}
