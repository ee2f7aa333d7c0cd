//! Simulation engine contract and the bundled GBM implementation

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, warn};

/// Produces `n_paths * n_steps` strictly positive prices, row-major by path.
///
/// Callers must not assume column 0 equals `s0`; that is the engine's
/// convention to choose.
pub trait SimulationEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    fn simulate(&self, mu: f64, sigma: f64, s0: f64, n_steps: usize, n_paths: usize) -> Vec<f32>;
}

/// Exact log-space GBM stepping with `dt = 1` (parameters are per second,
/// one step is one second). Column 0 holds `s0`.
#[derive(Debug, Clone, Default)]
pub struct GbmSimulator {
    seed: Option<u64>,
}

impl GbmSimulator {
    /// Create a simulator with an optional fixed seed
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl SimulationEngine for GbmSimulator {
    fn name(&self) -> &'static str {
        "gbm-cpu"
    }

    fn simulate(&self, mu: f64, sigma: f64, s0: f64, n_steps: usize, n_paths: usize) -> Vec<f32> {
        let mut rng = self.rng();
        let drift = mu - 0.5 * sigma * sigma;
        let Some(cells) = n_paths.checked_mul(n_steps) else {
            warn!("Grid of {} x {} overflows, nothing simulated", n_paths, n_steps);
            return Vec::new();
        };
        let mut out = Vec::with_capacity(cells);

        for _ in 0..n_paths {
            if n_steps == 0 {
                break;
            }
            out.push(s0 as f32);
            let mut log_price = s0.ln();
            for _ in 1..n_steps {
                let z: f64 = StandardNormal.sample(&mut rng);
                log_price += drift + sigma * z;
                out.push(log_price.exp() as f32);
            }
        }

        debug!(
            "Simulated {} paths x {} steps (mu={:.3e}, sigma={:.3e}, S0={})",
            n_paths, n_steps, mu, sigma, s0
        );
        out
    }
}
