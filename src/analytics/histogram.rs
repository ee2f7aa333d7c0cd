//! Terminal-price histogram
//!
//! Bins span the 2nd to 98th percentile of terminal prices. Binning follows
//! the usual half-open convention with the last bin closed on the right;
//! values outside the span are not counted.

use rand::Rng;
use serde::Serialize;

/// Lower percentile of the histogram span
pub const LOWER_PERCENTILE: f64 = 2.0;
/// Upper percentile of the histogram span
pub const UPPER_PERCENTILE: f64 = 98.0;

/// Linear-interpolated percentile of ascending-sorted data, `q` in [0, 100]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// `bins + 1` evenly spaced edges from `lo` to `hi`, endpoint exact
pub fn linspace_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let step = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * step).collect();
    edges[bins] = hi;
    edges
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Count `values` into the bins delimited by `edges`
    pub fn from_edges(values: &[f64], edges: Vec<f64>) -> Self {
        let bins = edges.len().saturating_sub(1);
        let mut counts = vec![0u64; bins];
        if bins == 0 {
            return Self {
                bin_edges: edges,
                counts,
            };
        }

        let first = edges[0];
        let last = edges[bins];
        for &v in values {
            if !(first..=last).contains(&v) {
                continue;
            }
            let idx = if v == last {
                bins - 1
            } else {
                // Number of edges <= v, minus one
                edges.partition_point(|&e| e <= v) - 1
            };
            counts[idx.min(bins - 1)] += 1;
        }

        Self {
            bin_edges: edges,
            counts,
        }
    }

    /// Equal-width bins over the [2nd, 98th] percentile span
    pub fn of_terminal_prices(sorted_prices: &[f64], bins: usize) -> Self {
        let lo = percentile(sorted_prices, LOWER_PERCENTILE);
        let hi = percentile(sorted_prices, UPPER_PERCENTILE);
        Self::from_edges(sorted_prices, linspace_edges(lo, hi, bins))
    }
}

/// Legacy dashboard placeholder: each count nudged by uniform integer noise
/// in [-2, 2] and floored at zero. Carries no statistical meaning.
pub fn jittered_counts<R: Rng + ?Sized>(counts: &[u64], rng: &mut R) -> Vec<u64> {
    counts
        .iter()
        .map(|&c| (c as i64 + rng.gen_range(-2i64..=2)).max(0) as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_percentile_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_eq!(percentile(&data, 50.0), 3.0);
        // rank = 0.25 * 4 = 1.0
        assert_eq!(percentile(&data, 25.0), 2.0);
        // rank = 0.1 * 4 = 0.4
        assert!((percentile(&data, 10.0) - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 98.0), 7.0);
    }

    #[test]
    fn test_linspace_edges() {
        let edges = linspace_edges(0.0, 1.0, 4);
        assert_eq!(edges, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_last_bin_closed_outside_dropped() {
        let hist = Histogram::from_edges(
            &[-1.0, 0.0, 0.1, 0.25, 0.9, 1.0, 1.5],
            linspace_edges(0.0, 1.0, 4),
        );
        assert_eq!(hist.counts, vec![2, 1, 0, 2]);
    }

    #[test]
    fn test_terminal_price_histogram_shape() {
        let sorted: Vec<f64> = (0..1_000).map(|i| 100.0 + i as f64 * 0.1).collect();
        let hist = Histogram::of_terminal_prices(&sorted, 24);
        assert_eq!(hist.bin_edges.len(), 25);
        assert_eq!(hist.counts.len(), 24);
        assert!((hist.bin_edges[0] - percentile(&sorted, 2.0)).abs() < 1e-12);
        assert!((hist.bin_edges[24] - percentile(&sorted, 98.0)).abs() < 1e-12);
        // Roughly 96% of the mass lies inside the span
        let inside: u64 = hist.counts.iter().sum();
        assert!((955..=962).contains(&inside), "inside={}", inside);
    }

    #[test]
    fn test_degenerate_span_puts_mass_in_last_bin() {
        let sorted = vec![50.0; 10];
        let hist = Histogram::of_terminal_prices(&sorted, 24);
        assert_eq!(hist.counts[23], 10);
        assert_eq!(hist.counts.iter().sum::<u64>(), 10);
    }

    #[test]
    fn test_jitter_bounded_and_non_negative() {
        let mut rng = StdRng::seed_from_u64(3);
        let counts = vec![0, 1, 2, 10, 100];
        for _ in 0..200 {
            let noisy = jittered_counts(&counts, &mut rng);
            for (orig, n) in counts.iter().zip(noisy.iter()) {
                assert!((*n as i64 - *orig as i64).abs() <= 2);
            }
        }
    }
}
