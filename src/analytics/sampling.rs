//! Path sampling for visualization

use rand::seq::index;
use rand::Rng;

use crate::simulation::PathEnsemble;

/// Distinct row indices drawn uniformly without replacement.
///
/// When `sample_size >= n_paths` every row is returned in original order.
pub fn sample_indices<R: Rng + ?Sized>(n_paths: usize, sample_size: usize, rng: &mut R) -> Vec<usize> {
    if sample_size >= n_paths {
        return (0..n_paths).collect();
    }
    index::sample(rng, n_paths, sample_size).into_vec()
}

pub fn sample_paths<R: Rng + ?Sized>(
    ensemble: &PathEnsemble,
    sample_size: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    sample_indices(ensemble.n_paths(), sample_size, rng)
        .into_iter()
        .map(|i| ensemble.path_to_vec(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn ensemble(n_paths: usize) -> PathEnsemble {
        let rows: Vec<Vec<f64>> = (0..n_paths)
            .map(|i| vec![100.0, 100.0 + i as f64])
            .collect();
        PathEnsemble::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_sample_size_and_distinctness() {
        let mut rng = StdRng::seed_from_u64(11);
        let indices = sample_indices(1_000, 35, &mut rng);
        assert_eq!(indices.len(), 35);
        let unique: HashSet<usize> = indices.iter().copied().collect();
        assert_eq!(unique.len(), 35);
        assert!(indices.iter().all(|&i| i < 1_000));
    }

    #[test]
    fn test_oversized_request_returns_all_in_order() {
        let mut rng = StdRng::seed_from_u64(11);
        let e = ensemble(5);
        let sample = sample_paths(&e, 5, &mut rng);
        let all: Vec<Vec<f64>> = (0..5).map(|i| e.path_to_vec(i)).collect();
        assert_eq!(sample, all);
        assert_eq!(sample_paths(&e, 500, &mut rng), all);
    }

    #[test]
    fn test_zero_sample() {
        let mut rng = StdRng::seed_from_u64(11);
        assert!(sample_paths(&ensemble(10), 0, &mut rng).is_empty());
    }

    #[test]
    fn test_sampled_rows_come_from_ensemble() {
        let mut rng = StdRng::seed_from_u64(5);
        let e = ensemble(50);
        for row in sample_paths(&e, 10, &mut rng) {
            let i = (row[1] - 100.0) as usize;
            assert_eq!(row, e.path_to_vec(i));
        }
    }
}
