use crate::core::entity::BankId;
use rand::seq::SliceRandom;
use rand::Rng;

/// Draw up to `count` distinct banks, each draw weighted by market share.
///
/// Falls back to uniform sampling when no weight is positive or any weight
/// is negative or non-finite. `choose_multiple_weighted` accepts all-zero
/// weights but then orders banks arbitrarily rather than uniformly.
pub fn weighted_banks<R: Rng + ?Sized>(rng: &mut R, weights: &[f64], count: usize) -> Vec<BankId> {
    let indices: Vec<usize> = (0..weights.len()).collect();
    let count = count.min(indices.len());
    let usable = weights.iter().all(|w| w.is_finite() && *w >= 0.0)
        && weights.iter().any(|w| *w > 0.0);
    if usable {
        if let Ok(chosen) = indices.choose_multiple_weighted(rng, count, |&i| weights[i]) {
            return chosen.map(|&i| BankId::new(i)).collect();
        }
    }
    indices
        .choose_multiple(rng, count)
        .map(|&i| BankId::new(i))
        .collect()
}

/// Draw up to `count` distinct banks uniformly from `pool`.
pub fn uniform_banks<R: Rng + ?Sized>(rng: &mut R, pool: &[BankId], count: usize) -> Vec<BankId> {
    pool.choose_multiple(rng, count).copied().collect()
}

/// Every bank except those listed.
pub fn banks_except(num_banks: usize, excluded: &[BankId]) -> Vec<BankId> {
    (0..num_banks)
        .map(BankId::new)
        .filter(|b| !excluded.contains(b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_weighted_sample_is_distinct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [0.1, 0.2, 0.3, 0.4];
        for _ in 0..100 {
            let chosen = weighted_banks(&mut rng, &weights, 3);
            assert_eq!(chosen.len(), 3);
            let unique: HashSet<_> = chosen.iter().collect();
            assert_eq!(unique.len(), 3);
        }
        assert_eq!(weighted_banks(&mut rng, &weights, 10).len(), 4);
    }

    #[test]
    fn test_weighted_sample_prefers_heavy_banks() {
        let mut rng = StdRng::seed_from_u64(8);
        let weights = [0.01, 0.99];
        let heavy_first = (0..500)
            .filter(|_| weighted_banks(&mut rng, &weights, 1)[0] == BankId::new(1))
            .count();
        assert!(heavy_first > 400);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(9);
        let chosen = weighted_banks(&mut rng, &[0.0, 0.0, 0.0], 2);
        assert_eq!(chosen.len(), 2);

        let mut seen = HashSet::new();
        for _ in 0..300 {
            seen.insert(weighted_banks(&mut rng, &[0.0, 0.0, 0.0], 1)[0]);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_invalid_weights_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(11);
        for weights in [[1.0, -1.0, 1.0], [1.0, f64::NAN, 1.0], [f64::INFINITY, 1.0, 1.0]] {
            let mut seen = HashSet::new();
            for _ in 0..300 {
                let chosen = weighted_banks(&mut rng, &weights, 1);
                assert_eq!(chosen.len(), 1);
                seen.insert(chosen[0]);
            }
            assert_eq!(seen.len(), 3);
        }
    }

    #[test]
    fn test_no_banks_gives_no_candidates() {
        let mut rng = StdRng::seed_from_u64(10);
        assert!(weighted_banks(&mut rng, &[], 5).is_empty());
        assert!(uniform_banks(&mut rng, &[], 5).is_empty());
    }

    #[test]
    fn test_banks_except() {
        let pool = banks_except(4, &[BankId::new(1), BankId::new(3)]);
        assert_eq!(pool, vec![BankId::new(0), BankId::new(2)]);
    }
}
