//! Tools for making everything else easier.

mod finite_history;
mod top_n;

pub use self::finite_history::{FHBool, FiniteHistory};
pub use self::top_n::TopN;
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};
use std::f64::NEG_INFINITY;

pub fn f64_eq(f1: f64, f2: f64) -> bool {
    matches!(f1.partial_cmp(&f2), Some(std::cmp::Ordering::Equal) | None)
}

pub fn logsumexp(lps: &[f64]) -> f64 {
    let largest = lps.iter().fold(NEG_INFINITY, |acc, lp| acc.max(*lp));
    if largest == NEG_INFINITY {
        NEG_INFINITY
    } else if largest.is_infinite() {
        largest
    } else {
        let x = lps.iter().map(|lp| (lp - largest).exp()).sum::<f64>().ln();
        largest + x
    }
}

/// The natural log of `x`, mapping non-positive values to negative infinity.
pub fn nicelog(x: f64) -> f64 {
    if x > 0.0 {
        x.ln()
    } else {
        NEG_INFINITY
    }
}

/// Choose an index in proportion to `weights`, returning `None` if no weight
/// is positive.
pub fn weighted_choice<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    WeightedIndex::new(weights).ok().map(|dist| dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logsumexp_handles_infinities() {
        assert_eq!(logsumexp(&[]), NEG_INFINITY);
        assert_eq!(logsumexp(&[NEG_INFINITY, NEG_INFINITY]), NEG_INFINITY);
        assert!((logsumexp(&[0.5f64.ln(), 0.5f64.ln()])).abs() < 1e-12);
        assert!((logsumexp(&[NEG_INFINITY, 0.0])).abs() < 1e-12);
    }

    #[test]
    fn weighted_choice_rejects_zero_mass() {
        let mut rng = rand::thread_rng();
        assert_eq!(weighted_choice(&[0.0, 0.0], &mut rng), None);
        assert_eq!(weighted_choice(&[0.0, 2.0], &mut rng), Some(1));
    }
}
