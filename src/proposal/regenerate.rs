use super::{ancestors_or_self, least_common_difference, Resample};
use crate::grammar::{Grammar, Scope, ScopeGuard};
use crate::tree::Node;
use crate::utilities::logsumexp;
use crate::{GrammarError, SampleError};
use rand::Rng;
use std::f64::NEG_INFINITY;

/// Replace a subtree with a fresh sample generated in the subtree's scope.
pub fn propose<R: Rng>(
    grammar: &Grammar,
    tree: &Node,
    resample: &Resample,
    rng: &mut R,
) -> Result<Node, SampleError> {
    let (place, _) = tree.sample_subnode(|p, n| resample.weight(p, n), rng)?;
    let returntype = tree
        .get(&place)
        .map(|n| n.returntype.clone())
        .ok_or_else(|| GrammarError::InvalidPlace(place.clone()))?;
    let replacement = {
        let mut scope = Scope::new();
        let mut scope = ScopeGuard::above(&mut scope, tree, &place);
        grammar.generate_in(&returntype, &mut scope, rng)?
    };
    let mut proposal = tree.clone();
    proposal.replace(&place, replacement);
    Ok(proposal)
}

/// The log-probability of regenerating `t1` into `t2`: a sum over every
/// site whose regeneration could account for all of their differences.
pub fn log_probability(
    grammar: &Grammar,
    t1: &Node,
    t2: &Node,
    resample: &Resample,
) -> Result<f64, GrammarError> {
    let weight = |p: &[usize], n: &Node| resample.weight(p, n);
    let sites = match least_common_difference(t1, t2) {
        None => t1.subnodes().map(|(p, _)| p).collect::<Vec<_>>(),
        Some(lcd) => ancestors_or_self(&lcd).map(|p| p.to_vec()).collect(),
    };
    let mut lps = Vec::with_capacity(sites.len());
    for place in sites {
        let same_type = match (t1.get(&place), t2.get(&place)) {
            (Some(n1), Some(n2)) => n1.returntype == n2.returntype,
            _ => false,
        };
        if !same_type {
            continue;
        }
        let choose = t1.sampling_log_probability(&place, weight);
        if choose == NEG_INFINITY {
            continue;
        }
        lps.push(choose + grammar.log_probability_at(t2, &place)?);
    }
    Ok(logsumexp(&lps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;

    fn boolean() -> Grammar {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0)
            .unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g.add_rule("BOOL", "False", None, 1.0).unwrap();
        g
    }

    #[test]
    fn sums_over_every_site() {
        let g = boolean();
        let resample = Resample::Uniform;
        // and_(True, False)
        let t1 = g.unpack("012").unwrap();
        // and_(True, True)
        let t2 = g.unpack("011").unwrap();
        let lp = log_probability(&g, &t1, &t2, &resample).unwrap();
        assert!((lp - (10.0f64 / 81.0).ln()).abs() < 1e-12);
        let lp = log_probability(&g, &t1, &t1, &resample).unwrap();
        assert!((lp - (19.0f64 / 81.0).ln()).abs() < 1e-12);
        // True can only come from regenerating the root.
        let t3 = g.unpack("1").unwrap();
        let lp = log_probability(&g, &t1, &t3, &resample).unwrap();
        assert!((lp - (1.0f64 / 9.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn proposals_match_their_probabilities() {
        let g = boolean();
        let resample = Resample::Uniform;
        let t1 = g.unpack("012").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let mut counts: HashMap<Node, usize> = HashMap::new();
        for _ in 0..n {
            let t2 = propose(&g, &t1, &resample, &mut rng).unwrap();
            *counts.entry(t2).or_insert(0) += 1;
        }
        for t2 in &[g.unpack("011").unwrap(), t1.clone(), g.unpack("1").unwrap()] {
            let observed = counts.get(t2).cloned().unwrap_or(0) as f64 / n as f64;
            let expected = log_probability(&g, &t1, t2, &resample).unwrap().exp();
            assert!((observed - expected).abs() < 0.015, "{}: {} vs {}", t2, observed, expected);
        }
    }
}
