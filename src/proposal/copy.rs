use super::{ancestors_or_self, least_common_difference, same_subtree, Resample};
use crate::tree::{Node, Place};
use crate::utilities::logsumexp;
use crate::SampleError;
use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};

/// The names of the variables visible at `place`, sorted.
fn visible_variables<'a>(tree: &'a Node, place: &[usize]) -> Vec<&'a str> {
    tree.binders_above(place)
        .into_iter()
        .map(|r| r.name.as_str())
        .sorted()
        .collect()
}

/// The places a copy of the subtree at `source` may overwrite: nodes of the
/// same nonterminal that see exactly the same variables, `source` included.
fn targets(tree: &Node, source: &[usize]) -> Vec<Place> {
    let node = match tree.get(source) {
        Some(node) => node,
        None => return vec![],
    };
    let scope = visible_variables(tree, source);
    tree.subnodes()
        .filter(|(p, n)| n.returntype == node.returntype && visible_variables(tree, p) == scope)
        .map(|(p, _)| p)
        .collect()
}

/// Overwrite the subtree at `target` with a copy of the subtree at `source`,
/// giving the copy's own binders fresh variables.
///
/// Fails with `SampleError::ProposalFailed` if the copy would use a
/// variable that is not bound above `target`.
///
/// ```
/// # use lotinduction::grammar::{BinderSpec, Grammar};
/// # use lotinduction::proposal::graft_copy;
/// # use lotinduction::SampleError;
/// let mut g = Grammar::new("EXPR");
/// g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR")).unwrap();
/// g.add_rule("EXPR", "apply_", Some(vec!["EXPR", "EXPR"]), 1.0).unwrap();
/// g.add_rule("EXPR", "x", None, 1.0).unwrap();
///
/// let tree = g.unpack("1032").unwrap();
/// assert_eq!(tree.to_string(), "apply_(lambda y1: y1, x)");
/// // the bound y1 cannot escape its lambda
/// assert_eq!(graft_copy(&tree, &[0, 0], &[1]), Err(SampleError::ProposalFailed));
/// let copied = graft_copy(&tree, &[0], &[1]).unwrap();
/// assert_eq!(copied.to_string(), "apply_(lambda y1: y1, lambda y1: y1)");
/// ```
pub fn graft_copy(tree: &Node, source: &[usize], target: &[usize]) -> Result<Node, SampleError> {
    let copy = tree
        .get(source)
        .ok_or(SampleError::ProposalFailed)?
        .uniquify_bound_variables();
    let visible = visible_variables(tree, target);
    if copy
        .free_variables()
        .iter()
        .any(|v| !visible.contains(&v.as_str()))
    {
        return Err(SampleError::ProposalFailed);
    }
    let mut proposal = tree.clone();
    proposal
        .replace(target, copy)
        .ok_or(SampleError::ProposalFailed)?;
    Ok(proposal)
}

/// Choose a source subtree and overwrite a compatible target with a copy of it.
pub fn propose<R: Rng>(tree: &Node, resample: &Resample, rng: &mut R) -> Result<Node, SampleError> {
    let (source, _) = tree
        .sample_subnode(|p, n| resample.weight(p, n), rng)
        .map_err(|_| SampleError::ProposalFailed)?;
    let target = targets(tree, &source)
        .choose(rng)
        .cloned()
        .ok_or(SampleError::ProposalFailed)?;
    graft_copy(tree, &source, &target)
}

/// The log-probability of copying within `t1` to get `t2`, summed over every
/// (source, target) pair that produces `t2`.
pub fn log_probability(t1: &Node, t2: &Node, resample: &Resample) -> f64 {
    let weight = |p: &[usize], n: &Node| resample.weight(p, n);
    let sites = match least_common_difference(t1, t2) {
        None => t1.subnodes().map(|(p, _)| p).collect_vec(),
        Some(lcd) => ancestors_or_self(&lcd).map(|p| p.to_vec()).collect_vec(),
    };
    let mut lps = vec![];
    for (source, _) in t1.subnodes() {
        let targets = targets(t1, &source);
        let choose = t1.sampling_log_probability(&source, weight) - (targets.len() as f64).ln();
        for target in targets.iter().filter(|t| sites.contains(t)) {
            if same_subtree(t1, &source, t2, target) {
                lps.push(choose);
            }
        }
    }
    logsumexp(&lps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{BinderSpec, Grammar};
    use crate::proposal::assert_frequencies;
    use rand::{rngs::StdRng, SeedableRng};

    fn boolean() -> Grammar {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0)
            .unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g.add_rule("BOOL", "False", None, 1.0).unwrap();
        g
    }

    #[test]
    fn copies_are_counted_per_pair() {
        let g = boolean();
        let resample = Resample::Uniform;
        // and_(True, False)
        let t1 = g.unpack("012").unwrap();
        // and_(True, True)
        let t2 = g.unpack("011").unwrap();
        let lp = log_probability(&t1, &t2, &resample);
        assert!((lp - (1.0f64 / 9.0).ln()).abs() < 1e-12);
        // Each source may be copied onto itself.
        let lp = log_probability(&t1, &t1, &resample);
        assert!((lp - (3.0f64 / 9.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn proposals_have_positive_probability() {
        let g = boolean();
        let resample = Resample::Uniform;
        let t1 = g.unpack("00122").unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let t2 = propose(&t1, &resample, &mut rng).unwrap();
            assert!(log_probability(&t1, &t2, &resample).is_finite(), "{}", t2);
        }
    }

    fn lambda() -> Grammar {
        let mut g = Grammar::new("EXPR");
        g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR"))
            .unwrap();
        g.add_rule("EXPR", "apply_", Some(vec!["EXPR", "EXPR"]), 1.0)
            .unwrap();
        g.add_rule("EXPR", "x", None, 1.0).unwrap();
        g
    }

    #[test]
    fn proposals_match_their_probabilities() {
        let resample = Resample::Uniform;
        let mut rng = StdRng::seed_from_u64(23);

        // and_(and_(True, False), False)
        let g = boolean();
        let t1 = g.unpack("00122").unwrap();
        let seen = assert_frequencies(
            20_000,
            0.015,
            || Some(propose(&t1, &resample, &mut rng).unwrap()),
            |t2| log_probability(&t1, t2, &resample),
        );
        assert!((seen - 1.0).abs() < 1e-9, "{}", seen);

        // apply_(lambda y0: apply_(y0, x), x)
        let g = lambda();
        let t1 = g.unpack("101322").unwrap();
        let seen = assert_frequencies(
            20_000,
            0.015,
            || Some(propose(&t1, &resample, &mut rng).unwrap()),
            |t2| log_probability(&t1, t2, &resample),
        );
        assert!((seen - 1.0).abs() < 1e-9, "{}", seen);
    }
}
