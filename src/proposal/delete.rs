use super::{ancestors_or_self, least_common_difference, same_subtree, Resample};
use crate::tree::Node;
use crate::utilities::logsumexp;
use crate::SampleError;
use rand::{seq::SliceRandom, Rng};
use std::f64::NEG_INFINITY;

/// The arguments of `node` that could replace it: subtrees of the same
/// nonterminal that do not use a variable `node` binds.
fn promotable_slots(node: &Node) -> Vec<usize> {
    let bound = node.bound_rule().map(|r| r.name.as_str());
    node.children_with_index()
        .filter(|(_, child)| child.returntype == node.returntype)
        .filter(|(_, child)| bound.map_or(true, |name| !child.free_variables().contains(name)))
        .map(|(i, _)| i)
        .collect()
}

fn delete_weight(resample: &Resample, place: &[usize], node: &Node) -> f64 {
    if promotable_slots(node).is_empty() {
        0.0
    } else {
        resample.weight(place, node)
    }
}

/// Replace a node with one of its arguments of the same nonterminal,
/// discarding the others.
pub fn propose<R: Rng>(tree: &Node, resample: &Resample, rng: &mut R) -> Result<Node, SampleError> {
    let (place, _) = tree
        .sample_subnode(|p, n| delete_weight(resample, p, n), rng)
        .map_err(|_| SampleError::ProposalFailed)?;
    let node = tree.get(&place).ok_or(SampleError::ProposalFailed)?;
    let slot = *promotable_slots(node)
        .choose(rng)
        .ok_or(SampleError::ProposalFailed)?;
    let child = node.get(&[slot]).ok_or(SampleError::ProposalFailed)?.clone();
    let mut proposal = tree.clone();
    proposal.replace(&place, child);
    Ok(proposal)
}

/// The log-probability of deleting a node of `t1` to get `t2`, summed over
/// every site and argument that could produce `t2`.
pub fn log_probability(t1: &Node, t2: &Node, resample: &Resample) -> f64 {
    let lcd = match least_common_difference(t1, t2) {
        Some(lcd) => lcd,
        None => return NEG_INFINITY,
    };
    let lps = ancestors_or_self(&lcd)
        .filter_map(|place| {
            let slots = promotable_slots(t1.get(place)?);
            let matching = slots
                .iter()
                .filter(|&&slot| {
                    let mut inner = place.to_vec();
                    inner.push(slot);
                    same_subtree(t1, &inner, t2, place)
                })
                .count();
            if matching == 0 {
                return None;
            }
            let choose = t1.sampling_log_probability(place, |p, n| delete_weight(resample, p, n));
            Some(choose + (matching as f64).ln() - (slots.len() as f64).ln())
        })
        .collect::<Vec<_>>();
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
        g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g.add_rule("BOOL", "False", None, 1.0).unwrap();
        g
    }

    #[test]
    fn every_deletion_is_counted() {
        let g = boolean();
        let resample = Resample::Uniform;
        // and_(not_(True), False)
        let t1 = g.unpack("0123").unwrap();
        let cases = [("12", 0.25_f64), ("3", 0.25), ("023", 0.5)];
        let mut total = 0.0;
        for &(packed, p) in &cases {
            let t2 = g.unpack(packed).unwrap();
            let lp = log_probability(&t1, &t2, &resample);
            assert!((lp - p.ln()).abs() < 1e-12, "{}", t2);
            total += lp.exp();
        }
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(log_probability(&t1, &t1, &resample), NEG_INFINITY);
    }

    #[test]
    fn leaves_cannot_be_deleted() {
        let g = boolean();
        let t1 = g.unpack("2").unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            propose(&t1, &Resample::Uniform, &mut rng),
            Err(SampleError::ProposalFailed)
        );
    }

    #[test]
    fn bodies_using_their_binder_stay_put() {
        let mut g = Grammar::new("EXPR");
        g.add_binder("EXPR", "lambda", Some(vec!["EXPR"]), 1.0, BinderSpec::new("EXPR"))
            .unwrap();
        g.add_rule("EXPR", "x", None, 1.0).unwrap();
        // lambda y0: y0
        let t1 = g.unpack("02").unwrap();
        assert!(promotable_slots(&t1).is_empty());
        // lambda y0: x
        let t2 = g.unpack("01").unwrap();
        assert_eq!(promotable_slots(&t2), vec![0]);
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
        let mut rng = StdRng::seed_from_u64(19);

        // and_(not_(True), False)
        let g = boolean();
        let t1 = g.unpack("0123").unwrap();
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
