use super::{ancestors_or_self, least_common_difference, same_subtree, Resample};
use crate::grammar::{Grammar, Rule, Scope, ScopeGuard};
use crate::tree::{Arg, Node};
use crate::utilities::{logsumexp, nicelog};
use crate::{GrammarError, SampleError};
use rand::{seq::SliceRandom, Rng};
use std::f64::NEG_INFINITY;

/// The visible rules at `place` that can take the node there as an argument.
fn replicating_rules(grammar: &Grammar, tree: &Node, place: &[usize]) -> Vec<Rule> {
    match tree.get(place) {
        Some(node) => {
            let mut scope = Scope::new();
            let scope = ScopeGuard::above(&mut scope, tree, place);
            grammar
                .visible_rules(&node.returntype, &scope)
                .into_iter()
                .filter(|r| !r.replicating_slots().is_empty())
                .cloned()
                .collect()
        }
        None => vec![],
    }
}

fn insert_weight(
    grammar: &Grammar,
    tree: &Node,
    resample: &Resample,
    place: &[usize],
    node: &Node,
) -> f64 {
    if replicating_rules(grammar, tree, place).is_empty() {
        0.0
    } else {
        resample.weight(place, node)
    }
}

/// Wrap a subtree in a new node that takes it as one argument and samples
/// the rest.
pub fn propose<R: Rng>(
    grammar: &Grammar,
    tree: &Node,
    resample: &Resample,
    rng: &mut R,
) -> Result<Node, SampleError> {
    let (place, _) = tree
        .sample_subnode(|p, n| insert_weight(grammar, tree, resample, p, n), rng)
        .map_err(|_| SampleError::ProposalFailed)?;
    let original = tree
        .get(&place)
        .ok_or_else(|| GrammarError::InvalidPlace(place.clone()))?;
    let rules = replicating_rules(grammar, tree, &place);
    let rule = rules.choose(rng).ok_or(SampleError::ProposalFailed)?;
    let slots = rule.replicating_slots();
    let slot = *slots.choose(rng).ok_or(SampleError::ProposalFailed)?;
    let mut node = grammar.instantiate(rule);
    let mut args = Vec::with_capacity(slots.len());
    {
        let mut scope = Scope::new();
        let mut scope = ScopeGuard::above(&mut scope, tree, &place);
        let mut scope = ScopeGuard::enter(&mut scope, &node);
        for (i, symbol) in rule.to.iter().flatten().enumerate() {
            if i == slot {
                args.push(Arg::Node(original.clone()));
            } else if grammar.is_nonterminal(symbol) {
                args.push(Arg::Node(grammar.generate_in(symbol, &mut scope, rng)?));
            } else {
                args.push(Arg::Terminal(symbol.clone()));
            }
        }
    }
    node.args = Some(args);
    let mut proposal = tree.clone();
    proposal.replace(&place, node);
    Ok(proposal)
}

/// The log-probability of inserting a node into `t1` to get `t2`, summed
/// over every site and slot that could produce `t2`.
pub fn log_probability(
    grammar: &Grammar,
    t1: &Node,
    t2: &Node,
    resample: &Resample,
) -> Result<f64, GrammarError> {
    let lcd = match least_common_difference(t1, t2) {
        Some(lcd) => lcd,
        None => return Ok(NEG_INFINITY),
    };
    let mut lps = vec![];
    for place in ancestors_or_self(&lcd) {
        let n2 = match (t1.get(place), t2.get(place)) {
            (Some(n1), Some(n2)) if n1.returntype == n2.returntype => n2,
            _ => continue,
        };
        let rules = replicating_rules(grammar, t1, place);
        let choose =
            t1.sampling_log_probability(place, |p, n| insert_weight(grammar, t1, resample, p, n));
        if choose == NEG_INFINITY {
            continue;
        }
        let mut scope = Scope::new();
        let scope = ScopeGuard::above(&mut scope, t2, place);
        let rule = grammar.rule_for_node(n2, &scope)?;
        let slots = rule.replicating_slots();
        let mut slot_lps = vec![];
        for &slot in &slots {
            let mut inner = place.to_vec();
            inner.push(slot);
            if !same_subtree(t1, place, t2, &inner) {
                continue;
            }
            let mut lp = -(slots.len() as f64).ln();
            for (i, _) in n2.children_with_index().filter(|&(i, _)| i != slot) {
                let mut sibling = place.to_vec();
                sibling.push(i);
                lp += grammar.log_probability_at(t2, &sibling)?;
            }
            slot_lps.push(lp);
        }
        lps.push(choose - nicelog(rules.len() as f64) + logsumexp(&slot_lps));
    }
    Ok(logsumexp(&lps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::BinderSpec;
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
    fn sums_over_both_slots() {
        let g = boolean();
        let resample = Resample::Uniform;
        // and_(True, False)
        let t1 = g.unpack("012").unwrap();
        // and_(and_(True, True), False)
        let t2 = g.unpack("00112").unwrap();
        let lp = log_probability(&g, &t1, &t2, &resample).unwrap();
        assert!((lp - (1.0f64 / 9.0).ln()).abs() < 1e-12);
        assert_eq!(log_probability(&g, &t1, &t1, &resample).unwrap(), NEG_INFINITY);
        // Insert never shrinks a tree.
        let t3 = g.unpack("1").unwrap();
        assert_eq!(log_probability(&g, &t1, &t3, &resample).unwrap(), NEG_INFINITY);
    }

    #[test]
    fn proposals_keep_the_original_subtree() {
        let g = boolean();
        let resample = Resample::Uniform;
        let t1 = g.unpack("012").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let t2 = propose(&g, &t1, &resample, &mut rng).unwrap();
            assert!(t2.count_nodes() > t1.count_nodes());
            let lp = log_probability(&g, &t1, &t2, &resample).unwrap();
            assert!(lp.is_finite() && lp < 0.0, "{}", t2);
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
        let mut rng = StdRng::seed_from_u64(17);

        let g = boolean();
        let t1 = g.unpack("012").unwrap();
        assert_frequencies(
            20_000,
            0.015,
            || propose(&g, &t1, &resample, &mut rng).ok(),
            |t2| log_probability(&g, &t1, t2, &resample).unwrap(),
        );

        // apply_(lambda y0: y0, x)
        let g = lambda();
        let t1 = g.unpack("1032").unwrap();
        assert_frequencies(
            20_000,
            0.015,
            || propose(&g, &t1, &resample, &mut rng).ok(),
            |t2| log_probability(&g, &t1, t2, &resample).unwrap(),
        );
    }
}
