use super::{Resample, WeightedKernel};
use crate::grammar::Grammar;
use crate::tree::Node;
use crate::utilities::{logsumexp, nicelog, weighted_choice};
use crate::{GrammarError, SampleError};
use rand::Rng;

pub fn propose<R: Rng>(
    kernels: &[WeightedKernel],
    grammar: &Grammar,
    tree: &Node,
    resample: &Resample,
    rng: &mut R,
) -> Result<Node, SampleError> {
    let weights = kernels.iter().map(|k| k.weight).collect::<Vec<_>>();
    let idx = weighted_choice(&weights, rng).ok_or(SampleError::ProposalFailed)?;
    kernels[idx].kernel.propose_tree(grammar, tree, resample, rng)
}

/// Any kernel in the mixture might produce `t2`, so each contributes in
/// proportion to its weight.
pub fn log_probability(
    kernels: &[WeightedKernel],
    grammar: &Grammar,
    t1: &Node,
    t2: &Node,
    resample: &Resample,
) -> Result<f64, GrammarError> {
    let z = kernels.iter().map(|k| k.weight).sum::<f64>();
    let lps = kernels
        .iter()
        .filter(|k| k.weight > 0.0)
        .map(|k| {
            k.kernel
                .log_probability(grammar, t1, t2, resample)
                .map(|lp| nicelog(k.weight) - nicelog(z) + lp)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logsumexp(&lps))
}
