//! Reversible proposal kernels over expression trees.
//!
//! Each [`Kernel`] can both rewrite a tree and report the exact
//! log-probability that it would rewrite one given tree into another. The
//! [`Proposer`] combines the two into the forward-backward term needed by
//! Metropolis-Hastings.
//!
//! [`Insert`], [`Delete`] and [`Copy`] are not ergodic on their own; mix them
//! with [`Regeneration`] (see [`Kernel::is_ergodic`]).
//!
//! # Example
//!
//! ```
//! # use lotinduction::grammar::Grammar;
//! # use lotinduction::proposal::{Kernel, Proposer, WeightedKernel};
//! # use rand::{rngs::StdRng, SeedableRng};
//! let mut g = Grammar::new("BOOL");
//! g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0).unwrap();
//! g.add_rule("BOOL", "True", None, 1.0).unwrap();
//! g.add_rule("BOOL", "False", None, 1.0).unwrap();
//!
//! let kernel = Kernel::Mixture(vec![
//!     WeightedKernel { weight: 2.0, kernel: Kernel::Regeneration },
//!     WeightedKernel { weight: 1.0, kernel: Kernel::Insert },
//!     WeightedKernel { weight: 1.0, kernel: Kernel::Delete },
//! ]);
//! assert!(kernel.is_ergodic());
//! let proposer = Proposer::new(kernel);
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let t1 = g.unpack("012").unwrap();
//! let t2 = proposer.propose_tree(&g, &t1, &mut rng).unwrap();
//! assert!(proposer.log_probability(&g, &t1, &t2).unwrap().is_finite());
//! ```
//!
//! [`Kernel`]: enum.Kernel.html
//! [`Proposer`]: struct.Proposer.html
//! [`Insert`]: enum.Kernel.html#variant.Insert
//! [`Delete`]: enum.Kernel.html#variant.Delete
//! [`Copy`]: enum.Kernel.html#variant.Copy
//! [`Regeneration`]: enum.Kernel.html#variant.Regeneration
//! [`Kernel::is_ergodic`]: enum.Kernel.html#method.is_ergodic

mod copy;
mod delete;
mod insert;
mod mixture;
mod regenerate;

pub use self::copy::graft_copy;
use crate::grammar::Grammar;
use crate::tree::{Node, Place};
use crate::{GrammarError, SampleError};
use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How likely each node is to be chosen as the site of an edit.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resample {
    /// Every node is equally likely.
    #[serde(alias = "uniform")]
    Uniform,
    /// Leaves have weight `w`; other nodes have weight 1.
    #[serde(alias = "leaves")]
    Leaves(f64),
}
impl Resample {
    pub fn weight(&self, _place: &[usize], node: &Node) -> f64 {
        match *self {
            Resample::Uniform => 1.0,
            Resample::Leaves(w) if node.is_leaf() => w,
            Resample::Leaves(_) => 1.0,
        }
    }
}
impl Default for Resample {
    fn default() -> Self {
        Resample::Uniform
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKernel {
    pub weight: f64,
    pub kernel: Kernel,
}

/// A way of rewriting one tree into another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// Replace a subtree with a fresh sample from the grammar.
    #[serde(alias = "regeneration")]
    Regeneration,
    /// Wrap a subtree in a new node of a rule that expands back into the
    /// subtree's nonterminal, sampling the other arguments.
    #[serde(alias = "insert")]
    Insert,
    /// Replace a node with one of its arguments of the same nonterminal.
    #[serde(alias = "delete")]
    Delete,
    /// Overwrite a subtree with a copy of another in the same scope.
    #[serde(alias = "copy")]
    Copy,
    /// Choose one of several kernels in proportion to its weight.
    #[serde(alias = "mixture")]
    Mixture(Vec<WeightedKernel>),
}
impl Kernel {
    /// `true` if the kernel can reach every tree, i.e. it is `Regeneration`
    /// or a mixture giving positive weight to such a kernel.
    pub fn is_ergodic(&self) -> bool {
        match *self {
            Kernel::Regeneration => true,
            Kernel::Mixture(ref kernels) => kernels
                .iter()
                .any(|k| k.weight > 0.0 && k.kernel.is_ergodic()),
            _ => false,
        }
    }
    pub fn propose_tree<R: Rng>(
        &self,
        grammar: &Grammar,
        tree: &Node,
        resample: &Resample,
        rng: &mut R,
    ) -> Result<Node, SampleError> {
        match *self {
            Kernel::Regeneration => regenerate::propose(grammar, tree, resample, rng),
            Kernel::Insert => insert::propose(grammar, tree, resample, rng),
            Kernel::Delete => delete::propose(tree, resample, rng),
            Kernel::Copy => copy::propose(tree, resample, rng),
            Kernel::Mixture(ref kernels) => mixture::propose(kernels, grammar, tree, resample, rng),
        }
    }
    pub fn log_probability(
        &self,
        grammar: &Grammar,
        t1: &Node,
        t2: &Node,
        resample: &Resample,
    ) -> Result<f64, GrammarError> {
        match *self {
            Kernel::Regeneration => regenerate::log_probability(grammar, t1, t2, resample),
            Kernel::Insert => insert::log_probability(grammar, t1, t2, resample),
            Kernel::Delete => Ok(delete::log_probability(t1, t2, resample)),
            Kernel::Copy => Ok(copy::log_probability(t1, t2, resample)),
            Kernel::Mixture(ref kernels) => mixture::log_probability(kernels, grammar, t1, t2, resample),
        }
    }
}

fn default_max_attempts() -> usize {
    100
}

/// A [`Kernel`] together with how it chooses edit sites and how often it may
/// retry.
///
/// [`Kernel`]: enum.Kernel.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposer {
    pub kernel: Kernel,
    #[serde(default)]
    pub resample: Resample,
    /// Recoverable failures are retried this many times before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}
impl Proposer {
    pub fn new(kernel: Kernel) -> Self {
        Proposer {
            kernel,
            resample: Resample::default(),
            max_attempts: default_max_attempts(),
        }
    }
    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }
    /// Rewrite a copy of `tree`. `tree` itself is never modified.
    pub fn propose_tree<R: Rng>(
        &self,
        grammar: &Grammar,
        tree: &Node,
        rng: &mut R,
    ) -> Result<Node, SampleError> {
        self.kernel.propose_tree(grammar, tree, &self.resample, rng)
    }
    /// The log-probability that `propose_tree` rewrites `t1` into `t2`.
    pub fn log_probability(&self, grammar: &Grammar, t1: &Node, t2: &Node) -> Result<f64, GrammarError> {
        self.kernel.log_probability(grammar, t1, t2, &self.resample)
    }
    /// Make a single proposal, returning the new tree along with the
    /// forward-backward term `log q(t1 -> t2) - log q(t2 -> t1)`, or `None`
    /// if the kernel failed recoverably.
    ///
    /// A Markov chain should treat `None` as a rejected move that keeps
    /// `tree`; the kernel probabilities count only successful rewrites.
    pub fn propose_once<R: Rng>(
        &self,
        grammar: &Grammar,
        tree: &Node,
        rng: &mut R,
    ) -> Result<Option<(Node, f64)>, SampleError> {
        match self.propose_tree(grammar, tree, rng) {
            Ok(proposal) => {
                let forward = self.log_probability(grammar, tree, &proposal)?;
                let backward = self.log_probability(grammar, &proposal, tree)?;
                trace!("proposed {} (fb = {})", proposal, forward - backward);
                Ok(Some((proposal, forward - backward)))
            }
            Err(e) if e.is_recoverable() => {
                debug!("proposal failed: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
    /// Propose a new tree along with its forward-backward term, retrying
    /// recoverable failures up to `max_attempts` times before returning
    /// `SampleError::ProposalFailed`.
    ///
    /// The result is conditioned on success, so its distribution differs
    /// from `log_probability` whenever the kernel can fail. Chains use
    /// `propose_once` instead.
    pub fn propose<R: Rng>(
        &self,
        grammar: &Grammar,
        tree: &Node,
        rng: &mut R,
    ) -> Result<(Node, f64), SampleError> {
        for _ in 0..self.max_attempts {
            if let Some(proposal) = self.propose_once(grammar, tree, rng)? {
                return Ok(proposal);
            }
        }
        Err(SampleError::ProposalFailed)
    }
}

/// The shallowest place at which `t1` and `t2` differ in more than a single
/// argument, or `None` if they are equal.
///
/// Every edit that turns `t1` into `t2` by rewriting one subtree rewrites a
/// subtree rooted at this place or at one of its ancestors.
pub fn least_common_difference(t1: &Node, t2: &Node) -> Option<Place> {
    if t1 == t2 {
        return None;
    }
    let mut place = vec![];
    loop {
        let n1 = t1.get(&place)?;
        let n2 = t2.get(&place)?;
        if t1.head_string_at(&place) != t2.head_string_at(&place) {
            return Some(place);
        }
        let differing = n1
            .children_with_index()
            .map(|(i, _)| i)
            .filter(|&i| {
                let mut child = place.clone();
                child.push(i);
                t1.full_string_at(&child) != t2.full_string_at(&child)
            })
            .collect::<Vec<_>>();
        match differing.as_slice() {
            [i] if n2.get(&[*i]).is_some() => place.push(*i),
            _ => return Some(place),
        }
    }
}

/// Every place from the root down to and including `place`.
pub(crate) fn ancestors_or_self(place: &[usize]) -> impl Iterator<Item = &[usize]> {
    (0..=place.len()).map(move |n| &place[..n])
}

/// The subtree at `p1` in `t1` and the subtree at `p2` in `t2` are the same,
/// given that each tree names the variables bound above them consistently.
pub(crate) fn same_subtree(t1: &Node, p1: &[usize], t2: &Node, p2: &[usize]) -> bool {
    match (t1.full_string_at(p1), t2.full_string_at(p2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Draw `n` proposals and check how often each tree appears against
/// `exp(log_probability)`. Failed proposals count towards `n`. Returns the
/// total probability of the trees seen.
#[cfg(test)]
pub(crate) fn assert_frequencies<P, L>(n: usize, tolerance: f64, mut propose: P, log_probability: L) -> f64
where
    P: FnMut() -> Option<Node>,
    L: Fn(&Node) -> f64,
{
    let mut counts: std::collections::HashMap<Node, usize> = std::collections::HashMap::new();
    for _ in 0..n {
        if let Some(t2) = propose() {
            *counts.entry(t2).or_insert(0) += 1;
        }
    }
    let mut seen = 0.0;
    for (t2, &count) in &counts {
        let observed = count as f64 / n as f64;
        let expected = log_probability(t2).exp();
        assert!(
            (observed - expected).abs() < tolerance,
            "{}: {} vs {}",
            t2,
            observed,
            expected
        );
        seen += expected;
    }
    assert!(seen <= 1.0 + 1e-9, "{}", seen);
    seen
}
