//! A library for sampling, scoring, and searching over expression trees drawn
//! from probabilistic context-free grammars with bound variables.
//!
//! A [`Grammar`] maps nonterminals to weighted expansion rules. Some rules are
//! _binders_: using one introduces a fresh bound-variable rule that is visible
//! only inside the body of the resulting node. Every traversal that depends on
//! the visible rule set (generation, scoring, enumeration, packing) threads a
//! [`Scope`] through the tree and brackets each descent with a [`ScopeGuard`].
//!
//! [`Proposer`]s rewrite trees and compute exact proposal probabilities, and
//! [`MetropolisHastings`] uses them to sample from a posterior supplied by a
//! [`ProbabilisticModel`].
//!
//! # Example
//!
//! ```
//! # use lotinduction::{Grammar, Kernel, Proposer};
//! # use rand::{rngs::StdRng, SeedableRng};
//! let mut g = Grammar::new("START");
//! g.add_rule("START", "", Some(vec!["BOOL"]), 1.0).unwrap();
//! g.add_rule("BOOL", "and_", Some(vec!["BOOL", "BOOL"]), 1.0).unwrap();
//! g.add_rule("BOOL", "True", None, 1.0).unwrap();
//! g.add_rule("BOOL", "False", None, 1.0).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let tree = g.generate("START", &mut rng).unwrap();
//! assert!(g.log_probability(&tree).unwrap() < 0.0);
//!
//! let packed = g.pack(&tree).unwrap();
//! assert_eq!(g.unpack(&packed).unwrap(), tree);
//!
//! let proposer = Proposer::new(Kernel::Regeneration);
//! let (proposal, fb) = proposer.propose(&g, &tree, &mut rng).unwrap();
//! assert!(fb.is_finite());
//! # let _ = proposal;
//! ```
//!
//! [`Grammar`]: grammar/struct.Grammar.html
//! [`Scope`]: grammar/struct.Scope.html
//! [`ScopeGuard`]: grammar/struct.ScopeGuard.html
//! [`Proposer`]: proposal/struct.Proposer.html
//! [`MetropolisHastings`]: inference/struct.MetropolisHastings.html
//! [`ProbabilisticModel`]: hypotheses/trait.ProbabilisticModel.html

pub mod grammar;
pub mod hypotheses;
pub mod inference;
pub mod proposal;
pub mod tree;
pub mod utilities;

pub use crate::grammar::{BinderSpec, GenerationLimit, Grammar, Rule, RuleKind, Scope, ScopeGuard, Signature};
pub use crate::proposal::{Kernel, Proposer, Resample, WeightedKernel};
pub use crate::tree::{Arg, Node, NodeKind, Place};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
/// The error type for inconsistencies between a tree and a grammar. These are
/// logic errors and are never retried.
pub enum GrammarError {
    /// Zero or several visible rules share the node's signature.
    Match { signature: Signature, count: usize },
    /// A bound variable was referenced outside the binder that introduced it.
    ScopeViolation(String),
    UnknownNonterminal(String),
    /// No node lives at the given place.
    InvalidPlace(Vec<usize>),
    InvalidWeight { nonterminal: String, name: String, weight: f64 },
    Pack(PackError),
}
impl From<PackError> for GrammarError {
    fn from(e: PackError) -> Self {
        GrammarError::Pack(e)
    }
}
impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GrammarError::Match {
                ref signature,
                count,
            } => write!(f, "{} rules match signature {}", count, signature),
            GrammarError::ScopeViolation(ref name) => {
                write!(f, "bound variable {} used outside its binder", name)
            }
            GrammarError::UnknownNonterminal(ref nt) => write!(f, "unknown nonterminal {}", nt),
            GrammarError::InvalidPlace(ref place) => write!(f, "no node at place {:?}", place),
            GrammarError::InvalidWeight {
                ref nonterminal,
                ref name,
                weight,
            } => write!(
                f,
                "rule {} -> {} has non-positive weight {}",
                nonterminal, name, weight
            ),
            GrammarError::Pack(ref e) => write!(f, "pack error: {}", e),
        }
    }
}
impl std::error::Error for GrammarError {}

#[derive(Debug, Clone, PartialEq)]
/// The error type for the compact tree serialization.
pub enum PackError {
    /// A rule index has no character in the packing alphabet.
    Overflow(usize),
    UnknownCharacter(char),
    UnknownIndex(usize),
    /// The rule at an index expands a different nonterminal than expected.
    Mismatch { expected: String, found: String },
    Truncated,
    TrailingInput(usize),
}
impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PackError::Overflow(idx) => write!(f, "rule index {} exceeds the alphabet", idx),
            PackError::UnknownCharacter(c) => write!(f, "character {:?} is not in the alphabet", c),
            PackError::UnknownIndex(idx) => write!(f, "no visible rule has index {}", idx),
            PackError::Mismatch {
                ref expected,
                ref found,
            } => write!(f, "expected a rule for {}, found one for {}", expected, found),
            PackError::Truncated => write!(f, "input ended early"),
            PackError::TrailingInput(n) => write!(f, "{} unread characters", n),
        }
    }
}
impl std::error::Error for PackError {}

#[derive(Debug, Clone, PartialEq)]
/// The error type for sampling operations.
pub enum SampleError {
    Grammar(GrammarError),
    /// Generation exceeded a node-count or depth ceiling.
    SizeExceeded,
    /// Weighted subnode sampling found no node with positive weight.
    SamplingExhausted,
    /// A proposal found no eligible edit site.
    ProposalFailed,
}
impl SampleError {
    /// `true` for failures that a fresh random draw may avoid.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SampleError::Grammar(_))
    }
}
impl From<GrammarError> for SampleError {
    fn from(e: GrammarError) -> Self {
        SampleError::Grammar(e)
    }
}
impl From<PackError> for SampleError {
    fn from(e: PackError) -> Self {
        SampleError::Grammar(GrammarError::Pack(e))
    }
}
impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SampleError::Grammar(ref e) => write!(f, "grammar error: {}", e),
            SampleError::SizeExceeded => write!(f, "exceeded maximum size"),
            SampleError::SamplingExhausted => write!(f, "failed to sample (options exhausted)"),
            SampleError::ProposalFailed => write!(f, "proposal failed"),
        }
    }
}
impl std::error::Error for SampleError {}
