//! Tools for scoring trees as hypotheses.

use crate::grammar::Grammar;
use crate::tree::Node;
use crate::utilities::f64_eq;
use crate::GrammarError;
use serde::{Deserialize, Serialize};
use std::{
    f64::{NAN, NEG_INFINITY},
    fmt,
    hash::{Hash, Hasher},
};

pub trait Temperable {
    fn at_temperature(&self, t: f64) -> f64;
}

/// A container for the components of a Bayesian posterior probability.
#[derive(Copy, Clone, Debug)]
pub struct BayesScore {
    pub prior: f64,
    pub likelihood: f64,
    pub posterior: f64,
}
impl BayesScore {
    /// The posterior with the prior and likelihood tempered separately.
    pub fn at_temperatures(&self, t: &Temperatures) -> f64 {
        if self.prior == NEG_INFINITY {
            NEG_INFINITY
        } else {
            self.prior / t.prior + self.likelihood / t.likelihood
        }
    }
}

/// Temperatures for the prior, the likelihood, and the acceptance ratio of a
/// Metropolis-Hastings chain.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub prior: f64,
    pub likelihood: f64,
    pub acceptance: f64,
}
impl Default for Temperatures {
    fn default() -> Self {
        Temperatures {
            prior: 1.0,
            likelihood: 1.0,
            acceptance: 1.0,
        }
    }
}

/// The grammar log-probability of `tree`, or negative infinity if it has
/// more than `max_nodes` nodes.
pub fn pcfg_log_prior(grammar: &Grammar, tree: &Node, max_nodes: usize) -> Result<f64, GrammarError> {
    if tree.count_nodes() > max_nodes {
        Ok(NEG_INFINITY)
    } else {
        grammar.log_probability(tree)
    }
}

/// A posterior over trees: a prior and a likelihood of observed data.
///
/// # Example
///
/// ```
/// # use lotinduction::grammar::Grammar;
/// # use lotinduction::hypotheses::ProbabilisticModel;
/// # use lotinduction::tree::Node;
/// struct CountsNodes;
/// impl ProbabilisticModel for CountsNodes {
///     type Datum = usize;
///     fn single_log_likelihood(&self, tree: &Node, datum: &usize) -> f64 {
///         if tree.count_nodes() == *datum { 0.0 } else { -1.0 }
///     }
/// }
///
/// let mut g = Grammar::new("BOOL");
/// g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
/// g.add_rule("BOOL", "True", None, 1.0).unwrap();
/// let tree = g.unpack("01").unwrap();
///
/// let score = CountsNodes.log_posterior(&g, &tree, &[2, 2, 3]).unwrap();
/// assert!((score.prior - 0.25f64.ln()).abs() < 1e-12);
/// assert_eq!(score.likelihood, -1.0);
/// assert_eq!(score.posterior, score.prior + score.likelihood);
/// ```
pub trait ProbabilisticModel {
    type Datum;
    /// The log prior of `tree`; by default its grammar log-probability.
    fn log_prior(&self, grammar: &Grammar, tree: &Node) -> Result<f64, GrammarError> {
        grammar.log_probability(tree)
    }
    fn single_log_likelihood(&self, tree: &Node, datum: &Self::Datum) -> f64;
    /// The log likelihood of `data`, stopping early once it falls below
    /// `breakout`.
    fn log_likelihood(&self, tree: &Node, data: &[Self::Datum], breakout: Option<f64>) -> f64 {
        let breakout = breakout.unwrap_or(NEG_INFINITY);
        let mut likelihood = 0.0;
        for datum in data {
            likelihood += self.single_log_likelihood(tree, datum);

            // Break if the likelihood is garbage.
            if likelihood == NEG_INFINITY || likelihood.is_nan() {
                break;
            };

            // Break if likelihood is too low.
            if likelihood < breakout {
                likelihood = NEG_INFINITY;
                break;
            }
        }
        likelihood
    }
    /// Score `tree`. The likelihood is skipped, and left as NaN, when the
    /// prior is negative infinity.
    fn log_posterior(
        &self,
        grammar: &Grammar,
        tree: &Node,
        data: &[Self::Datum],
    ) -> Result<BayesScore, GrammarError> {
        let prior = self.log_prior(grammar, tree)?;
        if prior == NEG_INFINITY {
            Ok(BayesScore {
                prior,
                likelihood: NAN,
                posterior: NEG_INFINITY,
            })
        } else {
            let likelihood = self.log_likelihood(tree, data, None);
            Ok(BayesScore {
                prior,
                likelihood,
                posterior: prior + likelihood,
            })
        }
    }
}

/// A tree together with its score.
#[derive(Clone, Debug)]
pub struct Sample {
    pub tree: Node,
    pub score: BayesScore,
}
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}
impl Eq for Sample {}
impl Hash for Sample {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.4}\t{:.4}\t{:.4}\t{}",
            self.score.posterior, self.score.prior, self.score.likelihood, self.tree
        )
    }
}
impl Temperable for Sample {
    fn at_temperature(&self, t: f64) -> f64 {
        if self.score.prior == NEG_INFINITY {
            NEG_INFINITY
        } else {
            self.score.prior + self.score.likelihood / t
        }
    }
}

impl PartialEq for BayesScore {
    fn eq(&self, other: &Self) -> bool {
        f64_eq(self.prior, other.prior)
            && f64_eq(self.likelihood, other.likelihood)
            && f64_eq(self.posterior, other.posterior)
    }
}

impl Eq for BayesScore {}

impl Default for BayesScore {
    fn default() -> Self {
        BayesScore {
            prior: NAN,
            likelihood: NAN,
            posterior: NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;
    impl ProbabilisticModel for Flat {
        type Datum = f64;
        fn single_log_likelihood(&self, _tree: &Node, datum: &f64) -> f64 {
            *datum
        }
    }

    fn grammar() -> Grammar {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "True", None, 1.0).unwrap();
        g
    }

    #[test]
    fn likelihood_breaks_out_early() {
        let g = grammar();
        let tree = g.unpack("1").unwrap();
        assert_eq!(Flat.log_likelihood(&tree, &[-1.0, -2.0], None), -3.0);
        assert_eq!(
            Flat.log_likelihood(&tree, &[-1.0, -2.0], Some(-2.5)),
            NEG_INFINITY
        );
    }

    #[test]
    fn oversized_trees_have_no_prior_mass() {
        let g = grammar();
        let tree = g.unpack("0001").unwrap();
        assert_eq!(pcfg_log_prior(&g, &tree, 3).unwrap(), NEG_INFINITY);
        let lp = pcfg_log_prior(&g, &tree, 4).unwrap();
        assert!((lp - 16f64.recip().ln()).abs() < 1e-12);
    }

    #[test]
    fn tempering_ignores_unscored_likelihoods() {
        let score = BayesScore {
            prior: NEG_INFINITY,
            likelihood: NAN,
            posterior: NEG_INFINITY,
        };
        assert_eq!(score.at_temperatures(&Temperatures::default()), NEG_INFINITY);
        let score = BayesScore {
            prior: -2.0,
            likelihood: -4.0,
            posterior: -6.0,
        };
        let t = Temperatures {
            prior: 2.0,
            likelihood: 4.0,
            acceptance: 1.0,
        };
        assert_eq!(score.at_temperatures(&t), -2.0);
    }

    #[test]
    fn temperatures_deserialize_from_config() {
        let t: Temperatures =
            serde_json::from_str(r#"{"prior": 1.0, "likelihood": 10.0, "acceptance": 0.5}"#).unwrap();
        assert_eq!(t.likelihood, 10.0);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(serde_json::from_str::<Temperatures>(&json).unwrap(), t);
    }
}
