use crate::grammar::Grammar;
use crate::hypotheses::{ProbabilisticModel, Sample, Temperable, Temperatures};
use crate::inference::Control;
use crate::proposal::Proposer;
use crate::tree::Node;
use crate::utilities::{FHBool, FiniteHistory};
use crate::SampleError;
use log::{debug, info, trace, warn};
use rand::prelude::*;
use std::f64::{consts::LN_2, INFINITY, NEG_INFINITY};

/// The log acceptance ratio for moving from a state with (tempered)
/// posterior `current` to one with posterior `proposal`, given the
/// forward-backward term `fb`.
///
/// Pathological states are resolved rather than propagated:
/// - a NaN proposal, or an infinite `fb`, is never accepted;
/// - if both posteriors are negative infinity, the move is accepted with
///   probability 1/2;
/// - otherwise a proposal with negative infinite posterior is never accepted;
/// - otherwise a NaN current posterior accepts with probability 1/2.
pub fn mh_log_ratio(current: f64, proposal: f64, fb: f64, temperature: f64) -> f64 {
    if proposal.is_nan() || fb == INFINITY {
        NEG_INFINITY
    } else if current == NEG_INFINITY && proposal == NEG_INFINITY {
        -LN_2
    } else if proposal == NEG_INFINITY {
        NEG_INFINITY
    } else if current.is_nan() {
        -LN_2
    } else {
        (proposal - current - fb) / temperature
    }
}

/// The Metropolis-Hastings acceptance rule, given a uniform draw `u` from
/// `[0, 1)`.
///
/// ```
/// # use lotinduction::inference::mh_acceptance;
/// use std::f64::{NAN, NEG_INFINITY};
/// assert!(mh_acceptance(-2.0, -1.0, 0.0, 1.0, 0.99));
/// assert!(!mh_acceptance(-1.0, -2.0, 0.0, 1.0, 0.5));
/// assert!(mh_acceptance(-1.0, -2.0, 0.0, 1.0, 0.3));
/// assert!(!mh_acceptance(-1.0, NAN, 0.0, 1.0, 0.0));
/// assert!(mh_acceptance(NEG_INFINITY, NEG_INFINITY, 0.0, 1.0, 0.4));
/// assert!(!mh_acceptance(NEG_INFINITY, NEG_INFINITY, 0.0, 1.0, 0.6));
/// ```
pub fn mh_acceptance(current: f64, proposal: f64, fb: f64, temperature: f64, u: f64) -> bool {
    let r = mh_log_ratio(current, proposal, fb, temperature);
    r >= 0.0 || u < r.exp()
}

/// A Metropolis-Hastings chain over trees from a grammar.
///
/// # Example
///
/// ```
/// # use lotinduction::grammar::Grammar;
/// # use lotinduction::hypotheses::ProbabilisticModel;
/// # use lotinduction::inference::{Control, MetropolisHastings};
/// # use lotinduction::proposal::{Kernel, Proposer};
/// # use lotinduction::tree::Node;
/// # use rand::{rngs::StdRng, SeedableRng};
/// struct Depth;
/// impl ProbabilisticModel for Depth {
///     type Datum = usize;
///     fn single_log_likelihood(&self, tree: &Node, datum: &usize) -> f64 {
///         -((tree.depth() as f64) - (*datum as f64)).abs()
///     }
/// }
///
/// let mut g = Grammar::new("BOOL");
/// g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
/// g.add_rule("BOOL", "True", None, 1.0).unwrap();
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let data = [3, 3, 3, 3];
/// let proposer = Proposer::new(Kernel::Regeneration);
/// let mut chain = MetropolisHastings::from_prior(&g, &Depth, &data, proposer, &mut rng).unwrap();
/// let mut best = std::f64::NEG_INFINITY;
/// chain
///     .run(Control::new(2000, 0, 0, 0, 0, 0), &mut rng, |s| best = best.max(s.score.posterior))
///     .unwrap();
/// assert_eq!(chain.samples(), 2000);
/// assert!(best.is_finite());
/// ```
pub struct MetropolisHastings<'a, M>
where
    M: ProbabilisticModel,
{
    grammar: &'a Grammar,
    model: &'a M,
    data: &'a [M::Datum],
    proposer: Proposer,
    pub(crate) current: Sample,
    pub temperatures: Temperatures,
    maxval: f64,
    pub(crate) samples: usize,
    proposals: usize,
    acceptances: usize,
    steps_since_improvement: usize,
    history: FiniteHistory<FHBool>,
}

impl<'a, M: ProbabilisticModel> MetropolisHastings<'a, M> {
    /// Construct a chain starting from `h0`.
    pub fn new(
        grammar: &'a Grammar,
        model: &'a M,
        data: &'a [M::Datum],
        proposer: Proposer,
        h0: Node,
    ) -> Result<Self, SampleError> {
        let score = model.log_posterior(grammar, &h0, data)?;
        Ok(MetropolisHastings {
            grammar,
            model,
            data,
            proposer,
            current: Sample { tree: h0, score },
            temperatures: Temperatures::default(),
            maxval: NEG_INFINITY,
            samples: 0,
            proposals: 0,
            acceptances: 0,
            steps_since_improvement: 0,
            history: FiniteHistory::new(100),
        })
    }
    /// Construct a chain starting from a sample from the grammar.
    pub fn from_prior<R: Rng>(
        grammar: &'a Grammar,
        model: &'a M,
        data: &'a [M::Datum],
        proposer: Proposer,
        rng: &mut R,
    ) -> Result<Self, SampleError> {
        let h0 = generate_retrying(grammar, grammar.start(), proposer.max_attempts, rng)?;
        MetropolisHastings::new(grammar, model, data, proposer, h0)
    }
    pub fn with_temperatures(mut self, temperatures: Temperatures) -> Self {
        self.temperatures = temperatures;
        self
    }
    /// Change the data available to the chain, and optionally update the
    /// posterior of the current sample.
    pub fn set_data(&mut self, data: &'a [M::Datum], recompute_posterior: bool) -> Result<(), SampleError> {
        self.data = data;
        if recompute_posterior {
            self.current.score = self.model.log_posterior(self.grammar, &self.current.tree, data)?;
        }
        Ok(())
    }
    /// Return a reference to the current sample.
    pub fn current(&self) -> &Sample {
        &self.current
    }
    /// Return the best posterior seen since the last restart.
    pub fn maxval(&self) -> f64 {
        self.maxval
    }
    /// Return the chain's acceptance ratio over recent proposals.
    pub fn acceptance_ratio(&self) -> f64 {
        self.history.mean()
    }
    pub fn samples(&self) -> usize {
        self.samples
    }
    pub fn proposals(&self) -> usize {
        self.proposals
    }
    pub fn acceptances(&self) -> usize {
        self.acceptances
    }
    /// Replace the current sample with a fresh one from the grammar.
    pub fn restart<R: Rng>(&mut self, rng: &mut R) -> Result<(), SampleError> {
        let nonterminal = self.current.tree.returntype.clone();
        let tree = generate_retrying(self.grammar, &nonterminal, self.proposer.max_attempts, rng)?;
        let score = self.model.log_posterior(self.grammar, &tree, self.data)?;
        self.current = Sample { tree, score };
        self.maxval = self.current.score.posterior;
        self.steps_since_improvement = 0;
        Ok(())
    }
    /// Propose a move and apply the acceptance rule. Returns whether the
    /// proposal was accepted.
    ///
    /// A proposal that fails recoverably is a rejected move: the chain keeps
    /// its current sample. Only grammar errors are returned.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<bool, SampleError> {
        self.proposals += 1;
        let (tree, fb) = match self.proposer.propose_once(self.grammar, &self.current.tree, rng)? {
            Some(proposal) => proposal,
            None => {
                self.history.add(FHBool(false));
                return Ok(false);
            }
        };

        // Duplicates are common, so skip rescoring them.
        let score = if tree == self.current.tree {
            self.current.score
        } else {
            self.model.log_posterior(self.grammar, &tree, self.data)?
        };
        let proposal = Sample { tree, score };

        let current = self.current.score.at_temperatures(&self.temperatures);
        let candidate = proposal.score.at_temperatures(&self.temperatures);
        if current.is_nan() || candidate.is_nan() || fb.is_infinite() {
            warn!(
                "pathological proposal: current {}, candidate {}, fb {}",
                current, candidate, fb
            );
        }
        let accepted = mh_acceptance(
            current,
            candidate,
            fb,
            self.temperatures.acceptance,
            rng.gen::<f64>(),
        );
        trace!("{} {}", if accepted { "accepted" } else { "rejected" }, proposal);
        if accepted {
            self.current = proposal;
            self.acceptances += 1;
        }
        self.history.add(FHBool(accepted));
        Ok(accepted)
    }
    /// Advance the chain until a sample is due, returning it, or `None` once
    /// `ctl` says to stop.
    pub fn internal_next<'b, R: Rng>(
        &'b mut self,
        ctl: &mut Control,
        rng: &mut R,
    ) -> Result<Option<&'b Sample>, SampleError> {
        if !ctl.started() {
            ctl.start();
        }
        while ctl.running() {
            // Track top-hypothesis improvements.
            if self.current.score.posterior > self.maxval {
                self.maxval = self.current.score.posterior;
                self.steps_since_improvement = 0;
            } else {
                self.steps_since_improvement += 1;
            }

            // Manage restarts.
            if ctl.restart > 0 && self.steps_since_improvement > ctl.restart {
                debug!("restarting after {} steps without improvement", ctl.restart);
                match self.restart(rng) {
                    Ok(()) => (),
                    Err(e) if e.is_recoverable() => {
                        debug!("restart failed, keeping the current sample: {}", e);
                        self.steps_since_improvement = 0;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                self.step(rng)?;
            }
            self.samples += 1;

            if ctl.print > 0 && self.samples % ctl.print == 0 {
                info!(
                    "{}\tacceptance {:.3}\t{}",
                    self.samples,
                    self.acceptance_ratio(),
                    self.current
                );
            }

            if ctl.reporting() {
                return Ok(Some(&self.current));
            }
        }
        Ok(None)
    }
    /// Run the chain, calling `callback` on each reported sample.
    pub fn run<R, F>(&mut self, mut ctl: Control, rng: &mut R, mut callback: F) -> Result<(), SampleError>
    where
        R: Rng,
        F: FnMut(&Sample),
    {
        ctl.start();
        while let Some(sample) = self.internal_next(&mut ctl, rng)? {
            callback(sample);
        }
        Ok(())
    }
    /// Run the chain without termination conditions.
    pub fn run_forever<R, F>(&mut self, mut ctl: Control, rng: &mut R, callback: F) -> Result<(), SampleError>
    where
        R: Rng,
        F: FnMut(&Sample),
    {
        ctl.steps = 0;
        ctl.runtime = 0;
        self.run(ctl, rng, callback)
    }
}

impl<'a, M: ProbabilisticModel> Temperable for MetropolisHastings<'a, M> {
    /// Return the current posterior at likelihood temperature `t`.
    fn at_temperature(&self, t: f64) -> f64 {
        self.current.at_temperature(t)
    }
}

/// Generate from `nonterminal`, retrying recoverable failures.
fn generate_retrying<R: Rng>(
    grammar: &Grammar,
    nonterminal: &str,
    attempts: usize,
    rng: &mut R,
) -> Result<Node, SampleError> {
    let mut last = SampleError::SamplingExhausted;
    for _ in 0..attempts.max(1) {
        match grammar.generate(nonterminal, rng) {
            Ok(tree) => return Ok(tree),
            Err(e) if e.is_recoverable() => last = e,
            Err(e) => return Err(e),
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ratio_edge_cases() {
        use std::f64::NAN;
        assert_eq!(mh_log_ratio(-1.0, -3.0, 1.0, 1.0), -3.0);
        assert_eq!(mh_log_ratio(-1.0, -3.0, 0.0, 2.0), -1.0);
        assert_eq!(mh_log_ratio(NAN, -3.0, 0.0, 1.0), -LN_2);
        assert_eq!(mh_log_ratio(NAN, NAN, 0.0, 1.0), NEG_INFINITY);
        assert_eq!(mh_log_ratio(NEG_INFINITY, NEG_INFINITY, 0.0, 1.0), -LN_2);
        assert_eq!(mh_log_ratio(-1.0, NEG_INFINITY, 0.0, 1.0), NEG_INFINITY);
        assert_eq!(mh_log_ratio(-1.0, 0.0, INFINITY, 1.0), NEG_INFINITY);
        assert_eq!(mh_log_ratio(NEG_INFINITY, -1.0, 0.0, 1.0), INFINITY);
    }
}
