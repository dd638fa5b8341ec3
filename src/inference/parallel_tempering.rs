use crate::grammar::Grammar;
use crate::hypotheses::{ProbabilisticModel, Sample, Temperable};
use crate::inference::{Control, MetropolisHastings};
use crate::proposal::Proposer;
use crate::tree::Node;
use crate::utilities::{FHBool, FiniteHistory};
use crate::SampleError;
use log::trace;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Likelihood temperatures, lowest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLadder(pub Vec<f64>);

/// Specifications for constructing a `TemperatureLadder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemperatureLadderSpec {
    /// The number of temperatures and the highest temperature, spaced
    /// geometrically up from 1.0.
    SizeAndMax(usize, f64),
    /// Every temperature, given explicitly.
    Explicit(Vec<f64>),
}

impl TemperatureLadderSpec {
    /// ```
    /// # use lotinduction::inference::TemperatureLadderSpec;
    /// let ladder = TemperatureLadderSpec::SizeAndMax(3, 4.0).make();
    /// assert_eq!(ladder.0.len(), 3);
    /// assert!((ladder.0[1] - 2.0).abs() < 1e-12);
    /// ```
    pub fn make(self) -> TemperatureLadder {
        match self {
            TemperatureLadderSpec::Explicit(ladder) => TemperatureLadder(ladder),
            TemperatureLadderSpec::SizeAndMax(size, max) => {
                if size <= 1 {
                    TemperatureLadder(vec![1.0])
                } else {
                    TemperatureLadder(
                        (0..size)
                            .map(|rung| (rung as f64 * max.ln() / ((size - 1) as f64)).exp())
                            .collect(),
                    )
                }
            }
        }
    }
}

/// A pool of `MetropolisHastings` chains at increasing likelihood
/// temperatures, whose states are occasionally swapped between neighbours.
pub struct ParallelTempering<'a, M>
where
    M: ProbabilisticModel,
{
    /// The pool of chains, coldest first.
    pool: Vec<MetropolisHastings<'a, M>>,
    /// Propose a swap every `swap` samples (0 to never swap).
    pub swap: usize,
    /// A record of whether swaps between chains `k - 1` and `k` occurred.
    swapped: Vec<FiniteHistory<FHBool>>,
    /// The next chain to run.
    index: usize,
    /// Samples taken since the last swap proposal.
    since_swap: usize,
}

impl<'a, M> ParallelTempering<'a, M>
where
    M: ProbabilisticModel,
{
    /// Construct a pool with one chain per rung of `ladder`. The coldest chain
    /// starts at `h0`; the rest start from the prior.
    pub fn new<R: Rng>(
        grammar: &'a Grammar,
        model: &'a M,
        data: &'a [M::Datum],
        proposer: Proposer,
        h0: Node,
        ladder: TemperatureLadder,
        swap: usize,
        rng: &mut R,
    ) -> Result<Self, SampleError> {
        let mut pool = Vec::with_capacity(ladder.0.len());
        for (i, t) in ladder.0.iter().enumerate() {
            let mut chain = MetropolisHastings::new(grammar, model, data, proposer.clone(), h0.clone())?;
            if i > 0 {
                chain.restart(rng)?;
            }
            chain.temperatures.likelihood = *t;
            pool.push(chain);
        }
        let swapped = (0..pool.len()).map(|_| FiniteHistory::new(100)).collect();
        Ok(ParallelTempering {
            pool,
            swap,
            swapped,
            index: 0,
            since_swap: 0,
        })
    }
    pub fn chains(&self) -> &[MetropolisHastings<'a, M>] {
        &self.pool
    }
    /// Return the likelihood temperature of each chain.
    pub fn temperatures(&self) -> Vec<f64> {
        self.pool.iter().map(|chain| chain.temperatures.likelihood).collect()
    }
    /// Return the number of samples collected by each chain.
    pub fn samples(&self) -> Vec<usize> {
        self.pool.iter().map(|chain| chain.samples()).collect()
    }
    /// Return the acceptance ratio of each chain.
    pub fn acceptance_ratio(&self) -> Vec<f64> {
        self.pool.iter().map(|chain| chain.acceptance_ratio()).collect()
    }
    /// Return, for each chain after the first, the fraction of recent swap
    /// proposals with its colder neighbour that were accepted.
    pub fn swap_ratio(&self) -> Vec<f64> {
        self.swapped.iter().skip(1).map(|h| h.mean()).collect()
    }
    /// Change the data available to the pool, and optionally update the
    /// posterior of the current samples.
    pub fn set_data(&mut self, data: &'a [M::Datum], recompute_posterior: bool) -> Result<(), SampleError> {
        for chain in self.pool.iter_mut() {
            chain.set_data(data, recompute_posterior)?;
        }
        Ok(())
    }
    /// Advance the next chain until it reports a sample, returning the chain's
    /// index and the sample, or `None` once `ctl` says to stop.
    pub fn internal_next<'b, R: Rng>(
        &'b mut self,
        ctl: &mut Control,
        rng: &mut R,
    ) -> Result<Option<(usize, &'b Sample)>, SampleError> {
        if self.pool.is_empty() {
            return Ok(None);
        }
        if !ctl.started() {
            ctl.start();
        }
        self.maybe_swap(rng);
        let which = self.index % self.pool.len();
        self.index += 1;
        self.since_swap += 1;
        Ok(self.pool[which]
            .internal_next(ctl, rng)?
            .map(|sample| (which, sample)))
    }
    /// Run the pool, calling `callback` with the chain index and each
    /// reported sample.
    pub fn run<R, F>(&mut self, mut ctl: Control, rng: &mut R, mut callback: F) -> Result<(), SampleError>
    where
        R: Rng,
        F: FnMut(usize, &Sample),
    {
        ctl.start();
        while let Some((which, sample)) = self.internal_next(&mut ctl, rng)? {
            callback(which, sample);
        }
        Ok(())
    }
    /// Propose swapping the states of a random pair of neighbouring chains.
    fn swap<R: Rng>(&mut self, rng: &mut R) {
        if self.pool.len() < 2 {
            return;
        }
        // Swap k and k-1.
        let k = 1 + rng.gen_range(0..self.pool.len() - 1);
        let (t_lo, t_hi) = (
            self.pool[k - 1].temperatures.likelihood,
            self.pool[k].temperatures.likelihood,
        );

        let now = self.pool[k - 1].at_temperature(t_lo) + self.pool[k].at_temperature(t_hi);
        let swapped = self.pool[k - 1].at_temperature(t_hi) + self.pool[k].at_temperature(t_lo);
        let r = swapped - now;

        let accept = !r.is_nan() && (r >= 0.0 || rng.gen::<f64>() < r.exp());
        if accept {
            let (left, right) = self.pool.split_at_mut(k);
            std::mem::swap(&mut left[k - 1].current, &mut right[0].current);
        }
        trace!("swap {} <-> {}: {}", k - 1, k, accept);
        self.swapped[k].add(FHBool(accept));
    }
    fn maybe_swap<R: Rng>(&mut self, rng: &mut R) {
        if self.swap > 0 && self.since_swap >= self.swap {
            self.swap(rng);
            self.since_swap = 0;
        }
    }
}
