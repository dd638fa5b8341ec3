use crate::grammar::Grammar;
use crate::hypotheses::{ProbabilisticModel, Sample};
use crate::inference::{Control, MetropolisHastings};
use crate::proposal::Proposer;
use crate::SampleError;
use rand::prelude::*;

/// A pool of `MetropolisHastings` chains run round-robin.
pub struct ChainPool<'a, M>
where
    M: ProbabilisticModel,
{
    /// The pool of chains.
    pool: Vec<MetropolisHastings<'a, M>>,
    /// The number of steps to take before switching chains.
    pub steps: usize,
    /// The number of milliseconds to run before switching chains (0 for no limit).
    pub runtime: usize,
}

impl<'a, M> ChainPool<'a, M>
where
    M: ProbabilisticModel,
{
    /// Construct a pool of `size` chains, each started from the prior.
    pub fn new<R: Rng>(
        grammar: &'a Grammar,
        model: &'a M,
        data: &'a [M::Datum],
        proposer: Proposer,
        size: usize,
        rng: &mut R,
    ) -> Result<Self, SampleError> {
        let pool = (0..size)
            .map(|_| MetropolisHastings::from_prior(grammar, model, data, proposer.clone(), rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChainPool {
            pool,
            steps: 100,
            runtime: 0,
        })
    }
    pub fn len(&self) -> usize {
        self.pool.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
    pub fn chains(&self) -> &[MetropolisHastings<'a, M>] {
        &self.pool
    }
    /// Return the number of samples collected by each chain.
    pub fn samples(&self) -> Vec<usize> {
        self.pool.iter().map(|chain| chain.samples()).collect()
    }
    /// Change the data available to the pool, and optionally update the
    /// posterior of the current samples.
    pub fn set_data(&mut self, data: &'a [M::Datum], recompute_posterior: bool) -> Result<(), SampleError> {
        for chain in self.pool.iter_mut() {
            chain.set_data(data, recompute_posterior)?;
        }
        Ok(())
    }
    /// Run the pool without termination conditions.
    pub fn run_forever<R, F>(&mut self, mut ctl: Control, rng: &mut R, callback: F) -> Result<(), SampleError>
    where
        R: Rng,
        F: FnMut(usize, &Sample),
    {
        ctl.steps = 0;
        ctl.runtime = 0;
        self.run(ctl, rng, callback)
    }
    /// Run the pool, calling `callback` with the chain index and each
    /// reported sample.
    pub fn run<R, F>(&mut self, mut ctl: Control, rng: &mut R, mut callback: F) -> Result<(), SampleError>
    where
        R: Rng,
        F: FnMut(usize, &Sample),
    {
        if self.pool.is_empty() {
            return Ok(());
        }
        let pool_size = self.pool.len();
        let mut index = 0;
        ctl.start();
        while ctl.running() {
            let which = index % pool_size;
            let chain = &mut self.pool[which];

            // Store how many samples we did so we can track the total number.
            let old_samples = chain.samples();

            let steps = if ctl.steps > 0 {
                self.steps.max(1).min(ctl.steps + 1 - ctl.done_steps)
            } else {
                self.steps.max(1)
            };
            let sub = Control::new(steps, self.runtime, ctl.burn, ctl.thin, ctl.restart, ctl.print);
            chain.run(sub, rng, |sample| callback(which, sample))?;

            // `running` already counted one of these.
            ctl.done_steps += (chain.samples() - old_samples).saturating_sub(1);

            index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Kernel;
    use crate::tree::Node;
    use rand::rngs::StdRng;

    struct Uninformative;
    impl ProbabilisticModel for Uninformative {
        type Datum = ();
        fn single_log_likelihood(&self, _tree: &Node, _datum: &()) -> f64 {
            0.0
        }
    }

    #[test]
    fn pool_shares_the_step_budget() {
        let mut g = Grammar::new("BOOL");
        g.add_rule("BOOL", "not_", Some(vec!["BOOL"]), 1.0).unwrap();
        g.add_rule("BOOL", "True", None, 2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let proposer = Proposer::new(Kernel::Regeneration);
        let mut pool = ChainPool::new(&g, &Uninformative, &[], proposer, 3, &mut rng).unwrap();
        pool.steps = 7;
        let mut seen = vec![0; 3];
        pool.run(Control::new(50, 0, 0, 0, 0, 0), &mut rng, |i, _| seen[i] += 1)
            .unwrap();
        assert_eq!(pool.samples().iter().sum::<usize>(), 50);
        assert_eq!(seen, pool.samples());
        assert!(seen.iter().all(|&n| n > 0));
    }
}
