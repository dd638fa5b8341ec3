//! Search and inference algorithms.

mod chain_pool;
mod control;
mod mcmc;
mod parallel_tempering;
pub use self::{
    chain_pool::ChainPool,
    control::Control,
    mcmc::{mh_acceptance, mh_log_ratio, MetropolisHastings},
    parallel_tempering::{ParallelTempering, TemperatureLadder, TemperatureLadderSpec},
};
