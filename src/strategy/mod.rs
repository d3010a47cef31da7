//! Step acceptance strategies.

mod filter_strategy;
mod merit;

pub use filter_strategy::FilterStrategy;
pub use merit::MeritStrategy;

use anyhow::bail;

use crate::iterate::{Iterate, Progress};
use crate::options::Options;

/// Decides whether a trial iterate is acceptable from the progress pairs
/// of the current and trial points and the model-predicted reduction.
pub trait GlobalizationStrategy {
    fn initialize(&mut self, first_iterate: &Iterate);

    fn check_acceptance(
        &mut self,
        current: &Progress,
        trial: &Progress,
        objective_multiplier: f64,
        predicted_reduction: f64,
    ) -> bool;

    /// Whether the pair would be acceptable, without mutating any state.
    /// Used by the restoration exit test.
    fn acceptable_pair(&self, infeasibility: f64, objective: f64) -> bool {
        let _ = (infeasibility, objective);
        true
    }

    /// Drops the acceptance history (penalty or barrier update).
    fn reset(&mut self);

    /// Records the iterate's progress without any dominance check.
    fn notify(&mut self, iterate: &Iterate);
}

pub fn create_strategy(options: &Options) -> anyhow::Result<Box<dyn GlobalizationStrategy>> {
    match options.get_str("strategy", "filter") {
        "filter" => Ok(Box::new(FilterStrategy::from_options(options)?)),
        "l1-penalty" => Ok(Box::new(MeritStrategy::from_options(options)?)),
        other => bail!("unknown globalization strategy {other:?}"),
    }
}
