//! Outer globalization mechanisms: per major iteration they request a
//! direction from the constraint relaxation layer and drive the step
//! length or trust-region radius until the trial point is accepted.

mod line_search;
mod trust_line_search;
mod trust_region;

pub use line_search::LineSearch;
pub use trust_line_search::TrustLineSearch;
pub use trust_region::TrustRegion;

use anyhow::bail;

use crate::direction::Direction;
use crate::error::Fault;
use crate::iterate::{Iterate, Multipliers};
use crate::options::Options;
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;

pub trait GlobalizationMechanism {
    fn initialize(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        first_iterate: &mut Iterate,
    ) -> Result<(), Fault>;

    /// Returns an accepted iterate and the norm of the accepted step.
    fn compute_acceptable_iterate(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<(Iterate, f64), Fault>;

    fn penalty_parameter(&self) -> Option<f64>;

    fn subproblems_solved(&self) -> usize;

    fn hessian_evaluations(&self) -> usize;
}

pub fn create_mechanism(
    options: &Options,
    problem: &ScaledProblem,
) -> anyhow::Result<Box<dyn GlobalizationMechanism>> {
    match options.get_str("mechanism", "TR") {
        "LS" => Ok(Box::new(LineSearch::from_options(options, problem)?)),
        "TR" => Ok(Box::new(TrustRegion::from_options(options, problem)?)),
        "TLS" => Ok(Box::new(TrustLineSearch::from_options(options, problem)?)),
        other => bail!("unknown globalization mechanism {other:?}"),
    }
}

fn advance(current: &[f64], displacement: &[f64], step_length: f64) -> Vec<f64> {
    current
        .iter()
        .zip(displacement)
        .map(|(c, d)| c + step_length * d)
        .collect()
}

/// Trial point `x + alpha*d` with the dual variables advanced along the
/// direction's multiplier displacements.
pub(crate) fn assemble_trial_iterate(
    problem: &ScaledProblem,
    current_iterate: &Iterate,
    direction: &Direction,
    step_length: f64,
) -> Iterate {
    let n = problem.number_variables();
    let mut x = current_iterate.x.clone();
    for i in 0..n.min(direction.x.len()) {
        x[i] += step_length * direction.x[i];
    }
    let multipliers = Multipliers {
        constraints: advance(
            &current_iterate.multipliers.constraints,
            &direction.multipliers.constraints,
            step_length,
        ),
        lower_bounds: advance(
            &current_iterate.multipliers.lower_bounds,
            &direction.multipliers.lower_bounds,
            step_length,
        ),
        upper_bounds: advance(
            &current_iterate.multipliers.upper_bounds,
            &direction.multipliers.upper_bounds,
            step_length,
        ),
        objective: direction.objective_multiplier,
    };
    Iterate::new(x, multipliers)
}

/// Bound multipliers of variables sitting on the trust-region face are
/// artifacts of the radius, not true active-set duals: zero them.
pub(crate) fn correct_trust_region_multipliers(
    direction: &mut Direction,
    number_variables: usize,
    radius: f64,
    activity_tolerance: f64,
) {
    if !radius.is_finite() {
        return;
    }
    for k in 0..direction.active_set.bounds.at_upper.len() {
        let i = direction.active_set.bounds.at_upper[k];
        if i < number_variables && (direction.x[i] - radius).abs() <= activity_tolerance {
            direction.multipliers.upper_bounds[i] = 0.0;
        }
    }
    for k in 0..direction.active_set.bounds.at_lower.len() {
        let i = direction.active_set.bounds.at_lower[k];
        if i < number_variables && (direction.x[i] + radius).abs() <= activity_tolerance {
            direction.multipliers.lower_bounds[i] = 0.0;
        }
    }
}
