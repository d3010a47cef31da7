//! Constraint relaxation strategies: they turn a possibly-infeasible
//! subproblem into a sequence of well-posed subproblems whose solutions
//! descend toward feasibility and optimality.

mod l1_relaxation;
mod restoration;

pub use l1_relaxation::L1Relaxation;
pub use restoration::FeasibilityRestoration;

use anyhow::bail;

use crate::direction::Direction;
use crate::error::Fault;
use crate::iterate::Iterate;
use crate::options::Options;
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;

/// Phase of the two-phase strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Optimality,
    FeasibilityRestoration,
}

pub trait ConstraintRelaxation {
    fn initialize(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        first_iterate: &mut Iterate,
    ) -> Result<(), Fault>;

    fn create_current_subproblem(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        trust_region_radius: f64,
    ) -> Result<(), Fault>;

    /// Produces a direction that is feasible for (a relaxation of) the
    /// linearized constraints.
    fn compute_feasible_direction(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<Direction, Fault>;

    fn second_order_correction(
        &mut self,
        problem: &ScaledProblem,
        trial_iterate: &mut Iterate,
    ) -> Result<Option<Direction>, Fault>;

    /// Decides acceptance of the trial iterate; on acceptance recomputes
    /// the trial's residuals.
    #[allow(clippy::too_many_arguments)]
    fn is_acceptable(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        trial_iterate: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<bool, Fault>;

    fn register_accepted_iterate(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<(), Fault>;

    /// Penalty parameter of the l1 variant; `None` otherwise.
    fn penalty_parameter(&self) -> Option<f64> {
        None
    }

    fn subproblems_solved(&self) -> usize;

    fn hessian_evaluations(&self) -> usize;
}

pub fn create_constraint_relaxation(
    options: &Options,
    problem: &ScaledProblem,
) -> anyhow::Result<Box<dyn ConstraintRelaxation>> {
    match options.get_str("constraint-relaxation", "feasibility-restoration") {
        "feasibility-restoration" => Ok(Box::new(FeasibilityRestoration::from_options(
            options, problem,
        )?)),
        "l1-relaxation" => Ok(Box::new(L1Relaxation::from_options(options, problem)?)),
        other => bail!("unknown constraint relaxation strategy {other:?}"),
    }
}
