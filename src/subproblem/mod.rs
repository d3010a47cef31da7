//! Local models of the nonlinear problem and the solvers that produce
//! candidate directions from them.

mod interior_point;
mod lp;
mod qp;

pub use interior_point::PrimalDualSubproblem;
pub use lp::LpSubproblem;
pub use qp::QpSubproblem;

use anyhow::{bail, Context};

use crate::direction::{ConstraintPartition, ConstraintSide, Direction};
use crate::error::Fault;
use crate::iterate::{Iterate, Multipliers};
use crate::math::NormKind;
use crate::options::Options;
use crate::problem::Range;
use crate::scaling::ScaledProblem;
use crate::sparse::SparseVector;

/// Backends report absolute dual estimates; the direction carries
/// displacements that are added to the current multipliers at full step.
pub(crate) fn compute_dual_displacements(current: &Multipliers, direction: &mut Direction) {
    for (d, c) in direction
        .multipliers
        .constraints
        .iter_mut()
        .zip(&current.constraints)
    {
        *d -= c;
    }
    for (d, c) in direction
        .multipliers
        .lower_bounds
        .iter_mut()
        .zip(&current.lower_bounds)
    {
        *d -= c;
    }
    for (d, c) in direction
        .multipliers
        .upper_bounds
        .iter_mut()
        .zip(&current.upper_bounds)
    {
        *d -= c;
    }
}

/// Displacement model shared by the subproblem variants. The constraint
/// relaxation layer mutates it directly when it introduces elastic
/// variables or rewrites the objective for the feasibility problem.
pub struct LocalModel {
    /// Number of active variables (original + currently added elastics).
    pub number_variables: usize,
    pub max_number_variables: usize,
    pub number_constraints: usize,
    /// Displacement bounds `{xl - x, xu - x}`, optionally intersected with
    /// the trust region on the original coordinates.
    pub variable_bounds: Vec<Range>,
    /// Displacement bounds `{cl - c, cu - c}` of the linearized constraints.
    pub constraint_bounds: Vec<Range>,
    pub objective_gradient: SparseVector,
    pub constraint_jacobian: Vec<SparseVector>,
    pub constraint_multipliers: Vec<f64>,
    pub initial_point: Vec<f64>,
}

impl LocalModel {
    pub fn new(
        number_variables: usize,
        max_number_variables: usize,
        number_constraints: usize,
    ) -> Self {
        Self {
            number_variables,
            max_number_variables,
            number_constraints,
            variable_bounds: vec![Range::UNBOUNDED; max_number_variables],
            constraint_bounds: vec![Range::UNBOUNDED; number_constraints],
            objective_gradient: SparseVector::with_capacity(max_number_variables),
            constraint_jacobian: vec![SparseVector::new(); number_constraints],
            constraint_multipliers: vec![0.0; number_constraints],
            initial_point: vec![0.0; max_number_variables],
        }
    }

    /// Bounds intersected with the trust region, on the original variables
    /// only.
    pub fn set_variable_displacement_bounds(
        &mut self,
        problem: &ScaledProblem,
        iterate: &Iterate,
        trust_region_radius: f64,
    ) {
        for (i, range) in problem.variable_bounds().iter().enumerate() {
            let lower = f64::max(-trust_region_radius, range.lower - iterate.x[i]);
            let upper = f64::min(trust_region_radius, range.upper - iterate.x[i]);
            self.variable_bounds[i] = Range::new(lower, upper);
        }
    }

    pub fn set_constraint_displacement_bounds(&mut self, problem: &ScaledProblem, c: &[f64]) {
        for (j, range) in problem.constraint_bounds().iter().enumerate() {
            self.constraint_bounds[j] = Range::new(range.lower - c[j], range.upper - c[j]);
        }
    }

    /// One-sided bounds of the feasibility problem, relative to the
    /// violated side of each offending constraint.
    pub fn set_feasibility_bounds(
        &mut self,
        problem: &ScaledProblem,
        c: &[f64],
        partition: &ConstraintPartition,
    ) {
        for (j, range) in problem.constraint_bounds().iter().enumerate() {
            self.constraint_bounds[j] = match partition.side[j] {
                ConstraintSide::InfeasibleLower => Range::upper_bounded(range.lower - c[j]),
                ConstraintSide::InfeasibleUpper => Range::lower_bounded(range.upper - c[j]),
                ConstraintSide::Feasible => Range::new(range.lower - c[j], range.upper - c[j]),
            };
        }
    }

    /// Objective of the feasibility problem: sum of the gradients of the
    /// infeasible constraints, signed by the violated side.
    pub fn set_feasibility_objective(
        &mut self,
        jacobian: &[SparseVector],
        partition: &ConstraintPartition,
    ) {
        self.objective_gradient.clear();
        for &j in &partition.infeasible {
            for (i, derivative) in jacobian[j].iter() {
                if partition.side[j] == ConstraintSide::InfeasibleLower {
                    self.objective_gradient.add(i, -derivative);
                } else {
                    self.objective_gradient.add(i, derivative);
                }
            }
        }
    }

    pub fn reset_initial_point(&mut self) {
        self.initial_point.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Model-predicted decrease of the subproblem objective, reusable for any
/// step length without recomputing the quadratic term.
#[derive(Debug, Clone, Copy)]
pub struct PredictedReduction {
    pub linear_term: f64,
    pub quadratic_term: f64,
}

impl PredictedReduction {
    /// Predicted decrease at step length `alpha`:
    /// `-alpha*(g'd + alpha * 1/2 d'Hd)`.
    pub fn evaluate(&self, step_length: f64) -> f64 {
        -step_length * (self.linear_term + step_length * self.quadratic_term)
    }
}

/// Local approximation of the nonlinear problem.
pub trait Subproblem {
    /// Called once; may move the initial point (interior methods push
    /// bounded variables strictly inside their bounds).
    fn initialize(&mut self, problem: &ScaledProblem, iterate: &mut Iterate) -> Result<(), Fault>;

    /// Assembles the objective model, the linearized constraints and the
    /// displacement bounds at the current iterate.
    fn create_current_subproblem(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
        trust_region_radius: f64,
    ) -> Result<(), Fault>;

    /// Replaces only the objective model (steering rule, restoration).
    fn build_objective_model(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
    ) -> Result<(), Fault>;

    fn solve(&mut self, problem: &ScaledProblem, iterate: &Iterate) -> Result<Direction, Fault>;

    fn predicted_reduction(&self, direction: &Direction) -> PredictedReduction;

    /// Mitigates the Maratos effect on rejected steps; `None` when the
    /// variant has no correction.
    fn second_order_correction(
        &mut self,
        problem: &ScaledProblem,
        trial_iterate: &mut Iterate,
    ) -> Result<Option<Direction>, Fault> {
        let _ = (problem, trial_iterate);
        Ok(None)
    }

    /// Progress measures of the optimality phase: L1 constraint violation
    /// and objective.
    fn compute_progress_measures(
        &self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        let c = iterate.evaluate_constraints(problem)?.to_vec();
        let infeasibility = problem.constraint_violation(&c, NormKind::L1);
        let objective = iterate.evaluate_objective(problem)?;
        iterate.progress = crate::iterate::Progress {
            infeasibility,
            objective,
        };
        Ok(())
    }

    fn set_initial_point(&mut self, point: &[f64]);

    fn model(&self) -> &LocalModel;

    fn model_mut(&mut self) -> &mut LocalModel;

    /// Registers an accepted iterate (quasi-Newton curvature updates).
    fn register_accepted_iterate(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        let _ = (problem, iterate);
        Ok(())
    }

    fn hessian_evaluations(&self) -> usize;

    fn subproblems_solved(&self) -> usize;

    /// True once when the subproblem parameterization changed (barrier or
    /// penalty update); clears the flag.
    fn definition_changed(&mut self) -> bool {
        false
    }
}

/// Runtime selection of the subproblem variant from the option map.
pub fn create_subproblem(
    options: &Options,
    problem: &ScaledProblem,
    max_number_variables: usize,
) -> anyhow::Result<Box<dyn Subproblem>> {
    let variant = options.get_str("subproblem", "QP");
    match variant {
        "QP" => Ok(Box::new(
            QpSubproblem::from_options(options, problem, max_number_variables)
                .context("creating QP subproblem")?,
        )),
        "LP" => Ok(Box::new(LpSubproblem::from_options(
            options,
            problem,
            max_number_variables,
        )?)),
        "primal_dual_interior_point" => {
            if max_number_variables != problem.number_variables() {
                bail!("the interior point subproblem does not support elastic variables");
            }
            Ok(Box::new(PrimalDualSubproblem::from_options(
                options, problem,
            )?))
        }
        other => bail!("unknown subproblem variant {other:?}"),
    }
}
