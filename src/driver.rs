use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::Fault;
use crate::iterate::{Iterate, Multipliers};
use crate::mechanism::{create_mechanism, GlobalizationMechanism};
use crate::options::Options;
use crate::problem::Problem;
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;

/// Classification of the final iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Feasible stationary point with a positive objective multiplier.
    FeasibleKktPoint,
    /// Feasible point where the constraint qualification fails.
    FritzJohnPoint,
    /// Infeasible stationary point of the constraint violation.
    InfeasibleKktPoint,
    FeasibleSmallStep,
    InfeasibleSmallStep,
    NotOptimal,
}

impl TerminationStatus {
    /// Exit code a frontend should report: 0 for the successful statuses.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationStatus::FeasibleKktPoint | TerminationStatus::FeasibleSmallStep => 0,
            _ => 1,
        }
    }
}

impl std::fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TerminationStatus::FeasibleKktPoint => "feasible KKT point",
            TerminationStatus::FritzJohnPoint => "Fritz-John point",
            TerminationStatus::InfeasibleKktPoint => "infeasible stationary point",
            TerminationStatus::FeasibleSmallStep => "feasible small step",
            TerminationStatus::InfeasibleSmallStep => "infeasible small step",
            TerminationStatus::NotOptimal => "not optimal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationCounts {
    pub objective: usize,
    pub constraints: usize,
    pub jacobian: usize,
    pub hessian: usize,
}

/// Final result of a solve.
pub struct Outcome {
    pub status: TerminationStatus,
    pub iterate: Iterate,
    /// Objective value in the original (unscaled) space.
    pub objective: f64,
    pub infeasibility: f64,
    pub major_iterations: usize,
    pub evaluations: EvaluationCounts,
    pub subproblems_solved: usize,
    pub hessian_evaluations: usize,
    /// Final penalty parameter of the l1 relaxation, when active.
    pub penalty_parameter: Option<f64>,
    /// Wall-clock time, reported but never enforced.
    pub wall_time: Duration,
}

/// The solver driver: owns the globalization mechanism, loops until the
/// termination classifier is satisfied and reports the result.
pub struct Solver {
    mechanism: Box<dyn GlobalizationMechanism>,
    tolerance: f64,
    max_iterations: usize,
    small_step_factor: f64,
}

impl Solver {
    /// Builds the mechanism -> constraint relaxation -> subproblem stack
    /// from the option map. Option errors abort here, before the first
    /// iteration.
    pub fn from_options(problem: &dyn Problem, options: &Options) -> anyhow::Result<Self> {
        let scaled = ScaledProblem::with_uniform_scaling(problem);
        options.residual_norm()?;
        Ok(Self {
            mechanism: create_mechanism(options, &scaled)?,
            tolerance: options.get_f64("tolerance")?,
            max_iterations: options.get_usize("max_iterations")?,
            small_step_factor: options.get_f64("small_step_factor")?,
        })
    }

    pub fn solve(&mut self, problem: &dyn Problem, x0: Vec<f64>) -> Result<Outcome, Fault> {
        let start = Instant::now();
        let n = problem.number_variables();
        let q = problem.number_constraints();
        info!("problem: {} variables, {} constraints", n, q);

        let scaled = ScaledProblem::new(problem, &x0)?;
        let mut statistics = Statistics::new();
        let mut current_iterate = Iterate::new(x0, Multipliers::zeros(n, q));
        current_iterate.multipliers.objective = scaled.objective_sign();

        self.mechanism
            .initialize(&mut statistics, &scaled, &mut current_iterate)?;

        let mut status = self.check_termination(&scaled, &current_iterate, f64::INFINITY);
        let mut major_iterations = 0;
        while status == TerminationStatus::NotOptimal && major_iterations < self.max_iterations {
            major_iterations += 1;
            statistics.new_line(major_iterations);
            debug!("### outer iteration {major_iterations}");

            match self
                .mechanism
                .compute_acceptable_iterate(&mut statistics, &scaled, &mut current_iterate)
            {
                Ok((new_iterate, step_norm)) => {
                    status = self.check_termination(&scaled, &new_iterate, step_norm);
                    Self::add_statistics(&mut statistics, &new_iterate);
                    statistics.emit();
                    current_iterate = new_iterate;
                }
                Err(fault) => {
                    // terminal: report the last accepted iterate
                    warn!("iteration {major_iterations} failed: {fault}");
                    break;
                }
            }
        }

        let objective = current_iterate.evaluate_objective(&scaled)?
            / scaled.scaling().objective();
        info!("termination status: {status}");

        Ok(Outcome {
            status,
            objective,
            infeasibility: current_iterate.residuals.infeasibility,
            major_iterations,
            evaluations: EvaluationCounts {
                objective: scaled.evaluations.objective.get(),
                constraints: scaled.evaluations.constraints.get(),
                jacobian: scaled.evaluations.jacobian.get(),
                hessian: scaled.evaluations.hessian.get(),
            },
            subproblems_solved: self.mechanism.subproblems_solved(),
            hessian_evaluations: self.mechanism.hessian_evaluations(),
            penalty_parameter: self.mechanism.penalty_parameter(),
            wall_time: start.elapsed(),
            iterate: current_iterate,
        })
    }

    fn add_statistics(statistics: &mut Statistics, iterate: &Iterate) {
        statistics.objective = if iterate.is_objective_computed() {
            Some(iterate.progress.objective)
        } else {
            None
        };
        statistics.infeasibility = iterate.residuals.infeasibility;
        statistics.complementarity = f64::min(
            iterate.residuals.optimality_complementarity,
            iterate.residuals.feasibility_complementarity,
        );
        statistics.stationarity = f64::min(
            iterate.residuals.optimality_stationarity,
            iterate.residuals.feasibility_stationarity,
        );
    }

    /// Termination classifier on the residual block and the step norm.
    pub(crate) fn check_termination(
        &self,
        problem: &ScaledProblem,
        iterate: &Iterate,
        step_norm: f64,
    ) -> TerminationStatus {
        let residuals = &iterate.residuals;
        let optimality_stationarity =
            residuals.optimality_stationarity / residuals.stationarity_scaling <= self.tolerance;
        let feasibility_stationarity =
            residuals.feasibility_stationarity / residuals.stationarity_scaling <= self.tolerance;
        let optimality_complementarity = residuals.optimality_complementarity
            / residuals.complementarity_scaling
            <= self.tolerance;
        let feasibility_complementarity = residuals.feasibility_complementarity
            / residuals.complementarity_scaling
            <= self.tolerance;
        let primal_feasibility = residuals.infeasibility <= self.tolerance;
        let no_trivial_duals = iterate
            .multipliers
            .not_all_zero(problem.number_variables(), self.tolerance);

        debug!(
            "termination: stat {} / feas stat {} / compl {} / primal feas {}",
            optimality_stationarity,
            feasibility_stationarity,
            optimality_complementarity,
            primal_feasibility
        );

        if optimality_complementarity && primal_feasibility {
            if 0.0 < iterate.multipliers.objective && optimality_stationarity {
                return TerminationStatus::FeasibleKktPoint;
            }
            if feasibility_stationarity && no_trivial_duals {
                // feasible, but the constraint qualification fails
                return TerminationStatus::FritzJohnPoint;
            }
        } else if feasibility_complementarity && feasibility_stationarity && !primal_feasibility {
            return TerminationStatus::InfeasibleKktPoint;
        }
        if step_norm <= self.tolerance / self.small_step_factor {
            if primal_feasibility {
                return TerminationStatus::FeasibleSmallStep;
            }
            return TerminationStatus::InfeasibleSmallStep;
        }
        TerminationStatus::NotOptimal
    }
}
