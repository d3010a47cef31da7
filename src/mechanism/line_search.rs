use log::debug;

use crate::error::Fault;
use crate::iterate::Iterate;
use crate::math::norm_inf;
use crate::mechanism::{assemble_trial_iterate, GlobalizationMechanism};
use crate::options::Options;
use crate::relaxation::{create_constraint_relaxation, ConstraintRelaxation};
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;

/// Backtracking line search: the step length follows the sequence
/// `1, ratio, ratio^2, ...` until the trial point is accepted.
pub struct LineSearch {
    relaxation: Box<dyn ConstraintRelaxation>,
    backtracking_ratio: f64,
    minimum_step_length: f64,
}

impl LineSearch {
    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        Ok(Self {
            relaxation: create_constraint_relaxation(options, problem)?,
            backtracking_ratio: options.get_f64("LS_backtracking_ratio")?,
            minimum_step_length: 1e-10,
        })
    }
}

impl GlobalizationMechanism for LineSearch {
    fn initialize(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        first_iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        self.relaxation.initialize(statistics, problem, first_iterate)
    }

    fn compute_acceptable_iterate(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<(Iterate, f64), Fault> {
        self.relaxation
            .create_current_subproblem(problem, current_iterate, f64::INFINITY)?;
        let direction = self
            .relaxation
            .compute_feasible_direction(problem, current_iterate)?;

        let mut step_length: f64 = 1.0;
        let mut correction_attempted = false;
        let mut number_iterations = 0;
        loop {
            number_iterations += 1;
            statistics.minor = number_iterations;
            debug!(
                "line search iteration {}, step length {:e}",
                number_iterations, step_length
            );

            let mut trial_iterate =
                assemble_trial_iterate(problem, current_iterate, &direction, step_length);
            let accepted = self.relaxation.is_acceptable(
                statistics,
                problem,
                current_iterate,
                &mut trial_iterate,
                &direction,
                step_length,
            );
            match accepted {
                Ok(true) => {
                    let step_norm = step_length * direction.norm;
                    statistics.step_norm = step_norm;
                    self.relaxation
                        .register_accepted_iterate(problem, &mut trial_iterate)?;
                    return Ok((trial_iterate, step_norm));
                }
                Ok(false) => {
                    // try a second-order correction once, on the first
                    // rejection of a non-relaxed full step
                    if !correction_attempted && !direction.is_relaxed && step_length == 1.0 {
                        correction_attempted = true;
                        if let Some(correction) = self
                            .relaxation
                            .second_order_correction(problem, &mut trial_iterate)?
                        {
                            debug!("trying a second-order correction");
                            let mut corrected = direction.clone();
                            for (d, c) in corrected.x.iter_mut().zip(&correction.x) {
                                *d += c;
                            }
                            corrected.norm = norm_inf(&corrected.x);
                            let mut corrected_trial = assemble_trial_iterate(
                                problem,
                                current_iterate,
                                &corrected,
                                1.0,
                            );
                            if let Ok(true) = self.relaxation.is_acceptable(
                                statistics,
                                problem,
                                current_iterate,
                                &mut corrected_trial,
                                &corrected,
                                1.0,
                            ) {
                                statistics.step_norm = corrected.norm;
                                self.relaxation
                                    .register_accepted_iterate(problem, &mut corrected_trial)?;
                                return Ok((corrected_trial, corrected.norm));
                            }
                        }
                    }
                    step_length *= self.backtracking_ratio;
                }
                // a numerical bust in the trial evaluation is a rejection
                Err(fault) if fault.is_recoverable() => {
                    debug!("trial rejected after fault: {fault}");
                    step_length *= self.backtracking_ratio;
                }
                Err(fault) => return Err(fault),
            }
            if step_length < self.minimum_step_length {
                return Err(Fault::StepUnderflow {
                    limit: self.minimum_step_length,
                });
            }
        }
    }

    fn penalty_parameter(&self) -> Option<f64> {
        self.relaxation.penalty_parameter()
    }

    fn subproblems_solved(&self) -> usize {
        self.relaxation.subproblems_solved()
    }

    fn hessian_evaluations(&self) -> usize {
        self.relaxation.hessian_evaluations()
    }
}
