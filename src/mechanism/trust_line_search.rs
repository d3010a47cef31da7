use log::debug;

use crate::error::Fault;
use crate::iterate::Iterate;
use crate::mechanism::{
    assemble_trial_iterate, correct_trust_region_multipliers, GlobalizationMechanism,
};
use crate::options::Options;
use crate::relaxation::{create_constraint_relaxation, ConstraintRelaxation};
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;

/// Hybrid mechanism: an outer loop over the trust-region radius with an
/// inner backtracking line search on each direction. Inner exhaustion
/// shrinks the radius and resets the step length.
pub struct TrustLineSearch {
    relaxation: Box<dyn ConstraintRelaxation>,
    radius: f64,
    minimum_radius: f64,
    backtracking_ratio: f64,
    minimum_step_length: f64,
    activity_tolerance: f64,
    maximum_attempts: usize,
}

impl TrustLineSearch {
    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        Ok(Self {
            relaxation: create_constraint_relaxation(options, problem)?,
            radius: options.get_f64("TR_radius")?,
            minimum_radius: 1e-16,
            backtracking_ratio: options.get_f64("LS_backtracking_ratio")?,
            minimum_step_length: 1e-10,
            activity_tolerance: 1e-6,
            maximum_attempts: 100,
        })
    }
}

impl GlobalizationMechanism for TrustLineSearch {
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
        let mut attempts = 0;
        loop {
            attempts += 1;
            if attempts > self.maximum_attempts {
                return Err(Fault::StepIterationOverflow {
                    limit: self.maximum_attempts,
                });
            }
            debug!(
                "trust-line-search attempt {}, radius {:e}",
                attempts, self.radius
            );

            let direction = match self.relaxation.create_current_subproblem(
                problem,
                current_iterate,
                self.radius,
            ) {
                Ok(()) => self
                    .relaxation
                    .compute_feasible_direction(problem, current_iterate),
                Err(fault) => Err(fault),
            };
            match direction {
                Ok(mut direction) => {
                    correct_trust_region_multipliers(
                        &mut direction,
                        problem.number_variables(),
                        self.radius,
                        self.activity_tolerance,
                    );

                    // inner line search: 1, ratio, ratio^2, ...
                    let mut step_length: f64 = 1.0;
                    let mut inner = 0;
                    while step_length >= self.minimum_step_length {
                        inner += 1;
                        statistics.minor = inner;
                        let mut trial_iterate = assemble_trial_iterate(
                            problem,
                            current_iterate,
                            &direction,
                            step_length,
                        );
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
                                if direction.norm >= self.radius - self.activity_tolerance {
                                    self.radius *= 2.0;
                                }
                                self.relaxation
                                    .register_accepted_iterate(problem, &mut trial_iterate)?;
                                return Ok((trial_iterate, step_norm));
                            }
                            Ok(false) => step_length *= self.backtracking_ratio,
                            Err(fault) if fault.is_recoverable() => {
                                step_length *= self.backtracking_ratio;
                            }
                            Err(fault) => return Err(fault),
                        }
                    }
                    // the inner search is exhausted
                    self.radius /= 2.0;
                }
                Err(fault) if fault.is_recoverable() => {
                    debug!("direction failed ({fault}), shrinking the radius");
                    self.radius /= 2.0;
                }
                Err(fault) => return Err(fault),
            }
            if self.radius < self.minimum_radius {
                return Err(Fault::RadiusUnderflow {
                    limit: self.minimum_radius,
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
