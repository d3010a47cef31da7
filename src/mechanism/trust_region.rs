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

/// Trust region mechanism: the radius is halved on rejection or solver
/// failure and doubled when an accepted step sits on the region boundary.
pub struct TrustRegion {
    relaxation: Box<dyn ConstraintRelaxation>,
    radius: f64,
    maximum_radius: f64,
    minimum_radius: f64,
    activity_tolerance: f64,
    maximum_attempts: usize,
}

impl TrustRegion {
    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        Ok(Self {
            relaxation: create_constraint_relaxation(options, problem)?,
            radius: options.get_f64("TR_radius")?,
            maximum_radius: 1e30,
            minimum_radius: 1e-16,
            activity_tolerance: 1e-6,
            maximum_attempts: 100,
        })
    }

    fn try_radius(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<Option<(Iterate, f64)>, Fault> {
        self.relaxation
            .create_current_subproblem(problem, current_iterate, self.radius)?;
        let mut direction = self
            .relaxation
            .compute_feasible_direction(problem, current_iterate)?;
        correct_trust_region_multipliers(
            &mut direction,
            problem.number_variables(),
            self.radius,
            self.activity_tolerance,
        );

        let mut trial_iterate = assemble_trial_iterate(problem, current_iterate, &direction, 1.0);
        let accepted = self.relaxation.is_acceptable(
            statistics,
            problem,
            current_iterate,
            &mut trial_iterate,
            &direction,
            1.0,
        )?;
        if accepted {
            // grow the region when the step is on its boundary
            if direction.norm >= self.radius - self.activity_tolerance {
                self.radius = f64::min(2.0 * self.radius, self.maximum_radius);
            }
            statistics.step_norm = direction.norm;
            self.relaxation
                .register_accepted_iterate(problem, &mut trial_iterate)?;
            Ok(Some((trial_iterate, direction.norm)))
        } else {
            Ok(None)
        }
    }
}

impl GlobalizationMechanism for TrustRegion {
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
            statistics.minor = attempts;
            if attempts > self.maximum_attempts {
                return Err(Fault::StepIterationOverflow {
                    limit: self.maximum_attempts,
                });
            }
            debug!("trust region attempt {}, radius {:e}", attempts, self.radius);

            match self.try_radius(statistics, problem, current_iterate) {
                Ok(Some(accepted)) => return Ok(accepted),
                Ok(None) => self.radius /= 2.0,
                Err(fault) if fault.is_recoverable() => {
                    debug!("attempt failed ({fault}), shrinking the radius");
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
