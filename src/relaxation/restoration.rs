use log::debug;

use crate::direction::{ConstraintPartition, ConstraintSide, Direction, SubproblemStatus};
use crate::error::Fault;
use crate::iterate::{Iterate, Progress};
use crate::math::NormKind;
use crate::options::Options;
use crate::relaxation::{ConstraintRelaxation, Phase};
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;
use crate::strategy::{create_strategy, GlobalizationStrategy};
use crate::subproblem::{create_subproblem, Subproblem};

/// Two-phase feasibility restoration: solve the real subproblem; when it
/// is infeasible, minimize the l1 violation of the offending constraints
/// with a zero objective multiplier until the optimality phase can resume.
///
/// Each phase owns its globalization strategy; phase transitions happen
/// exclusively inside `is_acceptable`.
pub struct FeasibilityRestoration {
    subproblem: Box<dyn Subproblem>,
    phase_1_strategy: Box<dyn GlobalizationStrategy>,
    phase_2_strategy: Box<dyn GlobalizationStrategy>,
    phase: Phase,
    /// Require the optimality filter to accept the trial pair before
    /// leaving restoration.
    entry_check: bool,
    /// Partition of the last relaxed direction, reused for the
    /// restoration progress measures.
    partition: Option<ConstraintPartition>,
    residual_norm: NormKind,
}

impl FeasibilityRestoration {
    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        Ok(Self {
            subproblem: create_subproblem(options, problem, problem.number_variables())?,
            phase_1_strategy: create_strategy(options)?,
            phase_2_strategy: create_strategy(options)?,
            phase: Phase::Optimality,
            entry_check: options.get_bool("restoration_entry_check", true),
            partition: None,
            residual_norm: options.residual_norm()?,
        })
    }

    fn set_restoration_multipliers(multipliers: &mut [f64], partition: &ConstraintPartition) {
        for &j in &partition.infeasible {
            multipliers[j] = match partition.side[j] {
                ConstraintSide::InfeasibleLower => 1.0,
                ConstraintSide::InfeasibleUpper => -1.0,
                ConstraintSide::Feasible => multipliers[j],
            };
        }
    }

    /// Restoration progress: (residual of all constraints, residual of the
    /// linearly infeasible subset).
    fn compute_infeasibility_measures(
        &self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        partition: &ConstraintPartition,
    ) -> Result<(), Fault> {
        let c = iterate.evaluate_constraints(problem)?.to_vec();
        iterate.progress = Progress {
            infeasibility: problem.constraint_violation(&c, NormKind::L1),
            objective: problem.subset_violation(&c, &partition.infeasible),
        };
        Ok(())
    }

    fn current_partition(&self, problem: &ScaledProblem) -> ConstraintPartition {
        self.partition
            .clone()
            .unwrap_or_else(|| ConstraintPartition::feasible(problem.number_constraints()))
    }
}

impl ConstraintRelaxation for FeasibilityRestoration {
    fn initialize(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        first_iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        statistics.set_phase_label("phase");
        self.subproblem.initialize(problem, first_iterate)?;
        self.subproblem
            .compute_progress_measures(problem, first_iterate)?;
        first_iterate.compute_residuals(problem, problem.objective_sign(), self.residual_norm)?;
        self.phase_1_strategy.initialize(first_iterate);
        self.phase_2_strategy.initialize(first_iterate);
        Ok(())
    }

    fn create_current_subproblem(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        trust_region_radius: f64,
    ) -> Result<(), Fault> {
        self.subproblem.create_current_subproblem(
            problem,
            current_iterate,
            problem.objective_sign(),
            trust_region_radius,
        )
    }

    fn compute_feasible_direction(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<Direction, Fault> {
        let mut direction = self.subproblem.solve(problem, current_iterate)?;
        match direction.status {
            SubproblemStatus::Optimal => {
                direction.objective_multiplier = problem.objective_sign();
                Ok(direction)
            }
            SubproblemStatus::Infeasible => {
                let partition = direction
                    .constraint_partition
                    .clone()
                    .unwrap_or_else(|| ConstraintPartition::feasible(problem.number_constraints()));
                debug!(
                    "infeasible subproblem: {} offending constraints, forming the feasibility problem",
                    partition.infeasible.len()
                );

                // multipliers of the violated constraints are fixed at +/-1
                Self::set_restoration_multipliers(
                    &mut self.subproblem.model_mut().constraint_multipliers,
                    &partition,
                );
                self.subproblem
                    .build_objective_model(problem, current_iterate, 0.0)?;
                let jacobian = current_iterate
                    .evaluate_constraint_jacobian(problem)?
                    .to_vec();
                let c = current_iterate.evaluate_constraints(problem)?.to_vec();
                {
                    let model = self.subproblem.model_mut();
                    model.set_feasibility_objective(&jacobian, &partition);
                    model.set_feasibility_bounds(problem, &c, &partition);
                }
                self.subproblem.set_initial_point(&direction.x);

                let mut relaxed = self.subproblem.solve(problem, current_iterate)?;
                if relaxed.status != SubproblemStatus::Optimal {
                    return Err(Fault::Solver {
                        status: relaxed.status,
                    });
                }
                relaxed.objective_multiplier = 0.0;
                relaxed.constraint_partition = Some(partition.clone());
                relaxed.is_relaxed = true;
                self.partition = Some(partition);
                Ok(relaxed)
            }
            status => Err(Fault::Solver { status }),
        }
    }

    fn second_order_correction(
        &mut self,
        problem: &ScaledProblem,
        trial_iterate: &mut Iterate,
    ) -> Result<Option<Direction>, Fault> {
        self.subproblem
            .second_order_correction(problem, trial_iterate)
    }

    fn is_acceptable(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        trial_iterate: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<bool, Fault> {
        if self.subproblem.definition_changed() {
            self.phase_2_strategy.reset();
            self.subproblem
                .compute_progress_measures(problem, current_iterate)?;
        }

        let step_norm = step_length * direction.norm;
        let mut accept = false;
        if step_norm == 0.0 {
            accept = true;
        } else {
            // possibly go back from restoration to optimality
            if !direction.is_relaxed && self.phase == Phase::FeasibilityRestoration {
                self.subproblem
                    .compute_progress_measures(problem, trial_iterate)?;
                let entry_accepts = !self.entry_check
                    || self.phase_2_strategy.acceptable_pair(
                        trial_iterate.progress.infeasibility,
                        trial_iterate.progress.objective,
                    );
                if entry_accepts {
                    debug!("switching from restoration to optimality phase");
                    self.phase = Phase::Optimality;
                    self.subproblem
                        .compute_progress_measures(problem, current_iterate)?;
                }
            }
            // possibly go from optimality to restoration
            else if direction.is_relaxed && self.phase == Phase::Optimality {
                debug!("switching from optimality to restoration phase");
                self.phase = Phase::FeasibilityRestoration;
                self.phase_2_strategy.notify(current_iterate);
                self.phase_1_strategy.reset();
                let partition = self.current_partition(problem);
                self.compute_infeasibility_measures(problem, current_iterate, &partition)?;
                self.phase_1_strategy.notify(current_iterate);
            }

            if self.phase == Phase::FeasibilityRestoration {
                let partition = direction
                    .constraint_partition
                    .clone()
                    .unwrap_or_else(|| self.current_partition(problem));
                self.compute_infeasibility_measures(problem, trial_iterate, &partition)?;
            } else {
                self.subproblem
                    .compute_progress_measures(problem, trial_iterate)?;
            }

            let predicted = self
                .subproblem
                .predicted_reduction(direction)
                .evaluate(step_length);
            let strategy = match self.phase {
                Phase::Optimality => &mut self.phase_2_strategy,
                Phase::FeasibilityRestoration => &mut self.phase_1_strategy,
            };
            accept = strategy.check_acceptance(
                &current_iterate.progress,
                &trial_iterate.progress,
                direction.objective_multiplier,
                predicted,
            );
        }

        if accept {
            statistics.phase = Some(if direction.is_relaxed { "1" } else { "2" }.to_string());
            if direction.is_relaxed {
                if let Some(partition) = &direction.constraint_partition {
                    Self::set_restoration_multipliers(
                        &mut trial_iterate.multipliers.constraints,
                        partition,
                    );
                }
            }
            trial_iterate.evaluate_objective(problem)?;
            trial_iterate.compute_residuals(
                problem,
                direction.objective_multiplier,
                self.residual_norm,
            )?;
        }
        Ok(accept)
    }

    fn register_accepted_iterate(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        self.subproblem.register_accepted_iterate(problem, iterate)
    }

    fn subproblems_solved(&self) -> usize {
        self.subproblem.subproblems_solved()
    }

    fn hessian_evaluations(&self) -> usize {
        self.subproblem.hessian_evaluations()
    }
}
