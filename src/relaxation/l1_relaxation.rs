use log::debug;

use crate::direction::Direction;
use crate::error::Fault;
use crate::iterate::{self, Iterate, Multipliers};
use crate::math::NormKind;
use crate::options::Options;
use crate::problem::Range;
use crate::relaxation::ConstraintRelaxation;
use crate::scaling::ScaledProblem;
use crate::statistics::Statistics;
use crate::strategy::{create_strategy, GlobalizationStrategy};
use crate::subproblem::{create_subproblem, Subproblem};

/// Mapping of the elastic variables `p` (upper violations) and `n` (lower
/// violations) onto the extended variable range of the subproblem.
struct ElasticVariables {
    /// (constraint, variable index) of each p_j.
    positive: Vec<(usize, usize)>,
    /// (constraint, variable index) of each n_j.
    negative: Vec<(usize, usize)>,
}

impl ElasticVariables {
    fn generate(problem: &ScaledProblem) -> Self {
        let mut elastic = Self {
            positive: Vec::new(),
            negative: Vec::new(),
        };
        let mut index = problem.number_variables();
        for (j, range) in problem.constraint_bounds().iter().enumerate() {
            if range.lower.is_finite() {
                elastic.negative.push((j, index));
                index += 1;
            }
            if range.upper.is_finite() {
                elastic.positive.push((j, index));
                index += 1;
            }
        }
        elastic
    }

    fn count(problem: &ScaledProblem) -> usize {
        problem
            .constraint_bounds()
            .iter()
            .map(|range| range.lower.is_finite() as usize + range.upper.is_finite() as usize)
            .sum()
    }
}

/// l1 relaxation with Byrd's steering rule: the subproblem minimizes
/// `mu*f + sum(p) + sum(n)` over the elastic reformulation of the
/// linearized constraints, and the penalty parameter `mu` is driven so
/// that the step makes sufficient progress both toward linearized
/// feasibility and on the penalty objective.
pub struct L1Relaxation {
    subproblem: Box<dyn Subproblem>,
    strategy: Box<dyn GlobalizationStrategy>,
    elastic: ElasticVariables,
    penalty_parameter: f64,
    epsilon1: f64,
    epsilon2: f64,
    decrease_factor: f64,
    residual_norm: NormKind,
}

impl L1Relaxation {
    const ZERO_PENALTY_THRESHOLD: f64 = 1e-10;

    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        let max_number_variables = problem.number_variables() + ElasticVariables::count(problem);
        Ok(Self {
            subproblem: create_subproblem(options, problem, max_number_variables)?,
            strategy: create_strategy(options)?,
            elastic: ElasticVariables::generate(problem),
            penalty_parameter: options.get_f64("l1_relaxation_initial_parameter")?,
            epsilon1: options.get_f64("l1_relaxation_epsilon1")?,
            epsilon2: options.get_f64("l1_relaxation_epsilon2")?,
            decrease_factor: options.get_f64("l1_relaxation_decrease_factor")?,
            residual_norm: options.residual_norm()?,
        })
    }

    /// Writes the elastic columns into the subproblem model.
    fn add_elastic_variables(&mut self) {
        let model = self.subproblem.model_mut();
        model.number_variables = model.max_number_variables;
        for &(j, i) in &self.elastic.positive {
            model.objective_gradient.set(i, 1.0);
            model.constraint_jacobian[j].set(i, -1.0);
            model.variable_bounds[i] = Range::lower_bounded(0.0);
            model.initial_point[i] = 0.0;
        }
        for &(j, i) in &self.elastic.negative {
            model.objective_gradient.set(i, 1.0);
            model.constraint_jacobian[j].set(i, 1.0);
            model.variable_bounds[i] = Range::lower_bounded(0.0);
            model.initial_point[i] = 0.0;
        }
    }

    /// l1 residual of the linearized constraints: sum of the elastics.
    fn linearized_residual(&self, step: &[f64]) -> f64 {
        let mut residual = 0.0;
        for &(_, i) in &self.elastic.positive {
            if i < step.len() {
                residual += step[i];
            }
        }
        for &(_, i) in &self.elastic.negative {
            if i < step.len() {
                residual += step[i];
            }
        }
        residual
    }

    fn solve_subproblem(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &Iterate,
        objective_multiplier: f64,
    ) -> Result<Direction, Fault> {
        let mut direction = self.subproblem.solve(problem, current_iterate)?;
        direction.objective_multiplier = objective_multiplier;
        Ok(direction)
    }

    /// Rebuilds the objective for a new penalty parameter and resolves.
    fn resolve_subproblem(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        objective_multiplier: f64,
    ) -> Result<Direction, Fault> {
        self.subproblem
            .build_objective_model(problem, current_iterate, objective_multiplier)?;
        self.add_elastic_variables();
        self.solve_subproblem(problem, current_iterate, objective_multiplier)
    }

    /// Measure combining the complementarity error and the KKT error of
    /// the feasibility problem at the direction's dual estimates (current
    /// multipliers plus the direction's displacements).
    fn compute_error(
        &self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        direction: &Direction,
    ) -> Result<f64, Fault> {
        let add = |current: &[f64], displacement: &[f64]| -> Vec<f64> {
            current
                .iter()
                .zip(displacement)
                .map(|(c, d)| c + d)
                .collect()
        };
        let current = iterate.multipliers.clone();
        let estimates = Multipliers {
            constraints: add(&current.constraints, &direction.multipliers.constraints),
            lower_bounds: add(&current.lower_bounds, &direction.multipliers.lower_bounds),
            upper_bounds: add(&current.upper_bounds, &direction.multipliers.upper_bounds),
            objective: 0.0,
        };
        let c = iterate.evaluate_constraints(problem)?.to_vec();
        let mut error =
            iterate::complementarity_error(problem, &iterate.x, &c, &estimates, true);
        iterate.evaluate_lagrangian_gradient(
            problem,
            0.0,
            &estimates.constraints,
            &estimates.lower_bounds,
            &estimates.upper_bounds,
        )?;
        error += crate::math::norm_1(&iterate.lagrangian_gradient);
        Ok(error)
    }

    /// Byrd's steering rule (stages a-f).
    fn solve_with_steering_rule(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<Direction, Fault> {
        debug!("penalty parameter: {:e}", self.penalty_parameter);
        let mut direction =
            self.solve_subproblem(problem, current_iterate, self.penalty_parameter)?;

        if 0.0 < self.penalty_parameter {
            let mut linearized_residual = self.linearized_residual(&direction.x);
            debug!("linearized residual mk(dk): {:e}", linearized_residual);

            if linearized_residual != 0.0 {
                let current_penalty_parameter = self.penalty_parameter;
                let c = current_iterate.evaluate_constraints(problem)?.to_vec();
                let current_infeasibility = problem.constraint_violation(&c, NormKind::L1);

                // lowest possible linearized violation (zero penalty)
                let direction_lowest_violation =
                    self.resolve_subproblem(problem, current_iterate, 0.0)?;
                let residual_lowest_violation =
                    self.linearized_residual(&direction_lowest_violation.x);
                debug!(
                    "ideal linearized residual mk(dk): {:e}",
                    residual_lowest_violation
                );

                if !(0.0 < current_infeasibility
                    && residual_lowest_violation == current_infeasibility)
                {
                    let error_lowest_violation =
                        self.compute_error(problem, current_iterate, &direction_lowest_violation)?;
                    debug!("ideal error: {:e}", error_lowest_violation);
                    if error_lowest_violation == 0.0 {
                        self.penalty_parameter = 0.0;
                        direction = direction_lowest_violation.clone();
                    } else {
                        let term =
                            error_lowest_violation / f64::max(1.0, current_infeasibility);
                        self.penalty_parameter = f64::min(self.penalty_parameter, term * term);
                        if self.penalty_parameter < current_penalty_parameter {
                            if self.penalty_parameter == 0.0 {
                                direction = direction_lowest_violation.clone();
                            } else {
                                direction = self.resolve_subproblem(
                                    problem,
                                    current_iterate,
                                    self.penalty_parameter,
                                )?;
                                linearized_residual = self.linearized_residual(&direction.x);
                            }
                        }

                        // decrease the penalty parameter until the step makes
                        // enough progress toward both goals
                        let mut condition1 = false;
                        let mut condition2 = false;
                        while !condition2 {
                            if !condition1 {
                                let ideal_reached = residual_lowest_violation == 0.0
                                    && linearized_residual == 0.0;
                                let fraction_reached = residual_lowest_violation != 0.0
                                    && current_infeasibility - linearized_residual
                                        >= self.epsilon1
                                            * (current_infeasibility - residual_lowest_violation);
                                if ideal_reached || fraction_reached {
                                    condition1 = true;
                                }
                            }
                            if condition1
                                && current_infeasibility - direction.objective
                                    >= self.epsilon2
                                        * (current_infeasibility
                                            - direction_lowest_violation.objective)
                            {
                                condition2 = true;
                            }
                            if !condition2 {
                                self.penalty_parameter /= self.decrease_factor;
                                if self.penalty_parameter < Self::ZERO_PENALTY_THRESHOLD {
                                    self.penalty_parameter = 0.0;
                                    condition2 = true;
                                } else {
                                    debug!(
                                        "resolving with penalty parameter {:e}",
                                        self.penalty_parameter
                                    );
                                    direction = self.resolve_subproblem(
                                        problem,
                                        current_iterate,
                                        self.penalty_parameter,
                                    )?;
                                    linearized_residual =
                                        self.linearized_residual(&direction.x);
                                }
                            }
                        }
                    }
                }

                debug_assert!(self.penalty_parameter <= current_penalty_parameter);
                if self.penalty_parameter < current_penalty_parameter {
                    debug!("penalty parameter updated to {:e}", self.penalty_parameter);
                    self.strategy.reset();
                }
            }
        }
        Ok(direction)
    }

    /// Drops the elastic components from a direction over the extended
    /// variable range.
    fn strip_elastic_variables(&self, problem: &ScaledProblem, direction: &mut Direction) {
        let n = problem.number_variables();
        direction.x.truncate(n);
        direction.multipliers.lower_bounds.truncate(n);
        direction.multipliers.upper_bounds.truncate(n);
        direction.norm = crate::math::norm_inf(&direction.x);
        direction
            .active_set
            .bounds
            .at_lower
            .retain(|&i| i < n);
        direction.active_set.bounds.at_upper.retain(|&i| i < n);
    }

    /// Predicted reduction of the merit model
    /// `h(x) - h_lin(alpha) + mu * model reduction(alpha)`.
    fn predicted_reduction(
        &self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
        direction: &Direction,
        step_length: f64,
    ) -> Result<f64, Fault> {
        let model_reduction = self
            .subproblem
            .predicted_reduction(direction)
            .evaluate(step_length);
        let c = current_iterate.evaluate_constraints(problem)?.to_vec();
        let current_infeasibility = problem.constraint_violation(&c, NormKind::L1);
        let jacobian = current_iterate.evaluate_constraint_jacobian(problem)?;
        let linearized: Vec<f64> = c
            .iter()
            .zip(jacobian)
            .map(|(cj, row)| cj + step_length * row.dot(&direction.x))
            .collect();
        let linearized_violation = problem.constraint_violation(&linearized, NormKind::L1);
        Ok(current_infeasibility - linearized_violation + model_reduction)
    }
}

impl ConstraintRelaxation for L1Relaxation {
    fn initialize(
        &mut self,
        statistics: &mut Statistics,
        problem: &ScaledProblem,
        first_iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        statistics.set_phase_label("penalty");
        self.subproblem.initialize(problem, first_iterate)?;
        self.subproblem
            .compute_progress_measures(problem, first_iterate)?;
        first_iterate.compute_residuals(problem, self.penalty_parameter, self.residual_norm)?;
        self.strategy.initialize(first_iterate);
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
            self.penalty_parameter,
            trust_region_radius,
        )?;
        self.add_elastic_variables();
        Ok(())
    }

    fn compute_feasible_direction(
        &mut self,
        problem: &ScaledProblem,
        current_iterate: &mut Iterate,
    ) -> Result<Direction, Fault> {
        let mut direction = self.solve_with_steering_rule(problem, current_iterate)?;
        self.strip_elastic_variables(problem, &mut direction);
        Ok(direction)
    }

    fn second_order_correction(
        &mut self,
        problem: &ScaledProblem,
        trial_iterate: &mut Iterate,
    ) -> Result<Option<Direction>, Fault> {
        match self
            .subproblem
            .second_order_correction(problem, trial_iterate)?
        {
            Some(mut direction) => {
                self.strip_elastic_variables(problem, &mut direction);
                Ok(Some(direction))
            }
            None => Ok(None),
        }
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
            self.strategy.reset();
            self.subproblem
                .compute_progress_measures(problem, current_iterate)?;
        }

        let mut accept = false;
        if direction.norm == 0.0 {
            accept = true;
        } else {
            self.subproblem
                .compute_progress_measures(problem, trial_iterate)?;
            let predicted =
                self.predicted_reduction(problem, current_iterate, direction, step_length)?;
            accept = self.strategy.check_acceptance(
                &current_iterate.progress,
                &trial_iterate.progress,
                self.penalty_parameter,
                predicted,
            );
        }
        if accept {
            statistics.phase = Some(format!("{:.2e}", self.penalty_parameter));
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

    fn penalty_parameter(&self) -> Option<f64> {
        Some(self.penalty_parameter)
    }

    fn subproblems_solved(&self) -> usize {
        self.subproblem.subproblems_solved()
    }

    fn hessian_evaluations(&self) -> usize {
        self.subproblem.hessian_evaluations()
    }
}
