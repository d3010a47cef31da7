use crate::direction::{Direction, SubproblemStatus};
use crate::error::Fault;
use crate::hessian::{HessianKind, HessianModel};
use crate::iterate::Iterate;
use crate::math::norm_inf;
use crate::options::Options;
use crate::qpsolve::{InteriorPointQp, QpSolver};
use crate::scaling::ScaledProblem;
use crate::subproblem::{LocalModel, PredictedReduction, Subproblem};

/// Sequential quadratic programming subproblem: minimizes a quadratic
/// model of the Lagrangian over the linearized constraints, delegating to
/// an external QP solver.
pub struct QpSubproblem {
    model: LocalModel,
    hessian: HessianModel,
    backend: Box<dyn QpSolver>,
    subproblems_solved: usize,
}

impl QpSubproblem {
    pub fn from_options(
        options: &Options,
        problem: &ScaledProblem,
        max_number_variables: usize,
    ) -> anyhow::Result<Self> {
        let kind = HessianKind::parse(options.get_str("hessian_model", "exact"))
            .ok_or_else(|| anyhow::anyhow!("unknown hessian_model"))?;
        let mut backend = InteriorPointQp::default();
        backend.proximal_coefficient = options.get_f64("proximal_coefficient")?;
        Ok(Self::new(
            problem,
            max_number_variables,
            kind,
            Box::new(backend),
        ))
    }

    pub fn new(
        problem: &ScaledProblem,
        max_number_variables: usize,
        hessian_kind: HessianKind,
        backend: Box<dyn QpSolver>,
    ) -> Self {
        let n = problem.number_variables();
        let q = problem.number_constraints();
        Self {
            model: LocalModel::new(n, max_number_variables, q),
            // the interior point backend requires a convex model, so the
            // Hessian is convexified regardless of the mechanism
            hessian: HessianModel::new(
                hessian_kind,
                n,
                problem.hessian_nonzero_capacity(),
                true,
            ),
            backend,
            subproblems_solved: 0,
        }
    }
}

impl Subproblem for QpSubproblem {
    fn initialize(&mut self, problem: &ScaledProblem, iterate: &mut Iterate) -> Result<(), Fault> {
        // start within the bounds so the displacement box contains zero
        let mut x = iterate.x.clone();
        for (i, range) in problem.variable_bounds().iter().enumerate() {
            x[i] = x[i].clamp(range.lower, range.upper);
        }
        iterate.set_primal(x);
        Ok(())
    }

    fn create_current_subproblem(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
        trust_region_radius: f64,
    ) -> Result<(), Fault> {
        let c = iterate.evaluate_constraints(problem)?.to_vec();
        let jacobian = iterate.evaluate_constraint_jacobian(problem)?.to_vec();
        for (row, model_row) in jacobian.iter().zip(&mut self.model.constraint_jacobian) {
            *model_row = row.clone();
        }
        self.model.number_variables = problem.number_variables();
        self.model.constraint_multipliers = iterate.multipliers.constraints.clone();
        self.model
            .set_variable_displacement_bounds(problem, iterate, trust_region_radius);
        self.model.set_constraint_displacement_bounds(problem, &c);
        self.model.reset_initial_point();
        self.build_objective_model(problem, iterate, objective_multiplier)
    }

    fn build_objective_model(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
    ) -> Result<(), Fault> {
        let constraint_multipliers = self.model.constraint_multipliers.clone();
        self.hessian.evaluate(
            problem,
            &iterate.x,
            objective_multiplier,
            &constraint_multipliers,
        )?;
        let mut gradient = iterate.evaluate_objective_gradient(problem)?.clone();
        gradient.scale(objective_multiplier);
        self.model.objective_gradient = gradient;
        Ok(())
    }

    fn solve(&mut self, problem: &ScaledProblem, iterate: &Iterate) -> Result<Direction, Fault> {
        let nv = self.model.number_variables;
        let mut direction = self.backend.solve_qp(
            nv,
            self.model.number_constraints,
            &self.model.variable_bounds[..nv],
            &self.model.constraint_bounds,
            &self.model.objective_gradient,
            &self.model.constraint_jacobian,
            self.hessian.matrix(),
            &self.model.initial_point[..nv],
        )?;
        self.subproblems_solved += 1;
        crate::subproblem::compute_dual_displacements(&iterate.multipliers, &mut direction);
        direction.norm = norm_inf(&direction.x[..problem.number_variables().min(direction.x.len())]);
        Ok(direction)
    }

    fn predicted_reduction(&self, direction: &Direction) -> PredictedReduction {
        PredictedReduction {
            linear_term: self.model.objective_gradient.dot(&direction.x),
            quadratic_term: 0.5
                * self.hessian.matrix().quadratic_product(
                    &direction.x,
                    &direction.x,
                    self.model.number_variables.min(direction.x.len()),
                ),
        }
    }

    fn second_order_correction(
        &mut self,
        problem: &ScaledProblem,
        trial_iterate: &mut Iterate,
    ) -> Result<Option<Direction>, Fault> {
        let trial_constraints = trial_iterate.evaluate_constraints(problem)?.to_vec();
        let saved_bounds = self.model.constraint_bounds.clone();
        self.model
            .set_constraint_displacement_bounds(problem, &trial_constraints);
        self.model.reset_initial_point();
        let correction = self.solve(problem, trial_iterate);
        self.model.constraint_bounds = saved_bounds;
        match correction {
            Ok(direction) if direction.status == SubproblemStatus::Optimal => Ok(Some(direction)),
            _ => Ok(None),
        }
    }

    fn set_initial_point(&mut self, point: &[f64]) {
        let length = point.len().min(self.model.initial_point.len());
        self.model.initial_point[..length].copy_from_slice(&point[..length]);
    }

    fn model(&self) -> &LocalModel {
        &self.model
    }

    fn model_mut(&mut self) -> &mut LocalModel {
        &mut self.model
    }

    fn register_accepted_iterate(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<(), Fault> {
        let multipliers = iterate.multipliers.clone();
        iterate.evaluate_lagrangian_gradient(
            problem,
            multipliers.objective,
            &multipliers.constraints,
            &multipliers.lower_bounds,
            &multipliers.upper_bounds,
        )?;
        let gradient = iterate.lagrangian_gradient.clone();
        self.hessian.register_accepted(&iterate.x, &gradient);
        Ok(())
    }

    fn hessian_evaluations(&self) -> usize {
        self.hessian.evaluation_count()
    }

    fn subproblems_solved(&self) -> usize {
        self.subproblems_solved
    }
}
