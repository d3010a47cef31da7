use crate::direction::Direction;
use crate::error::Fault;
use crate::iterate::Iterate;
use crate::math::norm_inf;
use crate::options::Options;
use crate::qpsolve::{InteriorPointQp, LpSolver};
use crate::scaling::ScaledProblem;
use crate::subproblem::{LocalModel, PredictedReduction, Subproblem};

/// Sequential linear programming subproblem. Only useful inside a trust
/// region, which is what keeps the linear model bounded.
pub struct LpSubproblem {
    model: LocalModel,
    backend: Box<dyn LpSolver>,
    subproblems_solved: usize,
}

impl LpSubproblem {
    pub fn from_options(
        options: &Options,
        problem: &ScaledProblem,
        max_number_variables: usize,
    ) -> anyhow::Result<Self> {
        let mut backend = InteriorPointQp::default();
        backend.proximal_coefficient = options.get_f64("proximal_coefficient")?;
        Ok(Self::new(problem, max_number_variables, Box::new(backend)))
    }

    pub fn new(
        problem: &ScaledProblem,
        max_number_variables: usize,
        backend: Box<dyn LpSolver>,
    ) -> Self {
        Self {
            model: LocalModel::new(
                problem.number_variables(),
                max_number_variables,
                problem.number_constraints(),
            ),
            backend,
            subproblems_solved: 0,
        }
    }
}

impl Subproblem for LpSubproblem {
    fn initialize(&mut self, problem: &ScaledProblem, iterate: &mut Iterate) -> Result<(), Fault> {
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
        let mut gradient = iterate.evaluate_objective_gradient(problem)?.clone();
        gradient.scale(objective_multiplier);
        self.model.objective_gradient = gradient;
        Ok(())
    }

    fn solve(&mut self, problem: &ScaledProblem, iterate: &Iterate) -> Result<Direction, Fault> {
        let nv = self.model.number_variables;
        let mut direction = self.backend.solve_lp(
            nv,
            self.model.number_constraints,
            &self.model.variable_bounds[..nv],
            &self.model.constraint_bounds,
            &self.model.objective_gradient,
            &self.model.constraint_jacobian,
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
            quadratic_term: 0.0,
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

    fn hessian_evaluations(&self) -> usize {
        0
    }

    fn subproblems_solved(&self) -> usize {
        self.subproblems_solved
    }
}
