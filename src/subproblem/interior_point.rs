use log::debug;

use crate::direction::{Direction, SubproblemStatus};
use crate::error::Fault;
use crate::hessian::{HessianKind, HessianModel};
use crate::iterate::Iterate;
use crate::math::{dot, norm_inf};
use crate::options::Options;
use crate::scaling::ScaledProblem;
use crate::sparse::{SparseVector, SymmetricCoo};
use crate::linsol::{DenseLdl, SymmetricIndefiniteSolver};
use crate::subproblem::{LocalModel, PredictedReduction, Subproblem};

/// One-sided row of the barrier formulation: `h(x) <= 0` or `g(x) = 0`.
#[derive(Debug, Clone, Copy)]
enum BarrierRow {
    /// `xl_i - x_i <= 0`
    VariableLower(usize),
    /// `x_i - xu_i <= 0`
    VariableUpper(usize),
    /// `cl_j - c_j(x) <= 0`
    ConstraintLower(usize),
    /// `c_j(x) - cu_j <= 0`
    ConstraintUpper(usize),
    /// `c_j(x) - b_j = 0`
    Equality(usize),
}

/// Primal-dual interior point subproblem: each solve performs one Newton
/// step on the perturbed optimality system of the logarithmic barrier
/// problem, with the step pre-scaled by the fraction-to-the-boundary rule
/// `tau = max(0.99, 1 - mu)`. The barrier parameter follows the
/// Fiacco-McCormick update once the current barrier problem is solved to
/// its tolerance.
pub struct PrimalDualSubproblem {
    model: LocalModel,
    hessian: HessianModel,
    barrier_parameter: f64,
    tolerance: f64,
    objective_multiplier: f64,
    definition_changed: bool,
    subproblems_solved: usize,
    regularization: f64,
}

impl PrimalDualSubproblem {
    const INITIAL_BARRIER: f64 = 0.1;
    const BARRIER_DECREASE: f64 = 0.2;
    const BARRIER_EXPONENT: f64 = 1.5;
    const BARRIER_ERROR_FACTOR: f64 = 10.0;
    const REGULARIZATION_LIMIT: f64 = 1e4;

    pub fn from_options(options: &Options, problem: &ScaledProblem) -> anyhow::Result<Self> {
        let kind = HessianKind::parse(options.get_str("hessian_model", "exact"))
            .ok_or_else(|| anyhow::anyhow!("unknown hessian_model"))?;
        let n = problem.number_variables();
        let q = problem.number_constraints();
        Ok(Self {
            model: LocalModel::new(n, n, q),
            hessian: HessianModel::new(kind, n, problem.hessian_nonzero_capacity(), false),
            barrier_parameter: Self::INITIAL_BARRIER,
            tolerance: options.get_f64("tolerance")?,
            objective_multiplier: problem.objective_sign(),
            definition_changed: false,
            subproblems_solved: 0,
            regularization: 0.0,
        })
    }

    fn rows(&self, problem: &ScaledProblem) -> Vec<BarrierRow> {
        let mut rows = Vec::new();
        for (i, range) in problem.variable_bounds().iter().enumerate() {
            if range.lower.is_finite() {
                rows.push(BarrierRow::VariableLower(i));
            }
            if range.upper.is_finite() {
                rows.push(BarrierRow::VariableUpper(i));
            }
        }
        for (j, range) in problem.constraint_bounds().iter().enumerate() {
            if range.upper - range.lower <= 1e-12 * f64::max(1.0, range.upper.abs()) {
                rows.push(BarrierRow::Equality(j));
            } else {
                if range.lower.is_finite() {
                    rows.push(BarrierRow::ConstraintLower(j));
                }
                if range.upper.is_finite() {
                    rows.push(BarrierRow::ConstraintUpper(j));
                }
            }
        }
        rows
    }

    fn row_value(&self, problem: &ScaledProblem, row: BarrierRow, x: &[f64], c: &[f64]) -> f64 {
        match row {
            BarrierRow::VariableLower(i) => problem.variable_bounds()[i].lower - x[i],
            BarrierRow::VariableUpper(i) => x[i] - problem.variable_bounds()[i].upper,
            BarrierRow::ConstraintLower(j) => problem.constraint_bounds()[j].lower - c[j],
            BarrierRow::ConstraintUpper(j) => c[j] - problem.constraint_bounds()[j].upper,
            BarrierRow::Equality(j) => c[j] - problem.constraint_bounds()[j].upper,
        }
    }

    fn row_gradient(
        &self,
        row: BarrierRow,
        jacobian: &[SparseVector],
        n: usize,
    ) -> Vec<f64> {
        let mut gradient = vec![0.0; n];
        match row {
            BarrierRow::VariableLower(i) => gradient[i] = -1.0,
            BarrierRow::VariableUpper(i) => gradient[i] = 1.0,
            BarrierRow::ConstraintLower(j) => {
                for (i, v) in jacobian[j].iter() {
                    if i < n {
                        gradient[i] = -v;
                    }
                }
            }
            BarrierRow::ConstraintUpper(j) | BarrierRow::Equality(j) => {
                for (i, v) in jacobian[j].iter() {
                    if i < n {
                        gradient[i] = v;
                    }
                }
            }
        }
        gradient
    }

    /// Dual of a one-sided row, read off the iterate's multipliers in the
    /// crate's sign convention; floored away from zero to stay interior.
    fn row_dual(&self, row: BarrierRow, iterate: &Iterate, floor: f64) -> f64 {
        let raw = match row {
            BarrierRow::VariableLower(i) => iterate.multipliers.lower_bounds[i],
            BarrierRow::VariableUpper(i) => -iterate.multipliers.upper_bounds[i],
            BarrierRow::ConstraintLower(j) => iterate.multipliers.constraints[j],
            BarrierRow::ConstraintUpper(j) => -iterate.multipliers.constraints[j],
            BarrierRow::Equality(_) => 0.0,
        };
        f64::max(raw, floor)
    }

    /// Error of the perturbed KKT system at the current point; drives the
    /// Fiacco-McCormick barrier update.
    fn barrier_error(
        &self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
    ) -> Result<f64, Fault> {
        let multipliers = iterate.multipliers.clone();
        iterate.evaluate_lagrangian_gradient(
            problem,
            self.objective_multiplier,
            &multipliers.constraints,
            &multipliers.lower_bounds,
            &multipliers.upper_bounds,
        )?;
        let stationarity = norm_inf(&iterate.lagrangian_gradient);

        let c = iterate.evaluate_constraints(problem)?.to_vec();
        let rows = self.rows(problem);
        let mut feasibility: f64 = 0.0;
        let mut centrality: f64 = 0.0;
        for row in rows {
            let value = self.row_value(problem, row, &iterate.x, &c);
            match row {
                BarrierRow::Equality(_) => feasibility = feasibility.max(value.abs()),
                _ => {
                    let slack = f64::max(1e-12, -value);
                    let dual = self.row_dual(row, iterate, 0.0);
                    centrality = centrality.max((slack * dual - self.barrier_parameter).abs());
                    feasibility = feasibility.max(value);
                }
            }
        }
        Ok(stationarity.max(feasibility).max(centrality))
    }
}

impl Subproblem for PrimalDualSubproblem {
    fn initialize(&mut self, problem: &ScaledProblem, iterate: &mut Iterate) -> Result<(), Fault> {
        // push bounded variables strictly into the interior
        let k1 = 1e-2;
        let k2 = 1e-2;
        let mut x = iterate.x.clone();
        for (i, range) in problem.variable_bounds().iter().enumerate() {
            let width = range.upper - range.lower;
            if range.lower.is_finite() {
                let perturbation = f64::min(k1 * f64::max(1.0, range.lower.abs()), k2 * width);
                x[i] = f64::max(x[i], range.lower + perturbation);
            }
            if range.upper.is_finite() {
                let perturbation = f64::min(k1 * f64::max(1.0, range.upper.abs()), k2 * width);
                x[i] = f64::min(x[i], range.upper - perturbation);
            }
        }
        iterate.set_primal(x);

        // center the bound duals on the initial barrier parameter
        for (i, range) in problem.variable_bounds().iter().enumerate() {
            if range.lower.is_finite() {
                iterate.multipliers.lower_bounds[i] =
                    self.barrier_parameter / (iterate.x[i] - range.lower);
            }
            if range.upper.is_finite() {
                iterate.multipliers.upper_bounds[i] =
                    -self.barrier_parameter / (range.upper - iterate.x[i]);
            }
        }
        Ok(())
    }

    fn create_current_subproblem(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
        _trust_region_radius: f64,
    ) -> Result<(), Fault> {
        self.objective_multiplier = objective_multiplier;

        // Fiacco-McCormick: decrease mu once the barrier problem is solved
        let error = self.barrier_error(problem, iterate)?;
        if error <= Self::BARRIER_ERROR_FACTOR * self.barrier_parameter {
            let mu = self.barrier_parameter;
            let updated = f64::max(
                self.tolerance / 10.0,
                f64::min(
                    Self::BARRIER_DECREASE * mu,
                    mu.powf(Self::BARRIER_EXPONENT),
                ),
            );
            if updated < mu {
                debug!("barrier parameter decreased to {:e}", updated);
                self.barrier_parameter = updated;
                self.definition_changed = true;
            }
        }

        let c = iterate.evaluate_constraints(problem)?.to_vec();
        let jacobian = iterate.evaluate_constraint_jacobian(problem)?.to_vec();
        for (row, model_row) in jacobian.iter().zip(&mut self.model.constraint_jacobian) {
            *model_row = row.clone();
        }
        self.model
            .set_variable_displacement_bounds(problem, iterate, f64::INFINITY);
        self.model.set_constraint_displacement_bounds(problem, &c);
        self.build_objective_model(problem, iterate, objective_multiplier)
    }

    fn build_objective_model(
        &mut self,
        problem: &ScaledProblem,
        iterate: &mut Iterate,
        objective_multiplier: f64,
    ) -> Result<(), Fault> {
        self.objective_multiplier = objective_multiplier;
        let constraint_multipliers = iterate.multipliers.constraints.clone();
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
        let n = problem.number_variables();
        let q = problem.number_constraints();
        let mu = self.barrier_parameter;
        let rows = self.rows(problem);

        // constraint values at the current point were cached by create
        let c = match iterate.cached_constraints() {
            Some(c) => c.to_vec(),
            None => {
                let mut fresh = vec![0.0; q];
                problem.evaluate_constraints(&iterate.x, &mut fresh)?;
                fresh
            }
        };

        let jacobian = self.model.constraint_jacobian.clone();
        let inequality: Vec<(BarrierRow, Vec<f64>, f64, f64, f64)> = rows
            .iter()
            .filter(|row| !matches!(row, BarrierRow::Equality(_)))
            .map(|&row| {
                let value = self.row_value(problem, row, &iterate.x, &c);
                let slack = f64::max(1e-12, -value);
                let raw = self.row_dual(row, iterate, 0.0);
                // fall back to the centered dual when the stored one is gone
                let dual = if raw > 1e-10 { raw } else { mu / slack };
                (row, self.row_gradient(row, &jacobian, n), value, slack, dual)
            })
            .collect();
        let equalities: Vec<(usize, Vec<f64>, f64)> = rows
            .iter()
            .filter_map(|&row| match row {
                BarrierRow::Equality(j) => Some((
                    j,
                    self.row_gradient(row, &jacobian, n),
                    self.row_value(problem, row, &iterate.x, &c),
                )),
                _ => None,
            })
            .collect();
        let ne = equalities.len();
        let mut equality_duals: Vec<f64> = equalities
            .iter()
            .map(|(j, _, _)| -iterate.multipliers.constraints[*j])
            .collect();

        // gradient of the Lagrangian in the row formulation
        let gradient = self.model.objective_gradient.to_dense(n);
        let mut l_x = gradient.clone();
        for (r, (_, row_gradient, _)) in equalities.iter().enumerate() {
            for i in 0..n {
                l_x[i] += row_gradient[i] * equality_duals[r];
            }
        }
        for (_, row_gradient, _, _, dual) in &inequality {
            for i in 0..n {
                l_x[i] += row_gradient[i] * dual;
            }
        }

        // condensed primal-dual system
        let dim = n + ne;
        let mut m_dense = vec![vec![0.0; n]; n];
        for (i, j, v) in self.hessian.matrix().iter() {
            if i < n && j < n {
                m_dense[i][j] += v;
                if i != j {
                    m_dense[j][i] += v;
                }
            }
        }
        for (_, row_gradient, _, slack, dual) in &inequality {
            let weight = dual / slack;
            for i in 0..n {
                if row_gradient[i] == 0.0 {
                    continue;
                }
                for j in 0..n {
                    if row_gradient[j] != 0.0 {
                        m_dense[i][j] += weight * row_gradient[i] * row_gradient[j];
                    }
                }
            }
        }

        let mut n_vec = l_x.clone();
        for (_, row_gradient, value, slack, dual) in &inequality {
            let term = (dual * value + mu) / slack;
            for i in 0..n {
                n_vec[i] += row_gradient[i] * term;
            }
        }

        let mut rhs = vec![0.0; dim];
        for i in 0..n {
            rhs[i] = -n_vec[i];
        }
        for (r, (_, _, value)) in equalities.iter().enumerate() {
            rhs[n + r] = -value;
        }

        // factor with inertia correction on the primal block
        let mut solver = DenseLdl::new(dim);
        self.regularization = 0.0;
        let step = loop {
            let mut kkt = SymmetricCoo::with_capacity(dim, dim * dim / 2 + dim, true);
            for i in 0..n {
                for j in 0..=i {
                    if m_dense[i][j] != 0.0 {
                        kkt.insert(m_dense[i][j], i, j);
                    }
                }
            }
            for (r, (_, row_gradient, _)) in equalities.iter().enumerate() {
                for i in 0..n {
                    if row_gradient[i] != 0.0 {
                        kkt.insert(row_gradient[i], n + r, i);
                    }
                }
            }
            let delta = self.regularization;
            kkt.set_regularization(|i| if i < n { delta } else { -1e-10 });
            solver.factorize(&kkt)?;
            let (positive, _, zero) = solver.inertia();
            if positive == n && zero == 0 {
                let mut solution = rhs.clone();
                solver.solve(&mut solution)?;
                break solution;
            }
            self.regularization = if self.regularization == 0.0 {
                1e-8
            } else {
                self.regularization * 2.0
            };
            if self.regularization > Self::REGULARIZATION_LIMIT {
                return Err(Fault::Inertia {
                    limit: Self::REGULARIZATION_LIMIT,
                });
            }
        };
        self.subproblems_solved += 1;

        let dx: Vec<f64> = step[..n].to_vec();
        let dlam: Vec<f64> = step[n..].to_vec();

        // dual steps from the linearized complementarity conditions
        let tau = f64::max(0.99, 1.0 - mu);
        let mut alpha_primal: f64 = 1.0;
        let mut alpha_dual: f64 = 1.0;
        let mut dual_steps = Vec::with_capacity(inequality.len());
        for (_, row_gradient, value, slack, dual) in &inequality {
            let dslack = -value - slack - dot(row_gradient, &dx);
            if dslack < 0.0 {
                alpha_primal = alpha_primal.min(tau * slack / -dslack);
            }
            let ddual = (mu - dual * dslack) / slack - dual;
            if ddual < 0.0 {
                alpha_dual = alpha_dual.min(tau * dual / -ddual);
            }
            dual_steps.push(ddual);
        }

        // the returned primal step already honors fraction-to-the-boundary
        let d: Vec<f64> = dx.iter().map(|v| alpha_primal * v).collect();

        let mut direction = Direction::with_dimensions(n, q);
        let mut multipliers = iterate.multipliers.clone();
        multipliers.objective = self.objective_multiplier;
        for r in 0..ne {
            equality_duals[r] += alpha_dual * dlam[r];
            multipliers.constraints[equalities[r].0] = -equality_duals[r];
        }
        // two-sided inequality constraints accumulate both side duals
        for (row, _, _, _, _) in &inequality {
            if let BarrierRow::ConstraintLower(j) | BarrierRow::ConstraintUpper(j) = row {
                multipliers.constraints[*j] = 0.0;
            }
        }
        for ((row, _, _, _, dual), ddual) in inequality.iter().zip(&dual_steps) {
            let updated = dual + alpha_dual * ddual;
            match row {
                BarrierRow::VariableLower(i) => multipliers.lower_bounds[*i] = updated,
                BarrierRow::VariableUpper(i) => multipliers.upper_bounds[*i] = -updated,
                BarrierRow::ConstraintLower(j) => multipliers.constraints[*j] += updated,
                BarrierRow::ConstraintUpper(j) => multipliers.constraints[*j] -= updated,
                BarrierRow::Equality(_) => {}
            }
        }

        direction.objective =
            dot(&gradient, &d) + 0.5 * self.hessian.matrix().quadratic_product(&d, &d, n);
        direction.norm = norm_inf(&d);
        direction.x = d;
        direction.multipliers = multipliers;
        crate::subproblem::compute_dual_displacements(&iterate.multipliers, &mut direction);
        direction.status = SubproblemStatus::Optimal;
        direction.objective_multiplier = self.objective_multiplier;
        Ok(direction)
    }

    fn predicted_reduction(&self, direction: &Direction) -> PredictedReduction {
        PredictedReduction {
            linear_term: self.model.objective_gradient.dot(&direction.x),
            quadratic_term: 0.5
                * self.hessian.matrix().quadratic_product(
                    &direction.x,
                    &direction.x,
                    direction.x.len(),
                ),
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
        self.hessian.evaluation_count()
    }

    fn subproblems_solved(&self) -> usize {
        self.subproblems_solved
    }

    fn definition_changed(&mut self) -> bool {
        let changed = self.definition_changed;
        self.definition_changed = false;
        changed
    }
}
