//! QP/LP solver contract and the default interior point backend.

use log::debug;
use sparsetools::csr::CSR;

use crate::direction::{
    ActiveSet, ConstraintPartition, ConstraintSide, Direction, SubproblemStatus,
};
use crate::error::Fault;
use crate::iterate::Multipliers;
use crate::linsol::{DenseLdl, SymmetricIndefiniteSolver};
use crate::math::{dot, norm_inf};
use crate::problem::Range;
use crate::sparse::{SparseVector, SymmetricCoo};

/// Solver for the linear displacement model
///
/// ```txt
///       min c'*d
///        d
/// ```
///
/// subject to
///
/// ```txt
///       cl <= J*d <= cu     (linearized constraints)
///       dl <= d <= du       (displacement bounds)
/// ```
///
/// Backends report absolute dual estimates; the subproblem layer turns
/// them into displacements relative to the current multipliers.
pub trait LpSolver {
    fn solve_lp(
        &mut self,
        number_variables: usize,
        number_constraints: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        linear_objective: &SparseVector,
        jacobian: &[SparseVector],
        initial_point: &[f64],
    ) -> Result<Direction, Fault>;
}

/// Extends [`LpSolver`] with a quadratic term `1/2 d'*H*d`.
pub trait QpSolver: LpSolver {
    fn solve_qp(
        &mut self,
        number_variables: usize,
        number_constraints: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        linear_objective: &SparseVector,
        jacobian: &[SparseVector],
        hessian: &SymmetricCoo,
        initial_point: &[f64],
    ) -> Result<Direction, Fault>;
}

/// Primal-dual interior point backend for the QP/LP subproblems.
///
/// An elastic phase-1 pass either certifies that the linearized constraints
/// are consistent or returns `INFEASIBLE` together with the partition of
/// the constraints by violation side and the minimum-violation step.
pub struct InteriorPointQp {
    /// Termination tolerance for feasibility, gradient and complementarity
    /// conditions of the inner Newton iteration.
    pub tolerance: f64,
    /// Threshold above which the phase-1 residual flags infeasibility.
    pub feasibility_tolerance: f64,
    /// Maximum number of Newton iterations.
    pub max_iterations: usize,
    /// Constant used in alpha updates.
    pub xi: f64,
    /// Centering parameter.
    pub sigma: f64,
    /// Used to initialize slack variables.
    pub z0: f64,
    /// Exits if either alpha parameter becomes smaller than this value.
    pub alpha_min: f64,
    /// KT multipliers smaller than this value for non-binding constraints
    /// are forced to zero.
    pub mu_threshold: f64,
    /// Exits if the 2-norm of the reduced Newton step exceeds this value.
    pub max_step_size: f64,
    /// Displacements this close to a bound are snapped onto it.
    pub snap_tolerance: f64,
    /// Quadratic regularization keeping degenerate LP/phase-1 problems
    /// bounded.
    pub proximal_coefficient: f64,
}

impl Default for InteriorPointQp {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            max_iterations: 150,
            xi: 0.99995,
            sigma: 0.1,
            z0: 1.0,
            alpha_min: 1e-8,
            mu_threshold: 1e-5,
            max_step_size: 1e10,
            snap_tolerance: 1e-8,
            proximal_coefficient: 1e-8,
        }
    }
}

impl LpSolver for InteriorPointQp {
    fn solve_lp(
        &mut self,
        number_variables: usize,
        number_constraints: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        linear_objective: &SparseVector,
        jacobian: &[SparseVector],
        initial_point: &[f64],
    ) -> Result<Direction, Fault> {
        self.solve(
            number_variables,
            number_constraints,
            variable_bounds,
            constraint_bounds,
            linear_objective,
            jacobian,
            None,
            initial_point,
        )
    }
}

impl QpSolver for InteriorPointQp {
    fn solve_qp(
        &mut self,
        number_variables: usize,
        number_constraints: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        linear_objective: &SparseVector,
        jacobian: &[SparseVector],
        hessian: &SymmetricCoo,
        initial_point: &[f64],
    ) -> Result<Direction, Fault> {
        self.solve(
            number_variables,
            number_constraints,
            variable_bounds,
            constraint_bounds,
            linear_objective,
            jacobian,
            Some(hessian),
            initial_point,
        )
    }
}

/// Split of the combined bound/constraint rows into equalities and
/// one-sided inequalities `a'*y <= b`.
struct RowSplit {
    /// (dense row, rhs, combined row index)
    equalities: Vec<(Vec<f64>, f64, usize)>,
    /// (dense row, rhs, combined row index, upper side?)
    inequalities: Vec<(Vec<f64>, f64, usize, bool)>,
}

impl InteriorPointQp {
    #[allow(clippy::too_many_arguments)]
    fn solve(
        &mut self,
        number_variables: usize,
        number_constraints: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        linear_objective: &SparseVector,
        jacobian: &[SparseVector],
        hessian: Option<&SymmetricCoo>,
        initial_point: &[f64],
    ) -> Result<Direction, Fault> {
        let nv = number_variables;
        let q = number_constraints;

        let mut direction = Direction::with_dimensions(nv, q);
        for range in variable_bounds.iter().take(nv).chain(constraint_bounds) {
            if range.lower > range.upper {
                direction.status = SubproblemStatus::BoundInconsistency;
                return Ok(direction);
            }
        }

        // phase 1: certify the linearized constraints or partition them
        if q > 0 {
            match self.minimum_violation_step(
                nv,
                q,
                variable_bounds,
                constraint_bounds,
                jacobian,
                initial_point,
            )? {
                Some((step, violation, partition)) => {
                    if violation > self.feasibility_tolerance {
                        debug!("phase-1 violation {:e}: infeasible subproblem", violation);
                        direction.x = step;
                        direction.norm = norm_inf(&direction.x);
                        direction.objective = violation;
                        direction.status = SubproblemStatus::Infeasible;
                        direction.constraint_partition = Some(partition);
                        return Ok(direction);
                    }
                }
                None => {
                    direction.status = SubproblemStatus::Undefined;
                    return Ok(direction);
                }
            }
        }

        // phase 2: the actual model
        let dense_objective = linear_objective.to_dense(nv);
        let split = self.split_rows(nv, variable_bounds, constraint_bounds, jacobian);
        let solution = self.newton_iterations(
            nv,
            &dense_objective,
            hessian,
            if hessian.is_none() {
                self.proximal_coefficient
            } else {
                0.0
            },
            &split,
            initial_point,
            variable_bounds,
        );
        let (y, duals_eq, duals_ineq) = match solution {
            InnerSolution::Converged { y, lam, mu } => (y, lam, mu),
            InnerSolution::Diverged => {
                direction.status = SubproblemStatus::UnboundedProblem;
                return Ok(direction);
            }
            InnerSolution::Failed => {
                direction.status = SubproblemStatus::Undefined;
                return Ok(direction);
            }
        };

        self.extract_direction(
            nv,
            q,
            variable_bounds,
            constraint_bounds,
            jacobian,
            &dense_objective,
            hessian,
            &split,
            y,
            &duals_eq,
            &duals_ineq,
            &mut direction,
        );
        direction.status = SubproblemStatus::Optimal;
        Ok(direction)
    }

    /// Elastic phase-1: minimize the total violation `sum(p) + sum(n)` of
    /// the linearized constraints, with a small proximal term keeping the
    /// displacement bounded. Returns the minimum-violation step, its
    /// violation and the constraint partition, or `None` when the inner
    /// iteration fails.
    #[allow(clippy::too_many_arguments)]
    fn minimum_violation_step(
        &self,
        nv: usize,
        q: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        jacobian: &[SparseVector],
        initial_point: &[f64],
    ) -> Result<Option<(Vec<f64>, f64, ConstraintPartition)>, Fault> {
        let extended = nv + 2 * q;

        let mut bounds = Vec::with_capacity(extended);
        bounds.extend_from_slice(&variable_bounds[..nv]);
        bounds.resize(extended, Range::lower_bounded(0.0));

        // row j: cl_j <= J_j*d + n_j - p_j <= cu_j
        let mut rows: Vec<SparseVector> = Vec::with_capacity(q);
        for (j, row) in jacobian.iter().enumerate() {
            let mut extended_row = row.clone();
            extended_row.set(nv + j, -1.0); // p_j
            extended_row.set(nv + q + j, 1.0); // n_j
            rows.push(extended_row);
        }

        let mut objective = SparseVector::with_capacity(2 * q);
        for i in nv..extended {
            objective.set(i, 1.0);
        }
        let dense_objective = objective.to_dense(extended);

        let mut start = vec![0.0; extended];
        start[..nv].copy_from_slice(&initial_point[..nv]);

        let split = self.split_rows(extended, &bounds, constraint_bounds, &rows);
        let proximal = f64::max(self.proximal_coefficient, 1e-8);
        let solution = self.newton_iterations(
            extended,
            &dense_objective,
            None,
            proximal,
            &split,
            &start,
            &bounds,
        );
        let y = match solution {
            InnerSolution::Converged { y, .. } => y,
            _ => return Ok(None),
        };

        let step: Vec<f64> = y[..nv].to_vec();
        let mut partition = ConstraintPartition {
            feasible: Vec::new(),
            infeasible: Vec::new(),
            side: vec![ConstraintSide::Feasible; q],
        };
        let mut violation = 0.0;
        for (j, row) in jacobian.iter().enumerate() {
            let value = row.dot(&step);
            let range = &constraint_bounds[j];
            if value < range.lower - self.feasibility_tolerance {
                partition.infeasible.push(j);
                partition.side[j] = ConstraintSide::InfeasibleLower;
                violation += range.lower - value;
            } else if range.upper + self.feasibility_tolerance < value {
                partition.infeasible.push(j);
                partition.side[j] = ConstraintSide::InfeasibleUpper;
                violation += value - range.upper;
            } else {
                partition.feasible.push(j);
            }
        }
        Ok(Some((step, violation, partition)))
    }

    /// Adds the displacement bounds to the constraint rows and splits the
    /// combined system into equalities and one-sided inequalities.
    fn split_rows(
        &self,
        nv: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        jacobian: &[SparseVector],
    ) -> RowSplit {
        let mut split = RowSplit {
            equalities: Vec::new(),
            inequalities: Vec::new(),
        };
        let mut push = |row: Vec<f64>, range: &Range, index: usize| {
            if range.upper - range.lower <= 1e-12 * f64::max(1.0, range.upper.abs()) {
                split.equalities.push((row, range.upper, index));
            } else {
                if range.upper.is_finite() {
                    split
                        .inequalities
                        .push((row.clone(), range.upper, index, true));
                }
                if range.lower.is_finite() {
                    let negated: Vec<f64> = row.iter().map(|v| -v).collect();
                    split.inequalities.push((negated, -range.lower, index, false));
                }
            }
        };

        for i in 0..nv {
            let mut row = vec![0.0; nv];
            row[i] = 1.0;
            push(row, &variable_bounds[i], i);
        }
        for (j, sparse_row) in jacobian.iter().enumerate() {
            push(sparse_row.to_dense(nv), &constraint_bounds[j], nv + j);
        }
        split
    }

    /// The Newton iteration of the interior point method, on
    /// `min 1/2 y'*H*y + c'*y  s.t.  Ae*y = be, Ai*y <= bi`.
    #[allow(clippy::too_many_arguments)]
    fn newton_iterations(
        &self,
        nv: usize,
        linear_objective: &[f64],
        hessian: Option<&SymmetricCoo>,
        proximal: f64,
        split: &RowSplit,
        initial_point: &[f64],
        variable_bounds: &[Range],
    ) -> InnerSolution {
        let ne = split.equalities.len();
        let ni = split.inequalities.len();

        let hessian_product = |y: &[f64], out: &mut Vec<f64>| {
            out.iter_mut().for_each(|v| *v = 0.0);
            if let Some(h) = hessian {
                h.gradient_product(y, out);
            }
            if proximal != 0.0 {
                for i in 0..nv {
                    out[i] += proximal * y[i];
                }
            }
        };

        let ae_rows: Vec<Vec<f64>> = split.equalities.iter().map(|(r, _, _)| r.clone()).collect();
        let ai_rows: Vec<Vec<f64>> = split
            .inequalities
            .iter()
            .map(|(r, _, _, _)| r.clone())
            .collect();
        let ae_mat: CSR<usize, f64> = if ne > 0 {
            CSR::from_dense(&ae_rows)
        } else {
            CSR::with_size(0, nv)
        };
        let ai_mat: CSR<usize, f64> = if ni > 0 {
            CSR::from_dense(&ai_rows)
        } else {
            CSR::with_size(0, nv)
        };
        let be: Vec<f64> = split.equalities.iter().map(|(_, b, _)| *b).collect();
        let bi: Vec<f64> = split.inequalities.iter().map(|(_, b, _, _)| *b).collect();

        // start from the supplied point, clipped into the displacement box
        let mut y: Vec<f64> = initial_point[..nv]
            .iter()
            .enumerate()
            .map(|(i, &v)| v.clamp(variable_bounds[i].lower, variable_bounds[i].upper))
            .collect();

        let residuals = |y: &[f64]| {
            let yy: &[f64] = y;
            let h_res: Vec<f64> = if ni > 0 {
                (&ai_mat * &yy)
                    .iter()
                    .zip(&bi)
                    .map(|(a, b)| a - b)
                    .collect()
            } else {
                Vec::new()
            };
            let g_res: Vec<f64> = if ne > 0 {
                (&ae_mat * &yy)
                    .iter()
                    .zip(&be)
                    .map(|(a, b)| a - b)
                    .collect()
            } else {
                Vec::new()
            };
            (h_res, g_res)
        };

        let (mut h, mut g_eq) = residuals(&y);

        let mut gamma = 1.0;
        let mut lam = vec![0.0; ne];
        let mut z: Vec<f64> = h
            .iter()
            .map(|&hk| if hk < -self.z0 { -hk } else { self.z0 })
            .collect();
        let mut mu: Vec<f64> = z
            .iter()
            .map(|&zk| {
                if gamma / zk > self.z0 {
                    gamma / zk
                } else {
                    self.z0
                }
            })
            .collect();

        let mut gradient = vec![0.0; nv];
        let mut workspace = vec![0.0; nv];

        for _iteration in 0..self.max_iterations {
            hessian_product(&y, &mut workspace);
            for i in 0..nv {
                gradient[i] = workspace[i] + linear_objective[i];
            }
            let mut l_x = gradient.clone();
            for (r, (row, _, _)) in split.equalities.iter().enumerate() {
                for i in 0..nv {
                    l_x[i] += row[i] * lam[r];
                }
            }
            for (r, (row, _, _, _)) in split.inequalities.iter().enumerate() {
                for i in 0..nv {
                    l_x[i] += row[i] * mu[r];
                }
            }

            let maxh = h.iter().cloned().fold(0.0, f64::max);
            let feascond = f64::max(norm_inf(&g_eq), maxh)
                / (1.0 + f64::max(norm_inf(&y), norm_inf(&z)));
            let gradcond =
                norm_inf(&l_x) / (1.0 + f64::max(norm_inf(&lam), norm_inf(&mu)));
            let compcond = dot(&z, &mu) / (1.0 + norm_inf(&y));
            if feascond < self.tolerance && gradcond < self.tolerance && compcond < self.tolerance
            {
                return InnerSolution::Converged { y, lam, mu };
            }

            // condensed system M = H + Ai' * diag(mu/z) * Ai
            let dim = nv + ne;
            let mut kkt = SymmetricCoo::with_capacity(dim, dim * dim / 2 + dim, true);
            let mut m_dense = vec![vec![0.0; nv]; nv];
            if let Some(hess) = hessian {
                for (i, j, v) in hess.iter() {
                    if i < nv && j < nv {
                        m_dense[i][j] += v;
                        if i != j {
                            m_dense[j][i] += v;
                        }
                    }
                }
            }
            if proximal != 0.0 {
                for i in 0..nv {
                    m_dense[i][i] += proximal;
                }
            }
            for (r, (row, _, _, _)) in split.inequalities.iter().enumerate() {
                let weight = mu[r] / z[r];
                for i in 0..nv {
                    if row[i] == 0.0 {
                        continue;
                    }
                    for j in 0..=i {
                        if row[j] != 0.0 {
                            m_dense[i][j] += weight * row[i] * row[j];
                            if i != j {
                                m_dense[j][i] += weight * row[i] * row[j];
                            }
                        }
                    }
                }
            }
            for i in 0..nv {
                for j in 0..=i {
                    if m_dense[i][j] != 0.0 {
                        kkt.insert(m_dense[i][j], i, j);
                    }
                }
            }
            for (r, (row, _, _)) in split.equalities.iter().enumerate() {
                for i in 0..nv {
                    if row[i] != 0.0 {
                        kkt.insert(row[i], nv + r, i);
                    }
                }
            }

            // N = Lx + Ai' * zinv .* (mu.*h + gamma*e)
            let mut n_vec = l_x.clone();
            for (r, (row, _, _, _)) in split.inequalities.iter().enumerate() {
                let term = (mu[r] * h[r] + gamma) / z[r];
                for i in 0..nv {
                    n_vec[i] += row[i] * term;
                }
            }

            let mut rhs = vec![0.0; dim];
            for i in 0..nv {
                rhs[i] = -n_vec[i];
            }
            for r in 0..ne {
                rhs[nv + r] = -g_eq[r];
            }

            // factor, regularizing away singular pivots
            let mut solver = DenseLdl::new(dim);
            let mut delta = 0.0;
            let step = loop {
                kkt.set_regularization(|i| if i < nv { delta } else { -delta });
                if solver.factorize(&kkt).is_err() {
                    return InnerSolution::Failed;
                }
                if !solver.is_singular() {
                    let mut solution = rhs.clone();
                    if solver.solve(&mut solution).is_err() {
                        return InnerSolution::Failed;
                    }
                    break solution;
                }
                delta = if delta == 0.0 { 1e-10 } else { delta * 100.0 };
                if delta > 1e-2 {
                    return InnerSolution::Failed;
                }
            };
            if step.iter().any(|v| v.is_nan()) || crate::math::norm(&step) > self.max_step_size {
                return InnerSolution::Diverged;
            }

            let dy: Vec<f64> = step[..nv].to_vec();
            let dlam: Vec<f64> = step[nv..].to_vec();
            let mut dz = vec![0.0; ni];
            for (r, (row, _, _, _)) in split.inequalities.iter().enumerate() {
                dz[r] = -h[r] - z[r] - dot(row, &dy);
            }
            let mut dmu = vec![0.0; ni];
            for r in 0..ni {
                dmu[r] = -mu[r] + (gamma - mu[r] * dz[r]) / z[r];
            }

            let alphap = step_to_boundary(&z, &dz, self.xi);
            let alphad = step_to_boundary(&mu, &dmu, self.xi);

            for i in 0..nv {
                y[i] += alphap * dy[i];
            }
            for r in 0..ni {
                z[r] += alphap * dz[r];
                mu[r] += alphad * dmu[r];
            }
            for r in 0..ne {
                lam[r] += alphad * dlam[r];
            }
            if ni > 0 {
                gamma = self.sigma * dot(&z, &mu) / (ni as f64);
            }

            let fresh = residuals(&y);
            h = fresh.0;
            g_eq = fresh.1;

            if y.iter().any(|v| v.is_nan())
                || alphap < self.alpha_min
                || alphad < self.alpha_min
                || (ni > 0 && (gamma < f64::EPSILON * 1e-3 || gamma > 1.0 / f64::EPSILON))
            {
                return InnerSolution::Failed;
            }
        }
        InnerSolution::Failed
    }

    /// Maps the combined-row duals back onto the crate's sign convention
    /// and assembles the returned direction.
    #[allow(clippy::too_many_arguments)]
    fn extract_direction(
        &self,
        nv: usize,
        q: usize,
        variable_bounds: &[Range],
        constraint_bounds: &[Range],
        jacobian: &[SparseVector],
        linear_objective: &[f64],
        hessian: Option<&SymmetricCoo>,
        split: &RowSplit,
        mut y: Vec<f64>,
        duals_eq: &[f64],
        duals_ineq: &[f64],
        direction: &mut Direction,
    ) {
        let mut multipliers = Multipliers::zeros(nv, q);
        multipliers.objective = 0.0;
        let mut active_set = ActiveSet::default();

        // snap displacements onto active bounds
        for i in 0..nv {
            let range = &variable_bounds[i];
            if range.lower.is_finite() && (y[i] - range.lower).abs() <= self.snap_tolerance {
                y[i] = range.lower;
                active_set.bounds.at_lower.push(i);
            } else if range.upper.is_finite() && (range.upper - y[i]).abs() <= self.snap_tolerance
            {
                y[i] = range.upper;
                active_set.bounds.at_upper.push(i);
            }
        }
        for (j, row) in jacobian.iter().enumerate() {
            let value = row.dot(&y);
            let range = &constraint_bounds[j];
            if range.lower.is_finite() && (value - range.lower).abs() <= self.snap_tolerance {
                active_set.constraints.at_lower.push(j);
            } else if range.upper.is_finite() && (range.upper - value).abs() <= self.snap_tolerance
            {
                active_set.constraints.at_upper.push(j);
            }
        }

        for (r, (_, _, index)) in split.equalities.iter().enumerate() {
            let dual = -duals_eq[r];
            if *index < nv {
                // fixed variable: net bound dual split by sign
                multipliers.lower_bounds[*index] = dual.max(0.0);
                multipliers.upper_bounds[*index] = dual.min(0.0);
            } else {
                multipliers.constraints[*index - nv] = dual;
            }
        }
        for (r, (row, b, index, upper)) in split.inequalities.iter().enumerate() {
            // threshold multipliers of non-binding rows
            let slack = b - dot(row, &y);
            let mut dual = duals_ineq[r];
            if slack > self.feasibility_tolerance && dual < self.mu_threshold {
                dual = 0.0;
            }
            if *index < nv {
                if *upper {
                    multipliers.upper_bounds[*index] -= dual;
                } else {
                    multipliers.lower_bounds[*index] += dual;
                }
            } else if *upper {
                multipliers.constraints[*index - nv] -= dual;
            } else {
                multipliers.constraints[*index - nv] += dual;
            }
        }

        direction.objective = dot(linear_objective, &y)
            + hessian
                .map(|h| 0.5 * h.quadratic_product(&y, &y, nv))
                .unwrap_or(0.0);
        direction.norm = norm_inf(&y);
        direction.x = y;
        direction.multipliers = multipliers;
        direction.active_set = active_set;
    }
}

enum InnerSolution {
    Converged {
        y: Vec<f64>,
        lam: Vec<f64>,
        mu: Vec<f64>,
    },
    Diverged,
    Failed,
}

/// Largest step in (0, 1] keeping `v + alpha*dv` positive, damped by `xi`.
fn step_to_boundary(v: &[f64], dv: &[f64], xi: f64) -> f64 {
    let mut alpha: f64 = 1.0;
    for (vk, dvk) in v.iter().zip(dv) {
        if *dvk < 0.0 {
            alpha = alpha.min(xi * vk / -dvk);
        }
    }
    alpha
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use float_cmp::assert_approx_eq;

    use super::*;

    fn range_vec(bounds: &[(f64, f64)]) -> Vec<Range> {
        bounds.iter().map(|&(l, u)| Range::new(l, u)).collect()
    }

    /// example from 'doc quadprog', as a displacement model at the origin
    #[test]
    fn constrained_2d_qp() {
        let mut hessian = SymmetricCoo::zero(2);
        hessian.insert(1.0, 0, 0);
        hessian.insert(-1.0, 1, 0);
        hessian.insert(2.0, 1, 1);

        let mut objective = SparseVector::new();
        objective.set(0, -2.0);
        objective.set(1, -6.0);

        let mut rows = vec![SparseVector::new(), SparseVector::new(), SparseVector::new()];
        rows[0].set(0, 1.0);
        rows[0].set(1, 1.0);
        rows[1].set(0, -1.0);
        rows[1].set(1, 2.0);
        rows[2].set(0, 2.0);
        rows[2].set(1, 1.0);

        let variable_bounds = range_vec(&[(0.0, f64::INFINITY), (0.0, f64::INFINITY)]);
        let constraint_bounds = vec![
            Range::upper_bounded(2.0),
            Range::upper_bounded(2.0),
            Range::upper_bounded(3.0),
        ];

        let mut solver = InteriorPointQp::default();
        let direction = solver
            .solve_qp(
                2,
                3,
                &variable_bounds,
                &constraint_bounds,
                &objective,
                &rows,
                &hessian,
                &[0.0, 0.0],
            )
            .unwrap();

        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert_approx_eq!(f64, direction.objective, -74.0 / 9.0, epsilon = 1e-6);
        zip(&direction.x, vec![2.0 / 3.0, 4.0 / 3.0])
            .for_each(|(a, b)| assert_approx_eq!(f64, *a, b, epsilon = 1e-6));
        // upper-side constraint duals are nonpositive in this convention
        zip(
            &direction.multipliers.constraints,
            vec![-28.0 / 9.0, -4.0 / 9.0, 0.0],
        )
        .for_each(|(a, b)| assert_approx_eq!(f64, *a, b, epsilon = 1e-4));
    }

    #[test]
    fn bounded_quadratic_duals() {
        // min 1/2||d||^2 + b'd, d >= 0, b = (-1, 2): d* = (1, 0), zL = (0, 2)
        let mut hessian = SymmetricCoo::zero(2);
        hessian.insert(1.0, 0, 0);
        hessian.insert(1.0, 1, 1);
        let mut objective = SparseVector::new();
        objective.set(0, -1.0);
        objective.set(1, 2.0);
        let variable_bounds = range_vec(&[(0.0, f64::INFINITY), (0.0, f64::INFINITY)]);

        let mut solver = InteriorPointQp::default();
        let direction = solver
            .solve_qp(2, 0, &variable_bounds, &[], &objective, &[], &hessian, &[0.0, 0.0])
            .unwrap();

        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert_approx_eq!(f64, direction.x[0], 1.0, epsilon = 1e-6);
        assert_eq!(direction.x[1], 0.0); // snapped onto the bound
        assert!(direction.active_set.bounds.at_lower.contains(&1));
        assert_approx_eq!(f64, direction.multipliers.lower_bounds[1], 2.0, epsilon = 1e-5);
        assert_approx_eq!(f64, direction.multipliers.lower_bounds[0], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn inconsistent_rows_partitioned() {
        // d >= 1 and d <= 0 cannot hold; minimum violation is 1
        let mut rows = vec![SparseVector::new(), SparseVector::new()];
        rows[0].set(0, 1.0);
        rows[1].set(0, 1.0);
        let constraint_bounds = vec![Range::lower_bounded(1.0), Range::upper_bounded(0.0)];
        let objective = SparseVector::new();

        let mut solver = InteriorPointQp::default();
        let direction = solver
            .solve_lp(
                1,
                2,
                &[Range::UNBOUNDED],
                &constraint_bounds,
                &objective,
                &rows,
                &[0.0],
            )
            .unwrap();

        assert_eq!(direction.status, SubproblemStatus::Infeasible);
        let partition = direction.constraint_partition.unwrap();
        assert_eq!(partition.infeasible.len(), 2);
        assert_approx_eq!(f64, direction.objective, 1.0, epsilon = 1e-5);
        // one side violated below, the other above
        assert!(matches!(
            (partition.side[0], partition.side[1]),
            (ConstraintSide::InfeasibleLower, ConstraintSide::InfeasibleUpper)
                | (ConstraintSide::Feasible, ConstraintSide::InfeasibleUpper)
                | (ConstraintSide::InfeasibleLower, ConstraintSide::Feasible)
        ));
    }

    #[test]
    fn inconsistent_bounds_rejected() {
        let objective = SparseVector::new();
        let mut solver = InteriorPointQp::default();
        let direction = solver
            .solve_lp(
                1,
                0,
                &[Range::new(1.0, 0.0)],
                &[],
                &objective,
                &[],
                &[0.0],
            )
            .unwrap();
        assert_eq!(direction.status, SubproblemStatus::BoundInconsistency);
    }

    #[test]
    fn equality_row_dual_sign() {
        // min 1/2 d^2 s.t. d = 2: dual from d - lambda = 0 -> lambda = 2
        let mut hessian = SymmetricCoo::zero(1);
        hessian.insert(1.0, 0, 0);
        let objective = SparseVector::new();
        let mut rows = vec![SparseVector::new()];
        rows[0].set(0, 1.0);

        let mut solver = InteriorPointQp::default();
        let direction = solver
            .solve_qp(
                1,
                1,
                &[Range::UNBOUNDED],
                &[Range::equality(2.0)],
                &objective,
                &rows,
                &hessian,
                &[0.0],
            )
            .unwrap();
        assert_eq!(direction.status, SubproblemStatus::Optimal);
        assert_approx_eq!(f64, direction.x[0], 2.0, epsilon = 1e-6);
        assert_approx_eq!(f64, direction.multipliers.constraints[0], 2.0, epsilon = 1e-5);
    }
}
