//! Levenberg-Marquardt nonlinear least-squares solver.
//!
//! Minimises `0.5 * ||r(x)||²` over an unconstrained real vector `x`:
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr
//! ```
//!
//! with a forward-difference Jacobian, a gain-ratio controlled damping update
//! (Nielsen) and the usual three stopping tests:
//!
//! - **ftol**: accepted step reduced the cost by less than `ftol * cost`
//! - **xtol**: step norm below `xtol * (xtol + ||x||)`
//! - **gtol**: `||Jᵀr||∞` below `gtol`
//!
//! The evaluation budget counts residual evaluations only; the `n` extra
//! evaluations spent on each finite-difference Jacobian are not counted.

/// Configuration for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    /// Maximum residual-function evaluations (excluding finite-difference Jacobian columns)
    pub max_evals: usize,
    /// Relative cost-reduction tolerance
    pub ftol: f64,
    /// Relative step tolerance
    pub xtol: f64,
    /// Gradient infinity-norm tolerance
    pub gtol: f64,
    /// Initial damping factor
    pub initial_lambda: f64,
    /// Damping factor at which the solver gives up on a stuck iterate
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_evals: 300,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_lambda: 1e-3,
            max_lambda: 1e16,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    FunctionTolerance,
    StepTolerance,
    GradientTolerance,
    /// The evaluation budget ran out
    MaxEvaluations,
    /// Damping blew up without finding a descent step (or the problem is empty)
    NumericalFailure,
}

impl TerminationReason {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            TerminationReason::FunctionTolerance
                | TerminationReason::StepTolerance
                | TerminationReason::GradientTolerance
        )
    }
}

/// Result of a least-squares solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LmResult {
    pub x: Vec<f64>,
    /// `0.5 * ||r(x)||²`
    pub cost: f64,
    pub residuals: Vec<f64>,
    /// Residual evaluations made (finite-difference Jacobian columns excluded)
    pub nfev: usize,
    /// Accepted plus rejected steps
    pub iterations: usize,
    pub reason: TerminationReason,
}

impl LmResult {
    pub fn success(&self) -> bool {
        self.reason.is_converged()
    }
}

#[inline]
fn cost_of(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

#[inline]
fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Forward-difference Jacobian, row-major `m x n`.
fn jacobian<F>(residual_fn: &F, x: &[f64], r0: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x.len();
    let m = r0.len();
    let eps = f64::EPSILON.sqrt();
    let mut jac = vec![vec![0.0; n]; m];

    for c in 0..n {
        let mut xp = x.to_vec();
        let h = eps * x[c].abs().max(1.0);
        xp[c] += h;
        let h = xp[c] - x[c];
        let rp = residual_fn(&xp);
        for (row, (&a, &b)) in jac.iter_mut().zip(rp.iter().zip(r0)) {
            row[c] = (a - b) / h;
        }
    }
    jac
}

/// Solve `a x = b` for symmetric positive-definite `a` by Cholesky.
fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Minimise `0.5 * ||residual_fn(x)||²` starting from `x0`.
///
/// Never fails: an empty problem or a non-finite starting cost stops
/// immediately with [`TerminationReason::NumericalFailure`], and the best
/// iterate found so far is always returned.
pub fn levenberg_marquardt<F>(residual_fn: F, x0: &[f64], config: &LmConfig) -> LmResult
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x0.len();
    let mut x = x0.to_vec();
    let mut r = residual_fn(&x);
    let mut nfev = 1usize;
    let mut cost = cost_of(&r);
    let mut iterations = 0usize;

    if n == 0 || r.is_empty() || !cost.is_finite() {
        return LmResult {
            x,
            cost,
            residuals: r,
            nfev,
            iterations,
            reason: TerminationReason::NumericalFailure,
        };
    }

    let mut lambda = config.initial_lambda;
    let mut nu = 2.0;
    let mut refresh_jacobian = true;
    let mut jtj = vec![vec![0.0; n]; n];
    let mut g = vec![0.0; n];

    let reason = loop {
        if refresh_jacobian {
            let jac = jacobian(&residual_fn, &x, &r);
            for i in 0..n {
                g[i] = jac.iter().zip(&r).map(|(row, ri)| row[i] * ri).sum();
                for j in 0..n {
                    jtj[i][j] = jac.iter().map(|row| row[i] * row[j]).sum();
                }
            }
            refresh_jacobian = false;

            let g_inf = g.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            if !g_inf.is_finite() {
                break TerminationReason::NumericalFailure;
            }
            if g_inf < config.gtol {
                break TerminationReason::GradientTolerance;
            }
        }

        if nfev >= config.max_evals {
            break TerminationReason::MaxEvaluations;
        }
        if lambda > config.max_lambda {
            break TerminationReason::NumericalFailure;
        }

        let mut damped = jtj.clone();
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] += lambda * jtj[i][i].max(1e-12);
        }
        let neg_g: Vec<f64> = g.iter().map(|v| -v).collect();
        let Some(step) = solve_cholesky(&damped, &neg_g) else {
            lambda *= nu;
            nu *= 2.0;
            continue;
        };
        iterations += 1;

        let step_norm = norm(&step);
        let x_norm = norm(&x);
        let candidate: Vec<f64> = x.iter().zip(&step).map(|(xi, di)| xi + di).collect();
        let r_new = residual_fn(&candidate);
        nfev += 1;
        let cost_new = cost_of(&r_new);

        // predicted reduction of the local quadratic model
        let jtj_step: Vec<f64> = jtj
            .iter()
            .map(|row| row.iter().zip(&step).map(|(a, b)| a * b).sum())
            .collect();
        let predicted = -(g.iter().zip(&step).map(|(a, b)| a * b).sum::<f64>()
            + 0.5 * step.iter().zip(&jtj_step).map(|(a, b)| a * b).sum::<f64>());

        if cost_new.is_finite() && cost_new < cost {
            let actual = cost - cost_new;
            let gain = if predicted > 0.0 { actual / predicted } else { 1.0 };

            x = candidate;
            r = r_new;
            cost = cost_new;
            refresh_jacobian = true;
            lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * gain - 1.0).powi(3));
            nu = 2.0;

            if cost == 0.0 || (actual < config.ftol * (cost + actual) && gain > 0.25) {
                break TerminationReason::FunctionTolerance;
            }
            if step_norm < config.xtol * (config.xtol + x_norm) {
                break TerminationReason::StepTolerance;
            }
        } else {
            if step_norm < config.xtol * (config.xtol + x_norm) {
                break TerminationReason::StepTolerance;
            }
            lambda *= nu;
            nu *= 2.0;
        }
    };

    LmResult {
        x,
        cost,
        residuals: r,
        nfev,
        iterations,
        reason,
    }
}
