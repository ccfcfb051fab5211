//! Levenberg–Marquardt backend on the `levenberg-marquardt` crate.
//!
//! Problems are written against the workspace `nalgebra`; the solver crate
//! pins its own `nalgebra` release, so vectors and matrices are copied
//! across at the wrapper boundary (both are column-major and contiguous).

use crate::params::SolverOptions;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use lm_nalgebra::{storage::Owned, Dyn};
use log::trace;
use nalgebra::{DMatrix, DVector};

/// A nonlinear least-squares problem `min_x 0.5 * |r(x)|^2`.
pub(crate) trait NllsProblem {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct SolveReport {
    /// Residual evaluations spent by the solver.
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

fn to_solver_vector(v: &DVector<f64>) -> lm_nalgebra::DVector<f64> {
    lm_nalgebra::DVector::from_column_slice(v.as_slice())
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &lm_nalgebra::DVector<f64>) {
        self.params = DVector::from_column_slice(x.as_slice());
    }

    fn params(&self) -> lm_nalgebra::DVector<f64> {
        to_solver_vector(&self.params)
    }

    fn residuals(&self) -> Option<lm_nalgebra::DVector<f64>> {
        Some(to_solver_vector(&self.problem.residuals(&self.params)))
    }

    fn jacobian(&self) -> Option<lm_nalgebra::DMatrix<f64>> {
        let j = self.problem.jacobian(&self.params);
        Some(lm_nalgebra::DMatrix::from_column_slice(
            j.nrows(),
            j.ncols(),
            j.as_slice(),
        ))
    }
}

/// Minimize `problem` from `x0`.
pub(crate) fn solve<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &SolverOptions,
) -> (DVector<f64>, SolveReport) {
    let initial_cost = 0.5 * problem.residuals(&x0).norm_squared();
    if !initial_cost.is_finite() {
        return (
            x0,
            SolveReport {
                initial_cost,
                final_cost: initial_cost,
                ..Default::default()
            },
        );
    }

    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_stepbound(opts.stepbound)
        .with_patience(opts.max_iterations.max(1));

    let (wrapper, report) = lm.minimize(LmWrapper {
        problem,
        params: x0,
    });
    trace!("lm terminated: {:?}", report.termination);

    (
        wrapper.params,
        SolveReport {
            iterations: report.number_of_evaluations,
            initial_cost,
            final_cost: report.objective_function,
            converged: report.termination.was_successful(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Fit `y = a * exp(b * t)`.
    struct ExpFit {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl NllsProblem for ExpFit {
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            )
        }

        fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.t.len(), 2);
            for (i, t) in self.t.iter().enumerate() {
                let e = (x[1] * t).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = x[0] * t * e;
            }
            j
        }
    }

    #[test]
    fn fits_an_exponential() {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y = t.iter().map(|t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = ExpFit { t, y };

        let (x, report) = solve(
            &problem,
            DVector::from_vec(vec![1.0, 0.0]),
            &SolverOptions::default(),
        );
        assert!(report.converged, "{report:?}");
        assert!(report.iterations > 0);
        assert!(report.final_cost < report.initial_cost);
        assert!(report.final_cost < 1e-12);
        assert_relative_eq!(x[0], 2.5, epsilon = 1e-6);
        assert_relative_eq!(x[1], -1.3, epsilon = 1e-6);
    }

    #[test]
    fn non_finite_start_is_returned_unchanged() {
        let problem = ExpFit {
            t: vec![0.0, 1.0],
            y: vec![f64::NAN, 1.0],
        };
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let (x, report) = solve(&problem, x0.clone(), &SolverOptions::default());
        assert_eq!(x, x0);
        assert!(!report.converged);
        assert_eq!(report.iterations, 0);
    }
}
