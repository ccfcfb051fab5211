use serde::{Deserialize, Serialize};

/// Levenberg–Marquardt termination and trust-region settings, passed to
/// the `levenberg-marquardt` solver.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Solver patience: residual evaluations allowed per parameter.
    pub max_iterations: usize,
    /// Relative tolerance on the cost reduction of a step.
    pub ftol: f64,
    /// Relative tolerance on the parameter update.
    pub xtol: f64,
    /// Orthogonality tolerance between residuals and Jacobian columns.
    pub gtol: f64,
    /// Initial trust-region radius factor.
    pub stepbound: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            stepbound: 100.0,
        }
    }
}

/// Parameters of a calibration run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Greedy coverage selection size. `None` or `Some(0)` uses every view.
    pub num_selections: Option<usize>,
    pub solver: SolverOptions,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            num_selections: Some(10),
            solver: SolverOptions::default(),
        }
    }
}
