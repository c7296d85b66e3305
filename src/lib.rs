//! L1-regularized least squares (Lasso) solved with active-set coordinate descent.
//!
//! This crate minimizes `(1 / 2N) * ||y - X beta||^2 + lambda * ||beta||_1` for a
//! dense `N x p` design `X` and a fixed penalty `lambda`.
//!
//! How it works (high level):
//! - Sweep the active predictors in ascending order, updating each coefficient
//!   from its partial residual with a soft-threshold step.
//! - Drop predictors whose coefficient falls to zero from the active set.
//! - Once a sweep moves no coefficient by more than the tolerance, re-admit any
//!   excluded predictor whose correlation with the residual exceeds `lambda`
//!   by more than the tolerance and keep sweeping; otherwise stop.
//! - Certify the result with the KKT conditions.
//!
//! Calling it:
//! - Pass a `faer_core::Mat`, a `MatRef` or an array-of-arrays as the design.
//! - Call `lasso` (or `lasso_with_options`) and inspect `LassoFit`.
//!
//! Example:
//! ```rust,no_run
//! use lasso_rs::lasso;
//!
//! let x = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
//! let y = [1.0, 1.0, 2.0];
//! let fit = lasso(&x, &y, 0.1).unwrap();
//! assert!(fit.optimum_found);
//! assert!((fit.beta[0] - 0.9).abs() < 1e-6);
//! ```

mod input;
mod ops;
mod report;
mod solver;

pub use input::{rows_to_matrix, Design, InputError};
pub use ops::{dot, dot_columns, mat_vec, mat_vec_into, soft_threshold};
pub use report::{Reporter, SolverStats, StdoutReporter, SweepReport};
pub use solver::{
    lasso, lasso_with_options, KktCheck, LassoError, LassoFit, LassoFitter, LassoOptions,
    SolveError, DEFAULT_TOLERANCE,
};
