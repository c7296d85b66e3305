use core::fmt;

use faer_core::{Mat, MatRef};
use std::time::{Duration, Instant};

use crate::input::{check_problem, Design, InputError};
use crate::ops::{copy_column, dot, dot_columns, mat_vec, mat_vec_into, soft_threshold};
use crate::report::{emit_line, Reporter, SolverStats, StdoutReporter, SweepReport};

/// Coefficient change below which a sweep counts as converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Errors specific to a solve call.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The sweep budget ran out before the active set settled.
    ConvergenceFailure { sweeps: usize, max_change: f64 },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConvergenceFailure { sweeps, max_change } => write!(
                f,
                "no convergence after {sweeps} sweeps (last max change {max_change:.3e})"
            ),
        }
    }
}

impl std::error::Error for SolveError {}

/// Errors returned by [`lasso`].
#[derive(Debug, Clone, PartialEq)]
pub enum LassoError {
    /// An argument failed validation.
    Input(InputError),
    /// The solve did not converge.
    Solve(SolveError),
}

impl fmt::Display for LassoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(err) => write!(f, "invalid input argument: {err}"),
            Self::Solve(err) => write!(f, "lasso solve failed: {err}"),
        }
    }
}

impl std::error::Error for LassoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Input(err) => Some(err),
            Self::Solve(err) => Some(err),
        }
    }
}

impl From<InputError> for LassoError {
    fn from(err: InputError) -> Self {
        Self::Input(err)
    }
}

impl From<SolveError> for LassoError {
    fn from(err: SolveError) -> Self {
        Self::Solve(err)
    }
}

/// Which coefficients the optimality certificate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KktCheck {
    /// Zero coefficients need `|G| <= lambda + tol`, positive ones need
    /// `G - lambda <= tol`; negative coefficients pass unchecked.
    #[default]
    PositiveOnly,
    /// Every nonzero coefficient needs `|G - lambda * sign(beta)| <= tol`.
    Symmetric,
}

/// Options controlling the coordinate-descent solve.
#[derive(Debug, Clone)]
pub struct LassoOptions {
    /// Maximum number of sweeps over the active set, across all
    /// re-admission rounds.
    pub max_sweeps: usize,
    /// Converge when no coefficient moves by more than this; also the pruning
    /// threshold and the slack of the KKT certificate.
    pub tolerance: f64,
    /// Optimality certificate variant.
    pub kkt_check: KktCheck,
    /// Emit per-sweep diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for LassoOptions {
    fn default() -> Self {
        Self {
            max_sweeps: 10_000,
            tolerance: DEFAULT_TOLERANCE,
            kkt_check: KktCheck::PositiveOnly,
            verbose: false,
        }
    }
}

/// Result of a Lasso fit.
#[derive(Debug, Clone)]
pub struct LassoFit {
    /// Fitted coefficients, one per design column.
    pub beta: Vec<f64>,
    /// `y - X * beta`.
    pub residuals: Vec<f64>,
    /// Whether the final coefficients pass the KKT certificate.
    pub optimum_found: bool,
    /// Sweep counts and final active-set size.
    pub stats: SolverStats,
}

/// Outcome of a single sweep over the active set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SweepOutcome {
    pub(crate) converged: bool,
    pub(crate) max_change: f64,
    pub(crate) pruned: usize,
}

/// Active-set coordinate descent for
/// `min (1 / 2N) * ||y - X beta||^2 + lambda * ||beta||_1`.
///
/// The fitter borrows `X` and `y` and owns every piece of mutable state. Build
/// it with [`LassoFitter::new`], then run [`LassoFitter::solve`].
pub struct LassoFitter<'a> {
    x: MatRef<'a, f64>,
    y: &'a [f64],
    lambda: f64,
    nrows: usize,
    ncols: usize,
    beta: Vec<f64>,
    betastar: Vec<f64>,
    active: Vec<usize>,
    nonactive: Vec<usize>,
    presid: Mat<f64>,
    resid: Vec<f64>,
    column: Vec<f64>,
    // (1 / N) * ||X[:, j]||^2
    scale: Vec<f64>,
    tolerance: f64,
    kkt_check: KktCheck,
}

enum ReporterSlot<'a> {
    External(&'a mut dyn Reporter),
    Local(StdoutReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    fn new(reporter: Option<&'a mut dyn Reporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(StdoutReporter::new()),
            None => Self::None,
        }
    }

    fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

impl<'a> LassoFitter<'a> {
    /// Validate the problem and build the initial state: zero coefficients,
    /// every predictor active.
    pub fn new(x: MatRef<'a, f64>, y: &'a [f64], lambda: f64) -> Result<Self, InputError> {
        check_problem(x, y, lambda)?;
        let nrows = x.nrows();
        let ncols = x.ncols();

        let mut column = vec![0.0; nrows];
        let mut scale = vec![0.0; ncols];
        for (col, s) in scale.iter_mut().enumerate() {
            copy_column(&mut column, x, col);
            *s = dot(&column, &column) / nrows as f64;
        }

        Ok(Self {
            x,
            y,
            lambda,
            nrows,
            ncols,
            beta: vec![0.0; ncols],
            betastar: vec![0.0; ncols],
            active: (0..ncols).collect(),
            nonactive: Vec::with_capacity(ncols),
            presid: Mat::zeros(nrows, ncols),
            resid: vec![0.0; nrows],
            column,
            scale,
            tolerance: DEFAULT_TOLERANCE,
            kkt_check: KktCheck::default(),
        })
    }

    /// Number of observations (rows of X).
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of predictors (columns of X).
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// L1 penalty strength.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Current coefficients.
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Active predictors, ascending.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Excluded predictors, ascending.
    pub fn nonactive(&self) -> &[usize] {
        &self.nonactive
    }

    /// Run coordinate descent to a fixed point that survives the exclusion
    /// test.
    ///
    /// Sweeps repeat until no coefficient moves by more than the tolerance.
    /// Excluded predictors that fail the exclusion test are re-admitted and
    /// sweeping resumes. Every sweep counts against `options.max_sweeps`.
    pub fn solve(
        &mut self,
        options: &LassoOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, SolveError> {
        self.tolerance = options.tolerance;
        self.kkt_check = options.kkt_check;
        let start_time = options.verbose.then(Instant::now);
        let mut reporter = ReporterSlot::new(reporter, options.verbose);

        let mut readmission_rounds = 0;
        let mut last_change = f64::INFINITY;
        // (active size before, count) of the re-admission made by the previous sweep.
        let mut last_readmission: Option<(usize, usize)> = None;

        for sweep in 0..options.max_sweeps {
            let outcome = self.sweep();
            last_change = outcome.max_change;

            let mut readmitted = 0;
            let mut settled = false;
            let previous = last_readmission.take();
            if outcome.converged {
                let undone = previous.is_some_and(|(base, count)| {
                    outcome.pruned == count && self.active.len() == base
                });
                let before = self.active.len();
                if undone {
                    log::debug!("sweep {sweep}: re-admitted predictors pruned again");
                    settled = true;
                } else if self.test_active_set() {
                    readmitted = self.active.len() - before;
                    readmission_rounds += 1;
                    last_readmission = Some((before, readmitted));
                    log::debug!("sweep {sweep}: re-admitted {readmitted} predictor(s)");
                } else {
                    settled = true;
                }
            }

            if let Some(reporter) = reporter.as_mut() {
                reporter.on_sweep(&SweepReport {
                    sweep,
                    active: self.active.len(),
                    nonactive: self.nonactive.len(),
                    max_change: outcome.max_change,
                    pruned: outcome.pruned,
                    readmitted,
                    converged: outcome.converged,
                });
            }

            if settled {
                let stats = SolverStats {
                    sweeps: sweep + 1,
                    readmission_rounds,
                    active: self.active.len(),
                    max_change: outcome.max_change,
                };
                finish(start_time, &mut reporter);
                return Ok(stats);
            }
        }

        finish(start_time, &mut reporter);
        log::warn!(
            "coordinate descent stopped after {} sweeps (max change {last_change:.3e})",
            options.max_sweeps
        );
        Err(SolveError::ConvergenceFailure {
            sweeps: options.max_sweeps,
            max_change: last_change,
        })
    }

    /// One pass over the active set in ascending order, then pruning.
    pub(crate) fn sweep(&mut self) -> SweepOutcome {
        let n = self.nrows as f64;
        let mut converged = true;
        let mut max_change: f64 = 0.0;

        for idx in 0..self.active.len() {
            let j = self.active[idx];

            // Partial residual with predictor j's own contribution left out.
            for i in 0..self.nrows {
                let mut r = self.y[i];
                for k in 0..self.ncols {
                    if k != j {
                        r -= self.x.read(i, k) * self.beta[k];
                    }
                }
                self.presid.write(i, j, r);
            }

            self.betastar[j] = dot_columns(self.x, self.presid.as_ref(), j) / n;
            let scale = self.scale[j];
            let new_beta = if scale > 0.0 {
                soft_threshold(self.betastar[j], self.lambda) / scale
            } else {
                0.0
            };

            let change = (new_beta - self.beta[j]).abs();
            if change > self.tolerance {
                converged = false;
            }
            max_change = max_change.max(change);
            self.beta[j] = new_beta;
        }

        let pruned = self.prune();
        SweepOutcome {
            converged,
            max_change,
            pruned,
        }
    }

    // Moves active predictors whose coefficient fell below the tolerance into
    // the non-active set and zeroes them. Both sets stay sorted.
    fn prune(&mut self) -> usize {
        let tolerance = self.tolerance;
        let beta = &mut self.beta;
        let nonactive = &mut self.nonactive;
        let before = nonactive.len();
        self.active.retain(|&j| {
            if beta[j].abs() < tolerance {
                beta[j] = 0.0;
                nonactive.push(j);
                false
            } else {
                true
            }
        });
        let pruned = nonactive.len() - before;
        if pruned > 0 {
            nonactive.sort_unstable();
        }
        pruned
    }

    /// Exclusion test for the non-active predictors.
    ///
    /// A predictor `j` with
    /// `|X[:, j] . (y - X beta)| / N > lambda + tol * max(scale_j, 1)` is moved
    /// back into the active set, where `scale_j = ||X[:, j]||^2 / N`. Below
    /// that margin its next coefficient would be pruned again. Returns true if
    /// the active set changed.
    pub fn test_active_set(&mut self) -> bool {
        residuals_into(&mut self.resid, self.x, self.y, &self.beta);

        let n = self.nrows as f64;
        let lambda = self.lambda;
        let tolerance = self.tolerance;
        let scale = &self.scale;
        let x = self.x;
        let resid = &self.resid;
        let column = &mut self.column;
        let active = &mut self.active;
        let before = active.len();
        self.nonactive.retain(|&j| {
            copy_column(column, x, j);
            if dot(column, resid).abs() / n > lambda + tolerance * scale[j].max(1.0) {
                active.push(j);
                false
            } else {
                true
            }
        });

        let changed = active.len() > before;
        if changed {
            active.sort_unstable();
        }
        changed
    }

    /// Checks the Karush-Kuhn-Tucker conditions at the current coefficients.
    ///
    /// With `G = X^T (y - X beta) / N`, a zero coefficient needs
    /// `|G_i| <= lambda + tol` and a positive one needs `G_i - lambda <= tol`.
    /// Negative coefficients are only checked under [`KktCheck::Symmetric`].
    pub fn test_kkt(&self) -> bool {
        let resid = self.calc_residuals();
        let gradient = mat_vec(self.x.transpose(), &resid);
        let n = self.nrows as f64;
        self.beta
            .iter()
            .zip(gradient.iter())
            .all(|(&beta, &g)| {
                kkt_holds(beta, g / n, self.lambda, self.tolerance, self.kkt_check)
            })
    }

    /// Model residuals `y - X beta`.
    pub fn calc_residuals(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.nrows];
        residuals_into(&mut out, self.x, self.y, &self.beta);
        out
    }

    /// Consumes the fitter into the public result.
    pub fn into_fit(self, stats: SolverStats) -> LassoFit {
        let residuals = self.calc_residuals();
        let optimum_found = self.test_kkt();
        LassoFit {
            beta: self.beta,
            residuals,
            optimum_found,
            stats,
        }
    }
}

fn residuals_into(out: &mut [f64], x: MatRef<'_, f64>, y: &[f64], beta: &[f64]) {
    mat_vec_into(out, x, beta);
    for (r, &yi) in out.iter_mut().zip(y.iter()) {
        *r = yi - *r;
    }
}

fn kkt_holds(beta: f64, g: f64, lambda: f64, tolerance: f64, check: KktCheck) -> bool {
    if beta == 0.0 {
        return g.abs() <= lambda + tolerance;
    }
    let sign = beta.signum();
    match check {
        KktCheck::PositiveOnly => beta < 0.0 || g - lambda * sign <= tolerance,
        KktCheck::Symmetric => (g - lambda * sign).abs() <= tolerance,
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}

fn finish(start_time: Option<Instant>, reporter: &mut ReporterSlot<'_>) {
    if let Some(reporter) = reporter.as_mut() {
        reporter.on_finish();
    }
    if let Some(start) = start_time {
        let elapsed = format_duration(start.elapsed());
        emit_line(&format!("time: {elapsed}"));
    }
}

/// Fit a Lasso regression with default options.
///
/// `x` may be a dense matrix or an array-of-arrays. Arguments are validated
/// before any numeric work; see [`lasso_with_options`].
pub fn lasso<'a>(
    x: impl Into<Design<'a>>,
    y: &[f64],
    lambda: f64,
) -> Result<LassoFit, LassoError> {
    lasso_with_options(x, y, lambda, &LassoOptions::default(), None)
}

/// Fit a Lasso regression with explicit options and an optional reporter.
pub fn lasso_with_options<'a>(
    x: impl Into<Design<'a>>,
    y: &[f64],
    lambda: f64,
    options: &LassoOptions,
    reporter: Option<&mut dyn Reporter>,
) -> Result<LassoFit, LassoError> {
    let design = x.into().resolve()?;
    let mut fitter = LassoFitter::new(design.view(), y, lambda)?;
    let stats = fitter.solve(options, reporter)?;
    Ok(fitter.into_fit(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design(rows: &[[f64; 2]]) -> Mat<f64> {
        Mat::from_fn(rows.len(), 2, |i, j| rows[i][j])
    }

    #[test]
    fn new_starts_with_everything_active() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        assert_eq!(fitter.active(), &[0, 1]);
        assert!(fitter.nonactive().is_empty());
        assert_eq!(fitter.beta(), &[0.0, 0.0]);
        assert_eq!((fitter.nrows(), fitter.ncols()), (3, 2));
        assert_eq!(fitter.lambda(), 0.1);
    }

    #[test]
    fn first_sweep_updates_in_order() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        let outcome = fitter.sweep();
        assert!(!outcome.converged);
        // beta0 = S(3/3, 0.1) / (2/3), then beta1 sees the new beta0.
        assert!((fitter.beta()[0] - 1.35).abs() < 1e-12);
        assert!((fitter.beta()[1] - 0.675).abs() < 1e-12);
        assert_eq!(outcome.pruned, 0);
    }

    #[test]
    fn sweep_prunes_zeroed_predictors() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]);
        let y = [2.0, 0.1, 2.0, -0.1];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.5).unwrap();
        let outcome = fitter.sweep();
        assert_eq!(outcome.pruned, 1);
        assert_eq!(fitter.active(), &[0]);
        assert_eq!(fitter.nonactive(), &[1]);
    }

    #[test]
    fn exclusion_test_readmits_violators() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        fitter.active.retain(|&j| j == 0);
        fitter.nonactive.push(1);
        // beta = 0, so |X[:, 1] . y| / N = 1 > 0.1.
        assert!(fitter.test_active_set());
        assert_eq!(fitter.active(), &[0, 1]);
        assert!(fitter.nonactive().is_empty());
        assert!(!fitter.test_active_set());
    }

    #[test]
    fn exclusion_test_ignores_violations_within_tolerance() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        // |X[:, 1] . y| / N = 1 exceeds the penalty by less than the tolerance.
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 1.0 - 1e-10).unwrap();
        fitter.active.retain(|&j| j == 0);
        fitter.nonactive.push(1);
        assert!(!fitter.test_active_set());
        assert_eq!(fitter.nonactive(), &[1]);

        fitter.lambda = 1.0 - 1e-6;
        assert!(fitter.test_active_set());
        assert_eq!(fitter.active(), &[0, 1]);
    }

    #[test]
    fn prune_zeroes_dropped_coefficients() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        fitter.beta = vec![0.5, 1e-12];
        assert_eq!(fitter.prune(), 1);
        assert_eq!(fitter.beta(), &[0.5, 0.0]);
        assert_eq!(fitter.active(), &[0]);
        assert_eq!(fitter.nonactive(), &[1]);
    }

    #[test]
    fn kkt_ignores_negative_coefficients_by_default() {
        assert!(kkt_holds(-1.0, 5.0, 0.1, 1e-9, KktCheck::PositiveOnly));
        assert!(!kkt_holds(-1.0, 5.0, 0.1, 1e-9, KktCheck::Symmetric));
        assert!(kkt_holds(-1.0, -0.1, 0.1, 1e-9, KktCheck::Symmetric));
        assert!(kkt_holds(1.0, 0.05, 0.1, 1e-9, KktCheck::PositiveOnly));
        assert!(!kkt_holds(1.0, 0.2, 0.1, 1e-9, KktCheck::PositiveOnly));
        assert!(kkt_holds(0.0, -0.1, 0.1, 1e-9, KktCheck::PositiveOnly));
        assert!(!kkt_holds(0.0, 0.2, 0.1, 1e-9, KktCheck::Symmetric));
    }

    #[test]
    fn solves_reference_problem() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        let stats = fitter.solve(&LassoOptions::default(), None).unwrap();
        assert!(stats.sweeps > 1);
        assert_eq!(stats.active, 2);
        assert!((fitter.beta()[0] - 0.9).abs() < 1e-6);
        assert!((fitter.beta()[1] - 0.9).abs() < 1e-6);
        assert!(fitter.test_kkt());
    }

    #[test]
    fn sweep_budget_is_enforced() {
        let x = design(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let y = [1.0, 1.0, 2.0];
        let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.1).unwrap();
        let options = LassoOptions {
            max_sweeps: 2,
            ..LassoOptions::default()
        };
        let err = fitter.solve(&options, None).unwrap_err();
        assert!(matches!(err, SolveError::ConvergenceFailure { sweeps: 2, .. }));
    }

    #[test]
    fn zero_column_stays_zero() {
        let x = design(&[[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]);
        let y = [1.0, 2.0, 3.0];
        let fit = lasso(&x, &y, 0.0).unwrap();
        assert!((fit.beta[0] - 1.0).abs() < 1e-6);
        assert_eq!(fit.beta[1], 0.0);
    }
}
