use core::fmt;

use faer_core::{Mat, MatRef};

/// Argument errors raised before any numeric work.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// The penalty is NaN.
    PenaltyNotNumeric,
    /// The design has zero rows or columns.
    InvalidDimensions { nrows: usize, ncols: usize },
    /// The response length does not match the number of design rows.
    ResponseLength { expected: usize, actual: usize },
    /// A row of an array-of-arrays design has the wrong length.
    RaggedRow { row: usize, expected: usize, actual: usize },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PenaltyNotNumeric => write!(f, "penalty must be a number (got NaN)"),
            Self::InvalidDimensions { nrows, ncols } => {
                write!(f, "invalid design dimensions: nrows={nrows}, ncols={ncols}")
            }
            Self::ResponseLength { expected, actual } => {
                write!(f, "response length {actual} does not match design rows {expected}")
            }
            Self::RaggedRow {
                row,
                expected,
                actual,
            } => {
                write!(f, "design row {row} has length {actual}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Design matrix accepted by [`crate::lasso`].
///
/// Either a dense matrix (borrowed or owned) or an array-of-arrays that is
/// converted to a matrix during validation.
#[derive(Debug)]
pub enum Design<'a> {
    View(MatRef<'a, f64>),
    Owned(Mat<f64>),
    Rows(&'a [Vec<f64>]),
}

impl<'a> From<MatRef<'a, f64>> for Design<'a> {
    fn from(view: MatRef<'a, f64>) -> Self {
        Self::View(view)
    }
}

impl<'a> From<&'a Mat<f64>> for Design<'a> {
    fn from(mat: &'a Mat<f64>) -> Self {
        Self::View(mat.as_ref())
    }
}

impl From<Mat<f64>> for Design<'_> {
    fn from(mat: Mat<f64>) -> Self {
        Self::Owned(mat)
    }
}

impl<'a> From<&'a [Vec<f64>]> for Design<'a> {
    fn from(rows: &'a [Vec<f64>]) -> Self {
        Self::Rows(rows)
    }
}

impl<'a> From<&'a Vec<Vec<f64>>> for Design<'a> {
    fn from(rows: &'a Vec<Vec<f64>>) -> Self {
        Self::Rows(rows.as_slice())
    }
}

impl<const P: usize> From<&[[f64; P]]> for Design<'_> {
    fn from(rows: &[[f64; P]]) -> Self {
        Self::Owned(Mat::from_fn(rows.len(), P, |i, j| rows[i][j]))
    }
}

impl<const N: usize, const P: usize> From<&[[f64; P]; N]> for Design<'_> {
    fn from(rows: &[[f64; P]; N]) -> Self {
        Self::from(rows.as_slice())
    }
}

impl<'a> Design<'a> {
    /// Converts array-of-arrays input and checks the shape.
    pub(crate) fn resolve(self) -> Result<Resolved<'a>, InputError> {
        let resolved = match self {
            Self::View(view) => Resolved::View(view),
            Self::Owned(mat) => Resolved::Owned(mat),
            Self::Rows(rows) => Resolved::Owned(rows_to_matrix(rows)?),
        };
        check_dimensions(resolved.view())?;
        Ok(resolved)
    }
}

#[derive(Debug)]
pub(crate) enum Resolved<'a> {
    View(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

impl Resolved<'_> {
    pub(crate) fn view(&self) -> MatRef<'_, f64> {
        match self {
            Self::View(view) => *view,
            Self::Owned(mat) => mat.as_ref(),
        }
    }
}

/// Builds a dense matrix from equally sized rows.
pub fn rows_to_matrix(rows: &[Vec<f64>]) -> Result<Mat<f64>, InputError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != ncols {
            return Err(InputError::RaggedRow {
                row,
                expected: ncols,
                actual: values.len(),
            });
        }
    }
    if nrows == 0 || ncols == 0 {
        return Err(InputError::InvalidDimensions { nrows, ncols });
    }
    Ok(Mat::from_fn(nrows, ncols, |i, j| rows[i][j]))
}

pub(crate) fn check_dimensions(x: MatRef<'_, f64>) -> Result<(), InputError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(InputError::InvalidDimensions {
            nrows: x.nrows(),
            ncols: x.ncols(),
        });
    }
    Ok(())
}

/// Checks the penalty and the response against the design shape.
///
/// Negative penalties are accepted.
pub(crate) fn check_problem(
    x: MatRef<'_, f64>,
    y: &[f64],
    lambda: f64,
) -> Result<(), InputError> {
    if lambda.is_nan() {
        return Err(InputError::PenaltyNotNumeric);
    }
    check_dimensions(x)?;
    if y.len() != x.nrows() {
        return Err(InputError::ResponseLength {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    Ok(())
}
