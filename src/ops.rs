//! Dense building blocks used by the coordinate-descent sweeps.

use faer_core::MatRef;

/// Proximal operator of `t * |x|`.
///
/// Shrinks `x` toward zero by `t`, clamping to zero inside `[-t, t]`.
pub fn soft_threshold(x: f64, t: f64) -> f64 {
    if x > t {
        x - t
    } else if x < -t {
        x + t
    } else {
        0.0
    }
}

/// Dot product of two equally sized slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += x * y;
    }
    sum
}

/// Dot product of column `col` of `x` and column `col` of `y`.
///
/// Terms where either factor is exactly zero are never accumulated.
pub fn dot_columns(x: MatRef<'_, f64>, y: MatRef<'_, f64>, col: usize) -> f64 {
    let mut sum = 0.0;
    for_each_column_product(x, y, col, |term| sum += term);
    sum
}

pub(crate) fn for_each_column_product(
    x: MatRef<'_, f64>,
    y: MatRef<'_, f64>,
    col: usize,
    mut visit: impl FnMut(f64),
) {
    debug_assert_eq!(x.nrows(), y.nrows());
    for row in 0..x.nrows() {
        let xv = x.read(row, col);
        let yv = y.read(row, col);
        if xv != 0.0 && yv != 0.0 {
            visit(xv * yv);
        }
    }
}

/// Dense `a * b` for an `n x p` matrix and a length-`p` vector.
pub fn mat_vec(a: MatRef<'_, f64>, b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.nrows()];
    mat_vec_into(&mut out, a, b);
    out
}

/// Writes `a * b` into `out`, which must have length `a.nrows()`.
pub fn mat_vec_into(out: &mut [f64], a: MatRef<'_, f64>, b: &[f64]) {
    debug_assert_eq!(out.len(), a.nrows());
    debug_assert_eq!(b.len(), a.ncols());
    let ncols = a.ncols();
    for (row, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for col in 0..ncols {
            sum += a.read(row, col) * b[col];
        }
        *slot = sum;
    }
}

/// Copies column `col` of `a` into `out`.
pub(crate) fn copy_column(out: &mut [f64], a: MatRef<'_, f64>, col: usize) {
    debug_assert_eq!(out.len(), a.nrows());
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = a.read(row, col);
    }
}
