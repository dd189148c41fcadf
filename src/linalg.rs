//! Matrix powers and geometric series

use nalgebra::DMatrix;

/// `M^n` by repeated squaring. `M^0` is the identity.
pub fn matrix_power(m: &DMatrix<f64>, mut n: usize) -> DMatrix<f64> {
    let mut result = DMatrix::identity(m.nrows(), m.ncols());
    let mut base = m.clone();
    while n > 0 {
        if n & 1 == 1 {
            result = &result * &base;
        }
        n >>= 1;
        if n > 0 {
            base = &base * &base;
        }
    }
    result
}

/// `I + M + ... + M^(n-1)`; the zero matrix for `n = 0`.
pub fn geom_series(m: &DMatrix<f64>, n: usize) -> DMatrix<f64> {
    let mut sum = DMatrix::zeros(m.nrows(), m.ncols());
    let mut term = DMatrix::identity(m.nrows(), m.ncols());
    for _ in 0..n {
        sum += &term;
        term = &term * m;
    }
    sum
}

