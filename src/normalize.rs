/*!
Turns auxiliary matrices into row-stochastic transition matrices.

Rows without mass are left as zero rows instead of being divided by zero.
[`normalize_all`], [`normalize_all_sparse`] and [`normalize_total`] work in
place; [`transition_matrix`], [`mean_transition_matrix`] and
[`normalized_mean_state`] leave their input untouched.

```rust
use mini_revmcmc::normalize::normalize_all;
use ndarray::arr2;

let mut x = arr2(&[[1.0, 3.0], [0.0, 0.0]]);
normalize_all(x.view_mut());
assert_eq!(x, arr2(&[[0.25, 0.75], [0.0, 0.0]]));
```
*/

use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use num_traits::Float;

use crate::error::SamplerError;
use crate::pattern::SparsityPattern;
use crate::rows::{sum_all, sum_row};

/// Rescales every row of `x` in place so that it sums to one.
pub fn normalize_all<T: Float>(mut x: ArrayViewMut2<T>) {
    for i in 0..x.nrows() {
        let total = sum_row(x.view(), i);
        if total > T::zero() {
            x.row_mut(i).mapv_inplace(|v| v / total);
        }
    }
}

/// Sums the listed entries of each row of a sparse matrix.
pub fn sparse_row_sums<T: Float>(values: &[T], pattern: &SparsityPattern) -> Vec<T> {
    (0..pattern.n())
        .map(|r| {
            pattern
                .row_entries(r)
                .iter()
                .fold(T::zero(), |acc, &k| acc + values[k])
        })
        .collect()
}

/// Sparse counterpart of [`normalize_all`]: each row is rescaled using only
/// its listed entries. Rows without listed entries are untouched.
pub fn normalize_all_sparse<T: Float>(
    values: &mut [T],
    pattern: &SparsityPattern,
) -> Result<(), SamplerError> {
    pattern.check_len("sparse values", values.len())?;
    let totals = sparse_row_sums(values, pattern);
    for (r, &total) in totals.iter().enumerate() {
        if total > T::zero() {
            for &k in pattern.row_entries(r) {
                values[k] = values[k] / total;
            }
        }
    }
    Ok(())
}

/// Rescales `x` in place so that its grand total is one.
pub fn normalize_total<T: Float>(mut x: ArrayViewMut2<T>) {
    let total = sum_all(x.view());
    if total > T::zero() {
        x.mapv_inplace(|v| v / total);
    }
}

/// Row-normalized copy of `x`.
pub fn transition_matrix<T: Float>(x: ArrayView2<T>) -> Array2<T> {
    let mut t = x.to_owned();
    normalize_all(t.view_mut());
    t
}

/// Adds the row-normalized form of `x` to `sum_t`.
///
/// Called once per sweep, this turns `sum_t` into the running sum of sampled
/// transition matrices. Zero rows of `x` add nothing.
pub fn accumulate_transition_matrix(mut sum_t: ArrayViewMut2<f64>, x: ArrayView2<f64>) {
    for (i, row) in x.outer_iter().enumerate() {
        let total = row.sum();
        if total > 0.0 {
            sum_t.row_mut(i).scaled_add(1.0 / total, &row);
        }
    }
}

/// Sparse counterpart of [`accumulate_transition_matrix`]. `row_totals` are
/// the full row sums of the state, including any mass held outside `x`.
pub fn accumulate_sparse_transition_matrix(
    sum_t: &mut [f64],
    x: &[f64],
    row_totals: &[f64],
    pattern: &SparsityPattern,
) {
    for (r, &total) in row_totals.iter().enumerate() {
        if total > 0.0 {
            for &k in pattern.row_entries(r) {
                sum_t[k] += x[k] / total;
            }
        }
    }
}

/// Posterior mean transition matrix `E[T]` from `sum_t`, the sum of
/// `n_accumulated` sampled transition matrices.
///
/// With no accumulated sweeps every entry is zero.
pub fn mean_transition_matrix(sum_t: ArrayView2<f64>, n_accumulated: u64) -> Array2<f64> {
    if n_accumulated == 0 {
        return Array2::zeros(sum_t.raw_dim());
    }
    let scale = n_accumulated as f64;
    sum_t.mapv(|v| v / scale)
}

/// Transition matrix of the mean auxiliary matrix, from `sum_x`, the sum of
/// `n_accumulated` sampled states.
///
/// This is a ratio of means and differs from `E[T]` for small counts. Unlike
/// `E[T]` it is always reversible. With no accumulated sweeps every row is
/// zero.
pub fn normalized_mean_state(sum_x: ArrayView2<f64>, n_accumulated: u64) -> Array2<f64> {
    if n_accumulated == 0 {
        return Array2::zeros(sum_x.raw_dim());
    }
    transition_matrix(sum_x)
}
