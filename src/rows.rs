/*!
Row and grand-total aggregation over dense matrices.

Sums are accumulated sequentially in column order so that a dense row and the
sparse encoding of the same row (listed in ascending column order) produce
bit-identical totals.

```rust
use mini_revmcmc::rows::{sum_all, sum_row};
use ndarray::arr2;

let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
assert_eq!(sum_row(x.view(), 1), 7.0);
assert_eq!(sum_all(x.view()), 10.0);
```
*/

use ndarray::{Array1, ArrayView2};
use num_traits::Float;

/// Returns the sum of row `i` of `x`.
///
/// # Panics
/// Panics if `i` is not a valid row index.
pub fn sum_row<T: Float>(x: ArrayView2<T>, i: usize) -> T {
    x.row(i).iter().fold(T::zero(), |acc, &v| acc + v)
}

/// Returns the grand total over all entries of `x`.
pub fn sum_all<T: Float>(x: ArrayView2<T>) -> T {
    x.rows()
        .into_iter()
        .fold(T::zero(), |acc, row| acc + row.iter().fold(T::zero(), |s, &v| s + v))
}

/// Returns every row sum of `x` as a vector.
pub fn row_sums<T: Float>(x: ArrayView2<T>) -> Array1<T> {
    (0..x.nrows()).map(|i| sum_row(x, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_sum_row_and_all() {
        let x = arr2(&[[0.0, 5.0, 1.0], [3.0, 0.0, 0.5], [0.0, 0.0, 0.0]]);
        assert_eq!(sum_row(x.view(), 0), 6.0);
        assert_eq!(sum_row(x.view(), 1), 3.5);
        assert_eq!(sum_row(x.view(), 2), 0.0);
        assert_eq!(sum_all(x.view()), 9.5);
    }

    #[test]
    fn test_row_sums_f32() {
        let x = arr2(&[[1.0f32, 1.0], [2.0, 0.5]]);
        assert_eq!(row_sums(x.view()).to_vec(), vec![2.0f32, 2.5]);
    }

    #[test]
    fn test_empty_matrix() {
        let x = Array2::<f64>::zeros((0, 0));
        assert_eq!(sum_all(x.view()), 0.0);
        assert!(row_sums(x.view()).is_empty());
    }
}
