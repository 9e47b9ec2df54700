/*!
Structural checks on transition matrices and their stationary distributions.

```rust
use mini_revmcmc::assessment::{is_connected, is_reversible, is_transition_matrix};
use ndarray::arr2;

let t = arr2(&[[0.5, 0.5], [0.25, 0.75]]);
assert!(is_transition_matrix(t.view(), 1e-12));
assert!(is_connected(t.view(), true));
assert!(is_reversible(t.view(), 1e-10).unwrap());
```
*/

use std::collections::VecDeque;

use approx::abs_diff_eq;
use ndarray::{Array1, ArrayView2};

use crate::error::SamplerError;

const POWER_ITERATION_MAX: usize = 100_000;
const POWER_ITERATION_TOL: f64 = 1e-13;

/// True if `t` is square, has finite non-negative entries and every row sums
/// to one within `tol`.
pub fn is_transition_matrix(t: ArrayView2<f64>, tol: f64) -> bool {
    let (rows, cols) = t.dim();
    rows == cols
        && t.iter().all(|&v| v.is_finite() && v >= 0.0)
        && t
            .rows()
            .into_iter()
            .all(|row| abs_diff_eq!(row.sum(), 1.0, epsilon = tol))
}

/// Stationary distribution of a row-stochastic matrix by power iteration on
/// the lazy chain `(I + T) / 2`, which shares its fixed points with `T` and
/// is aperiodic.
pub fn stationary_distribution(t: ArrayView2<f64>) -> Result<Array1<f64>, SamplerError> {
    let (n, cols) = t.dim();
    if n != cols {
        return Err(SamplerError::NotSquare {
            what: "transition matrix",
            rows: n,
            cols,
        });
    }
    if n == 0 {
        return Err(SamplerError::EmptyStateSpace);
    }

    let mut pi = Array1::from_elem(n, 1.0 / n as f64);
    for _ in 0..POWER_ITERATION_MAX {
        let mut next = (&pi + &pi.dot(&t)) * 0.5;
        let total = next.sum();
        if total > 0.0 {
            next /= total;
        }
        let change: f64 = next.iter().zip(pi.iter()).map(|(a, b)| (a - b).abs()).sum();
        pi = next;
        if change < POWER_ITERATION_TOL {
            return Ok(pi);
        }
    }
    Err(SamplerError::NoConvergence {
        iterations: POWER_ITERATION_MAX,
    })
}

/// True if `t` satisfies detailed balance `pi_i T_ij = pi_j T_ji` within `tol`
/// for its stationary distribution `pi`.
pub fn is_reversible(t: ArrayView2<f64>, tol: f64) -> Result<bool, SamplerError> {
    let pi = stationary_distribution(t)?;
    let n = pi.len();
    Ok((0..n).all(|i| (i + 1..n).all(|j| (pi[i] * t[[i, j]] - pi[j] * t[[j, i]]).abs() <= tol)))
}

/// True if every state reaches every other state through positive entries.
///
/// With `directed = false` an edge in either direction connects two states.
pub fn is_connected(t: ArrayView2<f64>, directed: bool) -> bool {
    let n = t.nrows();
    if n <= 1 {
        return true;
    }
    if directed {
        all_reachable(n, |i, j| t[[i, j]] > 0.0) && all_reachable(n, |i, j| t[[j, i]] > 0.0)
    } else {
        all_reachable(n, |i, j| t[[i, j]] > 0.0 || t[[j, i]] > 0.0)
    }
}

/// Breadth-first search from state 0.
fn all_reachable(n: usize, edge: impl Fn(usize, usize) -> bool) -> bool {
    let mut seen = vec![false; n];
    let mut queue = VecDeque::from([0]);
    seen[0] = true;
    while let Some(i) = queue.pop_front() {
        for j in 0..n {
            if !seen[j] && edge(i, j) {
                seen[j] = true;
                queue.push_back(j);
            }
        }
    }
    seen.into_iter().all(|s| s)
}
