/*!
# Dense sweep

Runs `n_step` sweeps over a dense `n x n` auxiliary matrix `X`. A sweep visits
every eligible pair `(i, j)`, `i < j`, row-major over the upper triangle,
where a pair is eligible iff `C_ij + C_ji > 0`. Each visit applies one pair
move and one diagonal transfer (see [`crate::moves`]). After every sweep the
whole state is added to the accumulator.

All preconditions are checked before `X` or the accumulator is touched, so a
failed call leaves both exactly as they were.

```rust
use mini_revmcmc::dense::{initial_state, update};
use mini_revmcmc::moves::StepSize;
use ndarray::{arr2, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let counts = arr2(&[[2.0, 5.0], [3.0, 1.0]]);
let mut x = initial_state(counts.view());
let mut sum_x = Array2::zeros((2, 2));
let mut rng = SmallRng::seed_from_u64(42);

let step = StepSize::default();
let stats = update(counts.view(), sum_x.view_mut(), x.view_mut(), 100, step, &mut rng).unwrap();
assert_eq!(stats.sweeps, 100);
assert!((x.sum() - 22.0).abs() < 1e-9);
```
*/

use log::{debug, trace, warn};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rand::Rng;

use crate::assessment::is_connected;
use crate::error::SamplerError;
use crate::moves::{PairCounts, PairGroup, StepSize};
use crate::rows::row_sums;
use crate::stats::SweepStats;

/// Symmetrized counts `C + C^T`, the usual starting state.
pub fn initial_state(counts: ArrayView2<f64>) -> Array2<f64> {
    &counts + &counts.t()
}

/// Checks that `counts` is a non-empty square matrix of finite, non-negative
/// entries and returns its size.
pub(crate) fn validate_counts(counts: ArrayView2<f64>) -> Result<usize, SamplerError> {
    let (n, cols) = counts.dim();
    if n != cols {
        return Err(SamplerError::NotSquare {
            what: "count matrix",
            rows: n,
            cols,
        });
    }
    if n == 0 {
        return Err(SamplerError::EmptyStateSpace);
    }
    check_entries("count matrix", counts)?;
    Ok(n)
}

/// Checks that `x` is an `n x n` symmetric matrix of finite, non-negative entries.
pub(crate) fn validate_state(x: ArrayView2<f64>, n: usize) -> Result<(), SamplerError> {
    check_shape("state", x, n)?;
    check_entries("state", x)?;
    for i in 0..n {
        for j in i + 1..n {
            if x[[i, j]] != x[[j, i]] {
                return Err(SamplerError::AsymmetricState { row: i, col: j });
            }
        }
    }
    Ok(())
}

fn check_shape(what: &'static str, m: ArrayView2<f64>, n: usize) -> Result<(), SamplerError> {
    if m.dim() != (n, n) {
        return Err(SamplerError::ShapeMismatch {
            what,
            expected: (n, n),
            found: m.dim(),
        });
    }
    Ok(())
}

fn check_entries(what: &'static str, m: ArrayView2<f64>) -> Result<(), SamplerError> {
    match m
        .indexed_iter()
        .find(|&(_, &v)| !(v.is_finite() && v >= 0.0))
    {
        Some(((row, col), &value)) => Err(SamplerError::InvalidEntry {
            what,
            row,
            col,
            value,
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DensePair {
    i: usize,
    j: usize,
    counts: PairCounts,
}

/// The eligible pairs of a count matrix, in sweep order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DenseSweep {
    pairs: Vec<DensePair>,
}

impl DenseSweep {
    pub(crate) fn new(counts: ArrayView2<f64>) -> Self {
        let n = counts.nrows();
        let row_counts = row_sums(counts);
        let pairs = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| counts[[i, j]] + counts[[j, i]] > 0.0)
            .map(|(i, j)| DensePair {
                i,
                j,
                counts: PairCounts {
                    diagonal: [counts[[i, i]], counts[[j, j]]],
                    pair: counts[[i, j]] + counts[[j, i]],
                    rows: [row_counts[i], row_counts[j]],
                },
            })
            .collect();
        Self { pairs }
    }

    pub(crate) fn n_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// One sweep over `x`. Row sums are refreshed at the start of the sweep
    /// and carried through the transfers.
    pub(crate) fn run<R: Rng + ?Sized>(
        &self,
        mut x: ArrayViewMut2<f64>,
        step_size: StepSize,
        rng: &mut R,
        stats: &mut SweepStats,
    ) {
        let mut sums = row_sums(x.view());
        for pair in &self.pairs {
            let (i, j) = (pair.i, pair.j);
            let mut group = PairGroup {
                diagonal: [x[[i, i]], x[[j, j]]],
                off_diagonal: x[[i, j]],
                row_sums: [sums[i], sums[j]],
            };
            group.update(&pair.counts, step_size, rng, stats);
            x[[i, i]] = group.diagonal[0];
            x[[j, j]] = group.diagonal[1];
            x[[i, j]] = group.off_diagonal;
            x[[j, i]] = group.off_diagonal;
            sums[i] = group.row_sums[0];
            sums[j] = group.row_sums[1];
        }
        stats.sweeps += 1;
    }
}

/**
Runs `n_step` sweeps over the dense state `x` and adds the state to `sum_x`
after each sweep.

# Arguments
* `counts` - The `n x n` transition count matrix `C`.
* `sum_x` - Accumulator of the same shape, incremented exactly `n_step` times.
* `x` - The symmetric auxiliary matrix, updated in place.
* `n_step` - Number of sweeps.
* `step_size` - Proposal half-width relative to the mass of a move's group.
* `rng` - Source of randomness; the same seed reproduces the same result.

# Errors
Returns an error if `counts` is not a non-empty square matrix of finite,
non-negative entries, if `x` or `sum_x` have a different shape, or if `x` is
negative, non-finite or asymmetric.
*/
pub fn update<R: Rng + ?Sized>(
    counts: ArrayView2<f64>,
    mut sum_x: ArrayViewMut2<f64>,
    mut x: ArrayViewMut2<f64>,
    n_step: usize,
    step_size: StepSize,
    rng: &mut R,
) -> Result<SweepStats, SamplerError> {
    let n = validate_counts(counts)?;
    check_shape("accumulator", sum_x.view(), n)?;
    validate_state(x.view(), n)?;
    if !is_connected(counts, false) {
        warn!("count matrix is not connected; relative weights of its components stay fixed");
    }

    let sweep = DenseSweep::new(counts);
    let mut stats = SweepStats::default();
    for s in 0..n_step {
        sweep.run(x.view_mut(), step_size, rng, &mut stats);
        sum_x += &x;
        trace!("dense sweep {}/{} done", s + 1, n_step);
    }
    debug!(
        "dense update over {} states and {} eligible pairs: {}",
        n,
        sweep.n_pairs(),
        stats
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::sum_all;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn counts3() -> Array2<f64> {
        arr2(&[[4.0, 2.0, 0.0], [1.0, 6.0, 3.0], [0.0, 5.0, 2.0]])
    }

    #[test]
    fn test_initial_state_is_symmetric() {
        let x = initial_state(counts3().view());
        assert_eq!(x, arr2(&[[8.0, 3.0, 0.0], [3.0, 12.0, 8.0], [0.0, 8.0, 4.0]]));
    }

    #[test]
    fn test_sweep_order_is_row_major_upper_triangle() {
        let counts = arr2(&[
            [0.0, 1.0, 0.0, 2.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);
        let sweep = DenseSweep::new(counts.view());
        let order: Vec<(usize, usize)> = sweep.pairs.iter().map(|p| (p.i, p.j)).collect();
        assert_eq!(order, vec![(0, 1), (0, 3), (1, 2), (2, 3)]);
        assert_eq!(sweep.pairs[1].counts.rows, [3.0, 1.0]);
    }

    #[test]
    fn test_update_conserves_mass_and_accumulates_n_step_times() {
        let counts = counts3();
        let mut x = initial_state(counts.view());
        let total = sum_all(x.view());
        let mut sum_x = Array2::zeros((3, 3));
        let mut rng = SmallRng::seed_from_u64(42);

        let stats = update(
            counts.view(),
            sum_x.view_mut(),
            x.view_mut(),
            250,
            StepSize::default(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(stats.sweeps, 250);
        assert_eq!(stats.pair.proposed() + stats.pair.frozen, 250 * 2);
        assert_abs_diff_eq!(sum_all(x.view()), total, epsilon = 1e-9);
        assert_abs_diff_eq!(sum_all(sum_x.view()), 250.0 * total, epsilon = 1e-6);
        assert!(x.iter().all(|&v| v >= 0.0));
        assert_eq!(x[[0, 2]], 0.0);
        assert_eq!(x[[2, 0]], 0.0);
        assert_eq!(x, x.t());
    }

    #[test]
    fn test_zero_steps_is_a_no_op() {
        let counts = counts3();
        let mut x = initial_state(counts.view());
        let before = x.clone();
        let mut sum_x = Array2::zeros((3, 3));
        let mut rng = SmallRng::seed_from_u64(0);
        let stats = update(
            counts.view(),
            sum_x.view_mut(),
            x.view_mut(),
            0,
            StepSize::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(stats, SweepStats::default());
        assert_eq!(x, before);
        assert_eq!(sum_x, Array2::<f64>::zeros((3, 3)));
    }

    #[test]
    fn test_preconditions_leave_buffers_untouched() {
        let counts = counts3();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut sum_x = Array2::zeros((3, 3));

        let mut asymmetric = initial_state(counts.view());
        asymmetric[[0, 1]] += 1.0;
        let before = asymmetric.clone();
        let err = update(
            counts.view(),
            sum_x.view_mut(),
            asymmetric.view_mut(),
            10,
            StepSize::default(),
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(err, SamplerError::AsymmetricState { row: 0, col: 1 });
        assert_eq!(asymmetric, before);
        assert_eq!(sum_x, Array2::<f64>::zeros((3, 3)));

        let mut bad_counts = counts.clone();
        bad_counts[[2, 1]] = -1.0;
        let mut x = initial_state(counts.view());
        assert!(matches!(
            update(
                bad_counts.view(),
                sum_x.view_mut(),
                x.view_mut(),
                10,
                StepSize::default(),
                &mut rng
            ),
            Err(SamplerError::InvalidEntry { row: 2, col: 1, .. })
        ));

        let mut small_sum = Array2::zeros((2, 2));
        assert!(matches!(
            update(
                counts.view(),
                small_sum.view_mut(),
                x.view_mut(),
                10,
                StepSize::default(),
                &mut rng
            ),
            Err(SamplerError::ShapeMismatch { .. })
        ));

        let empty = Array2::<f64>::zeros((0, 0));
        let mut empty_x = empty.clone();
        let mut empty_sum = empty.clone();
        assert_eq!(
            update(
                empty.view(),
                empty_sum.view_mut(),
                empty_x.view_mut(),
                1,
                StepSize::default(),
                &mut rng
            )
            .unwrap_err(),
            SamplerError::EmptyStateSpace
        );
    }

    #[test]
    fn test_same_seed_gives_identical_runs() {
        let counts = counts3();
        let run = |seed| {
            let mut x = initial_state(counts.view());
            let mut sum_x = Array2::zeros((3, 3));
            let mut rng = SmallRng::seed_from_u64(seed);
            update(
                counts.view(),
                sum_x.view_mut(),
                x.view_mut(),
                100,
                StepSize::default(),
                &mut rng,
            )
            .unwrap();
            (x, sum_x)
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3).0, run(4).0);
    }
}
