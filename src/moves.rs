/*!
# Elementary Metropolis moves

The sampled state is a symmetric auxiliary matrix `X` whose row-normalized form
`T_ij = X_ij / x_i` is a reversible transition matrix. Given counts `C`, the
target density (flat prior on the slice of fixed grand total) is

\[
p(X) \propto \prod_{i \le j} X_{ij}^{N_{ij}} \prod_i x_i^{-c_i},
\qquad N_{ii} = C_{ii},\; N_{ij} = C_{ij} + C_{ji},\; c_i = \sum_j C_{ij}.
\]

Two moves act on an eligible pair `(i, j)`:

- [`update_step`]: shifts mass between the symmetric pair `X_ij + X_ji` and the
  two diagonals, keeping `x_i`, `x_j` and the group total fixed, so only
  `X_ii^{C_ii} (X_ij + X_ji)^{N_ij} X_jj^{C_jj}` enters the acceptance ratio.
- [`transfer_step`]: shifts mass between `X_ii` and `X_jj`, which moves the
  stationary distribution and therefore needs the current row sums.

Both proposals are uniform with a half-width proportional to the conserved
group mass, hence symmetric, and out-of-bounds proposals are rejected before
any density is evaluated.
*/

use rand::Rng;

use crate::error::SamplerError;
use crate::stats::SweepStats;

/// Proposal half-width as a fraction of the mass conserved by a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize(f64);

impl StepSize {
    /// Creates a step size; it must lie in `(0, 1]`.
    ///
    /// ```rust
    /// use mini_revmcmc::moves::StepSize;
    ///
    /// assert_eq!(StepSize::new(0.25).unwrap().get(), 0.25);
    /// assert!(StepSize::new(0.0).is_err());
    /// assert!(StepSize::new(f64::NAN).is_err());
    /// ```
    pub fn new(fraction: f64) -> Result<Self, SamplerError> {
        if fraction > 0.0 && fraction <= 1.0 {
            Ok(Self(fraction))
        } else {
            Err(SamplerError::InvalidStepSize(fraction))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for StepSize {
    fn default() -> Self {
        Self(0.5)
    }
}

/// What happened to a single proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Rejected,
    /// The proposal would have made an entry negative.
    OutOfBounds,
    /// The group carries no mass, so there is nothing to move.
    Frozen,
}

/// Result of an elementary move: the updated value and how it was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub value: f64,
    pub outcome: MoveOutcome,
}

/// `c * ln(v)`, with `v^0 = 1` and zero density for `v = 0` under positive weight.
fn log_power(v: f64, c: f64) -> f64 {
    if c == 0.0 {
        0.0
    } else if v > 0.0 {
        c * v.ln()
    } else {
        f64::NEG_INFINITY
    }
}

/// `-c * ln(x)` for a row-sum factor `x^{-c}`.
fn log_row_factor(x: f64, c: f64) -> f64 {
    if c == 0.0 {
        0.0
    } else if x > 0.0 {
        -c * x.ln()
    } else {
        f64::NAN
    }
}

/// Metropolis acceptance in log-space. Draws a uniform only when the ratio
/// is finite and below one.
fn metropolis<R: Rng + ?Sized>(log_p_old: f64, log_p_new: f64, rng: &mut R) -> bool {
    if log_p_new.is_nan() || log_p_new == f64::NEG_INFINITY {
        return false;
    }
    if log_p_old == f64::NEG_INFINITY {
        return true;
    }
    let log_accept_ratio = log_p_new - log_p_old;
    if log_accept_ratio >= 0.0 {
        return true;
    }
    let u: f64 = rng.gen();
    u.ln() < log_accept_ratio
}

/// Derives the full group `(v0', v1', v2')` from an updated pivot `v1'`.
///
/// Half of the pivot change is taken from each compensation entry, which
/// keeps `v0 + v1 + v2` and both row sums fixed.
pub fn redistribute(v: [f64; 3], v1_new: f64) -> [f64; 3] {
    let half_shift = 0.5 * (v1_new - v[1]);
    [v[0] - half_shift, v1_new, v[2] - half_shift]
}

/**
Metropolis update of the pivot `v[1]` of a conserved group `v = [v0, v1, v2]`.

The local target is `v0^c0 * v1^c1 * v2^c2`. A shift `d` is drawn uniformly
from `[-h, h]` with `h = step_size * (v0 + v1 + v2)`; the other two entries
follow from [`redistribute`]. Returns the (possibly unchanged) pivot.

When every weight is zero the move is a bounded random walk that accepts
every in-bounds proposal.

```rust
use mini_revmcmc::moves::{redistribute, update_step, MoveOutcome, StepSize};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let mut rng = SmallRng::seed_from_u64(42);
let v = [1.0, 4.0, 2.0];
let step = update_step(v, [1.0, 8.0, 0.0], StepSize::default(), &mut rng);
let updated = redistribute(v, step.value);
assert!(updated.iter().all(|&u| u >= 0.0));
assert!((updated.iter().sum::<f64>() - 7.0).abs() < 1e-12);
assert_ne!(step.outcome, MoveOutcome::Frozen);
```
*/
pub fn update_step<R: Rng + ?Sized>(
    v: [f64; 3],
    c: [f64; 3],
    step_size: StepSize,
    rng: &mut R,
) -> StepResult {
    let unchanged = |outcome| StepResult {
        value: v[1],
        outcome,
    };
    let half_width = step_size.get() * (v[0] + v[1] + v[2]);
    if half_width.is_nan() || half_width <= 0.0 {
        return unchanged(MoveOutcome::Frozen);
    }

    let shift = half_width * rng.gen_range(-1.0..=1.0);
    let proposed = redistribute(v, v[1] + shift);
    if proposed.iter().any(|&p| p < 0.0) {
        return unchanged(MoveOutcome::OutOfBounds);
    }

    let log_p = |w: &[f64; 3]| -> f64 {
        w.iter()
            .zip(c.iter())
            .map(|(&x, &k)| log_power(x, k))
            .sum()
    };
    if metropolis(log_p(&v), log_p(&proposed), rng) {
        StepResult {
            value: proposed[1],
            outcome: MoveOutcome::Accepted,
        }
    } else {
        unchanged(MoveOutcome::Rejected)
    }
}

/**
Metropolis transfer of mass between two diagonal entries `diagonal = [X_ii, X_jj]`.

Moving `delta` from `X_jj` to `X_ii` changes the row sums by `+delta` and
`-delta`. The local target is
`X_ii^{C_ii} X_jj^{C_jj} x_i^{-c_i} x_j^{-c_j}`, with `diagonal_counts =
[C_ii, C_jj]` and `row_counts = [c_i, c_j]`. Returns the accepted `delta`
(zero unless accepted).
*/
pub fn transfer_step<R: Rng + ?Sized>(
    diagonal: [f64; 2],
    row_sums: [f64; 2],
    diagonal_counts: [f64; 2],
    row_counts: [f64; 2],
    step_size: StepSize,
    rng: &mut R,
) -> StepResult {
    let unchanged = |outcome| StepResult {
        value: 0.0,
        outcome,
    };
    let half_width = step_size.get() * (diagonal[0] + diagonal[1]);
    if half_width.is_nan() || half_width <= 0.0 {
        return unchanged(MoveOutcome::Frozen);
    }

    let delta = half_width * rng.gen_range(-1.0..=1.0);
    if diagonal[0] + delta < 0.0 || diagonal[1] - delta < 0.0 {
        return unchanged(MoveOutcome::OutOfBounds);
    }

    let log_p = |shift: f64| -> f64 {
        log_power(diagonal[0] + shift, diagonal_counts[0])
            + log_power(diagonal[1] - shift, diagonal_counts[1])
            + log_row_factor(row_sums[0] + shift, row_counts[0])
            + log_row_factor(row_sums[1] - shift, row_counts[1])
    };
    if metropolis(log_p(0.0), log_p(delta), rng) {
        StepResult {
            value: delta,
            outcome: MoveOutcome::Accepted,
        }
    } else {
        unchanged(MoveOutcome::Rejected)
    }
}

/// Count weights of an eligible pair `(i, j)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCounts {
    /// `[C_ii, C_jj]`
    pub diagonal: [f64; 2],
    /// `C_ij + C_ji`
    pub pair: f64,
    /// `[c_i, c_j]`, the count row totals.
    pub rows: [f64; 2],
}

/// The entries of `X` touched when sweeping over pair `(i, j)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairGroup {
    /// `[X_ii, X_jj]`
    pub diagonal: [f64; 2],
    /// `X_ij`, equal to `X_ji`.
    pub off_diagonal: f64,
    /// `[x_i, x_j]`
    pub row_sums: [f64; 2],
}

impl PairGroup {
    /// Applies one pair move followed by one diagonal transfer.
    ///
    /// This is the unit of work shared by the dense and sparse sweeps; both
    /// load a group from their storage, call this, and write the group back.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        counts: &PairCounts,
        step_size: StepSize,
        rng: &mut R,
        stats: &mut SweepStats,
    ) {
        let v = [self.diagonal[0], 2.0 * self.off_diagonal, self.diagonal[1]];
        let pair = update_step(
            v,
            [counts.diagonal[0], counts.pair, counts.diagonal[1]],
            step_size,
            rng,
        );
        stats.pair.record(pair.outcome);
        if pair.outcome == MoveOutcome::Accepted {
            let [x_ii, x_ij_pair, x_jj] = redistribute(v, pair.value);
            self.diagonal = [x_ii, x_jj];
            self.off_diagonal = 0.5 * x_ij_pair;
        }

        let transfer = transfer_step(
            self.diagonal,
            self.row_sums,
            counts.diagonal,
            counts.rows,
            step_size,
            rng,
        );
        stats.transfer.record(transfer.outcome);
        if transfer.outcome == MoveOutcome::Accepted {
            let delta = transfer.value;
            self.diagonal[0] += delta;
            self.diagonal[1] -= delta;
            self.row_sums[0] += delta;
            self.row_sums[1] -= delta;
        }
    }
}
