/*!
# Sparse sweep

The sparse analogue of [`crate::dense`]: values live at the positions of a
[`SparsityPattern`] and unlisted off-diagonal positions are never touched.
A sweep walks the rows in order and, within a row, the listed entries
`(i, j)` with `j > i` in their listed order. A pair is eligible iff
`C_ij + C_ji > 0`.

Every pair move needs the two diagonals `(i, i)` and `(j, j)` as
compensation. A listed diagonal is used in place; a row whose diagonal is not
listed keeps its compensation mass in an [`ImplicitDiagonal`] slot owned by
the caller. Such a slot carries no counts and starts out empty for a state
built from counts.

For a pattern that lists the eligible support in row-major order, with or
without its diagonals, a sparse run reproduces a dense run driven by the same
random sequence.
*/

use log::{debug, info, trace};
use rand::Rng;

use crate::dev_tools::Timer;
use crate::error::SamplerError;
use crate::moves::{PairCounts, PairGroup, StepSize};
use crate::normalize::sparse_row_sums;
use crate::pattern::SparsityPattern;
use crate::stats::SweepStats;

/// Compensation mass on the diagonal of rows whose diagonal is not listed.
///
/// Slot `r` is only read and written when `pattern.diagonal(r)` is `None`;
/// the other slots are ignored. `sums` is accumulated after every sweep,
/// alongside the sparse accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitDiagonal {
    pub values: Vec<f64>,
    pub sums: Vec<f64>,
}

impl ImplicitDiagonal {
    /// Empty slots for an `n`-state pattern.
    pub fn new(n: usize) -> Self {
        Self {
            values: vec![0.0; n],
            sums: vec![0.0; n],
        }
    }

    fn validate(&self, n: usize) -> Result<(), SamplerError> {
        let slots = [("implicit diagonal", &self.values), ("implicit diagonal sums", &self.sums)];
        for (what, v) in slots {
            if v.len() != n {
                return Err(SamplerError::LengthMismatch {
                    what,
                    expected: n,
                    found: v.len(),
                });
            }
        }
        match self.values.iter().position(|&v| !(v.is_finite() && v >= 0.0)) {
            Some(r) => Err(SamplerError::InvalidEntry {
                what: "implicit diagonal",
                row: r,
                col: r,
                value: self.values[r],
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn accumulate(&mut self, pattern: &SparsityPattern) {
        for r in (0..pattern.n()).filter(|&r| pattern.diagonal(r).is_none()) {
            self.sums[r] += self.values[r];
        }
    }
}

/// Symmetrized sparse counts, `x[k] = counts[k] + counts[transpose(k)]`.
pub fn sparse_initial_state(
    counts: &[f64],
    pattern: &SparsityPattern,
) -> Result<Vec<f64>, SamplerError> {
    pattern.check_len("sparse counts", counts.len())?;
    Ok((0..pattern.n_idx())
        .map(|k| counts[k] + counts[pattern.transpose(k)])
        .collect())
}

/// Row sums of the full state, implicit diagonals included.
pub fn state_row_sums(x: &[f64], diagonal: &[f64], pattern: &SparsityPattern) -> Vec<f64> {
    let mut sums = sparse_row_sums(x, pattern);
    for (r, s) in sums.iter_mut().enumerate() {
        if pattern.diagonal(r).is_none() {
            *s += diagonal[r];
        }
    }
    sums
}

fn check_entries(
    what: &'static str,
    values: &[f64],
    pattern: &SparsityPattern,
) -> Result<(), SamplerError> {
    pattern.check_len(what, values.len())?;
    match values.iter().position(|&v| !(v.is_finite() && v >= 0.0)) {
        Some(k) => Err(SamplerError::InvalidEntry {
            what,
            row: pattern.rows()[k],
            col: pattern.cols()[k],
            value: values[k],
        }),
        None => Ok(()),
    }
}

pub(crate) fn validate_sparse(
    counts: &[f64],
    x: &[f64],
    sum_x: &[f64],
    diagonal: &ImplicitDiagonal,
    pattern: &SparsityPattern,
) -> Result<(), SamplerError> {
    check_entries("sparse counts", counts, pattern)?;
    check_entries("sparse state", x, pattern)?;
    pattern.check_len("sparse accumulator", sum_x.len())?;
    diagonal.validate(pattern.n())?;
    if let Some(k) = (0..pattern.n_idx()).find(|&k| x[k] != x[pattern.transpose(k)]) {
        return Err(SamplerError::AsymmetricState {
            row: pattern.rows()[k],
            col: pattern.cols()[k],
        });
    }
    Ok(())
}

/// Where the diagonal of a row is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiagonalSlot {
    Listed(usize),
    Implicit(usize),
}

impl DiagonalSlot {
    fn of(pattern: &SparsityPattern, r: usize) -> Self {
        pattern
            .diagonal(r)
            .map_or(DiagonalSlot::Implicit(r), DiagonalSlot::Listed)
    }

    fn get(self, x: &[f64], implicit: &[f64]) -> f64 {
        match self {
            DiagonalSlot::Listed(k) => x[k],
            DiagonalSlot::Implicit(r) => implicit[r],
        }
    }

    fn set(self, x: &mut [f64], implicit: &mut [f64], value: f64) {
        match self {
            DiagonalSlot::Listed(k) => x[k] = value,
            DiagonalSlot::Implicit(r) => implicit[r] = value,
        }
    }

    /// Self-transition count; unlisted diagonals have none.
    fn count(self, counts: &[f64]) -> f64 {
        match self {
            DiagonalSlot::Listed(k) => counts[k],
            DiagonalSlot::Implicit(_) => 0.0,
        }
    }
}

/// Storage touched when sweeping over pair `(i, j)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SparsePair {
    i: usize,
    j: usize,
    ij: usize,
    ji: usize,
    ii: DiagonalSlot,
    jj: DiagonalSlot,
    counts: PairCounts,
}

/// The pair represented by entry `k`, if `k` is the upper-triangle entry of
/// an eligible pair.
fn eligible_pair(
    k: usize,
    counts: &[f64],
    row_counts: &[f64],
    pattern: &SparsityPattern,
) -> Option<SparsePair> {
    let (i, j) = (pattern.rows()[k], pattern.cols()[k]);
    let ji = pattern.transpose(k);
    if j <= i || counts[k] + counts[ji] <= 0.0 {
        return None;
    }
    let (ii, jj) = (DiagonalSlot::of(pattern, i), DiagonalSlot::of(pattern, j));
    Some(SparsePair {
        i,
        j,
        ij: k,
        ji,
        ii,
        jj,
        counts: PairCounts {
            diagonal: [ii.count(counts), jj.count(counts)],
            pair: counts[k] + counts[ji],
            rows: [row_counts[i], row_counts[j]],
        },
    })
}

impl SparsePair {
    fn update<R: Rng + ?Sized>(
        &self,
        x: &mut [f64],
        implicit: &mut [f64],
        sums: &mut [f64],
        step_size: StepSize,
        rng: &mut R,
        stats: &mut SweepStats,
    ) {
        let mut group = PairGroup {
            diagonal: [self.ii.get(x, implicit), self.jj.get(x, implicit)],
            off_diagonal: x[self.ij],
            row_sums: [sums[self.i], sums[self.j]],
        };
        group.update(&self.counts, step_size, rng, stats);
        self.ii.set(x, implicit, group.diagonal[0]);
        self.jj.set(x, implicit, group.diagonal[1]);
        x[self.ij] = group.off_diagonal;
        x[self.ji] = group.off_diagonal;
        sums[self.i] = group.row_sums[0];
        sums[self.j] = group.row_sums[1];
    }
}

pub(crate) fn accumulate(sum_x: &mut [f64], x: &[f64]) {
    sum_x.iter_mut().zip(x).for_each(|(s, &v)| *s += v);
}

/// One sweep driven directly by the row index of `pattern`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn sweep_by_rows<R: Rng + ?Sized>(
    counts: &[f64],
    row_counts: &[f64],
    x: &mut [f64],
    implicit: &mut [f64],
    pattern: &SparsityPattern,
    step_size: StepSize,
    rng: &mut R,
    stats: &mut SweepStats,
) {
    let mut sums = state_row_sums(x, implicit, pattern);
    for r in 0..pattern.n() {
        for &k in pattern.row_entries(r) {
            if let Some(pair) = eligible_pair(k, counts, row_counts, pattern) {
                pair.update(x, implicit, &mut sums, step_size, rng, stats);
            }
        }
    }
    stats.sweeps += 1;
}

/**
Runs `n_step` sweeps over the sparse state `x` and adds it to `sum_x` after
each sweep.

`counts`, `x` and `sum_x` are parallel to the coordinate lists of `pattern`.
The count row totals are taken over the listed counts. Rows without a listed
diagonal compensate through `diagonal`, whose slots are accumulated into
`diagonal.sums` after every sweep.

The row index table is not rebuilt here. A [`SparsityPattern`] is immutable
and validated once, so its row index is built once in
[`SparsityPattern::new`] and shared by every call over that pattern.

# Errors
Returns an error if any of the slices has the wrong length, if counts or state
contain negative or non-finite values, or if the state differs from its
transpose at some listed position. Nothing is modified in that case.

# Examples

```rust
use mini_revmcmc::moves::StepSize;
use mini_revmcmc::pattern::SparsityPattern;
use mini_revmcmc::sparse::{sparse_initial_state, update_sparse, ImplicitDiagonal};
use rand::rngs::SmallRng;
use rand::SeedableRng;

// (0,1), (1,0): no self-loops listed
let pattern = SparsityPattern::new(vec![0, 1], vec![1, 0], 2).unwrap();
let counts = vec![5.0, 3.0];
let mut x = sparse_initial_state(&counts, &pattern).unwrap();
let mut sum_x = vec![0.0; 2];
let mut diagonal = ImplicitDiagonal::new(2);
let mut rng = SmallRng::seed_from_u64(42);

let stats = update_sparse(
    &counts,
    &mut x,
    &mut sum_x,
    &mut diagonal,
    &pattern,
    50,
    StepSize::default(),
    &mut rng,
)
.unwrap();
assert_eq!(stats.sweeps, 50);
assert_eq!(x[0], x[1]);
let total = 2.0 * x[0] + diagonal.values.iter().sum::<f64>();
assert!((total - 16.0).abs() < 1e-9);
```
*/
#[allow(clippy::too_many_arguments)]
pub fn update_sparse<R: Rng + ?Sized>(
    counts: &[f64],
    x: &mut [f64],
    sum_x: &mut [f64],
    diagonal: &mut ImplicitDiagonal,
    pattern: &SparsityPattern,
    n_step: usize,
    step_size: StepSize,
    rng: &mut R,
) -> Result<SweepStats, SamplerError> {
    validate_sparse(counts, x, sum_x, diagonal, pattern)?;
    let row_counts = sparse_row_sums(counts, pattern);

    let mut stats = SweepStats::default();
    for s in 0..n_step {
        sweep_by_rows(
            counts,
            &row_counts,
            x,
            &mut diagonal.values,
            pattern,
            step_size,
            rng,
            &mut stats,
        );
        accumulate(sum_x, x);
        diagonal.accumulate(pattern);
        trace!("sparse sweep {}/{} done", s + 1, n_step);
    }
    debug!(
        "sparse update over {} states and {} listed entries: {}",
        pattern.n(),
        pattern.n_idx(),
        stats
    );
    Ok(stats)
}

/// Benchmarking variant of [`update_sparse`].
///
/// Resolves the eligible pairs once up front instead of on every sweep and
/// reports the elapsed time. It visits the same pairs in the same order, so
/// its results are bit-identical to [`update_sparse`].
#[allow(clippy::too_many_arguments)]
pub fn update_sparse_speedtest<R: Rng + ?Sized>(
    counts: &[f64],
    x: &mut [f64],
    sum_x: &mut [f64],
    diagonal: &mut ImplicitDiagonal,
    pattern: &SparsityPattern,
    n_step: usize,
    step_size: StepSize,
    rng: &mut R,
) -> Result<SweepStats, SamplerError> {
    validate_sparse(counts, x, sum_x, diagonal, pattern)?;
    let mut timer = Timer::new();
    let row_counts = sparse_row_sums(counts, pattern);
    let pairs: Vec<SparsePair> = (0..pattern.n())
        .flat_map(|r| pattern.row_entries(r).iter().copied())
        .filter_map(|k| eligible_pair(k, counts, &row_counts, pattern))
        .collect();
    timer.log("resolved eligible pairs");

    let mut stats = SweepStats::default();
    for _ in 0..n_step {
        let mut sums = state_row_sums(x, &diagonal.values, pattern);
        for pair in &pairs {
            pair.update(x, &mut diagonal.values, &mut sums, step_size, rng, &mut stats);
        }
        stats.sweeps += 1;
        accumulate(sum_x, x);
        diagonal.accumulate(pattern);
    }
    let elapsed = timer.log("sparse sweeps");
    info!(
        "{} sweeps over {} pairs in {:?} ({:?} per sweep)",
        n_step,
        pairs.len(),
        elapsed,
        elapsed / n_step.max(1) as u32
    );
    Ok(stats)
}
