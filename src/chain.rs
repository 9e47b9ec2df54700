/*!
# Reversible chains

[`ReversibleChain`] and [`SparseReversibleChain`] own everything a sampling
run needs: the counts, the current auxiliary matrix, its accumulators and a
seeded generator. Each [`MarkovChain::step`] is one full sweep followed by
one accumulation, so the posterior means are always taken over exactly the
sweeps performed so far.

Two accumulators are kept. `sum_x` is the raw sum of sampled auxiliary
matrices. `sum_t` is the sum of their row-normalized forms, from which
[`ReversibleChain::posterior_mean`] estimates `E[T]`.

```rust
use mini_revmcmc::assessment::{is_reversible, is_transition_matrix};
use mini_revmcmc::chain::ReversibleChain;
use ndarray::arr2;

let counts = arr2(&[[10.0, 2.0, 0.0], [3.0, 8.0, 1.0], [0.0, 2.0, 6.0]]);
let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(42);
chain.run(500);

assert!(is_transition_matrix(chain.posterior_mean().view(), 1e-9));
assert!(is_reversible(chain.normalized_mean_state().view(), 1e-8).unwrap());
assert_eq!(chain.n_accumulated(), 500);
```
*/

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2};
use rand::prelude::*;

use crate::assessment::is_connected;
use crate::core::{run_chain_with_progress, sweep_progress_bar, MarkovChain};
use crate::dense::{initial_state, validate_counts, validate_state, DenseSweep};
use crate::error::SamplerError;
use crate::moves::StepSize;
use crate::normalize::{
    accumulate_sparse_transition_matrix, accumulate_transition_matrix, mean_transition_matrix,
    normalized_mean_state, sparse_row_sums, transition_matrix,
};
use crate::pattern::SparsityPattern;
use crate::rows::{row_sums, sum_all};
use crate::sparse::{
    accumulate, sparse_initial_state, state_row_sums, sweep_by_rows, validate_sparse,
    ImplicitDiagonal,
};
use crate::stats::SweepStats;

/// `pi_i = x_i / sum_k x_k`, the stationary distribution of the row-normalized
/// form of a symmetric matrix.
fn symmetric_stationary(x: ArrayView2<f64>) -> Array1<f64> {
    let total = sum_all(x);
    let sums = row_sums(x);
    if total > 0.0 {
        sums / total
    } else {
        sums
    }
}

fn normalized_by_total(sums: Vec<f64>) -> Array1<f64> {
    let sums = Array1::from(sums);
    let total = sums.sum();
    if total > 0.0 {
        sums / total
    } else {
        sums
    }
}

fn mean_of(sum: &Array1<f64>, n_accumulated: u64) -> Array1<f64> {
    if n_accumulated == 0 {
        return Array1::zeros(sum.len());
    }
    sum / n_accumulated as f64
}

/// A single dense chain over reversible transition matrices.
#[derive(Debug, Clone)]
pub struct ReversibleChain {
    counts: Array2<f64>,
    sweep: DenseSweep,
    x: Array2<f64>,
    sum_x: Array2<f64>,
    sum_t: Array2<f64>,
    sum_pi: Array1<f64>,
    n_accumulated: u64,
    step_size: StepSize,
    stats: SweepStats,
    /// The random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl ReversibleChain {
    /// Creates a chain starting from the symmetrized counts `C + C^T` with the
    /// default step size and an entropy-derived seed.
    pub fn new(counts: ArrayView2<f64>) -> Result<Self, SamplerError> {
        let n = validate_counts(counts)?;
        if !is_connected(counts, false) {
            warn!("count matrix is not connected; relative weights of its components stay fixed");
        }
        let seed = thread_rng().gen::<u64>();
        Ok(Self {
            counts: counts.to_owned(),
            sweep: DenseSweep::new(counts),
            x: initial_state(counts),
            sum_x: Array2::zeros((n, n)),
            sum_t: Array2::zeros((n, n)),
            sum_pi: Array1::zeros(n),
            n_accumulated: 0,
            step_size: StepSize::default(),
            stats: SweepStats::default(),
            seed,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn set_step_size(mut self, step_size: StepSize) -> Self {
        self.step_size = step_size;
        self
    }

    /// Replaces the starting state. Must be an `n x n` symmetric matrix of
    /// finite, non-negative entries.
    pub fn with_state(mut self, x: Array2<f64>) -> Result<Self, SamplerError> {
        validate_state(x.view(), self.counts.nrows())?;
        self.x = x;
        Ok(self)
    }

    /// Performs `n_steps` sweeps and returns the final state.
    pub fn run(&mut self, n_steps: usize) -> &Array2<f64> {
        for _ in 0..n_steps {
            self.step();
        }
        debug!("reversible chain (seed {}): {}", self.seed, self.stats);
        &self.x
    }

    /// Same as [`ReversibleChain::run`], with a progress bar on stderr.
    pub fn run_progress(&mut self, n_steps: usize) -> &Array2<f64> {
        let pb = sweep_progress_bar(n_steps, "Reversible chain");
        run_chain_with_progress(self, n_steps, &pb);
        pb.finish_with_message("Done!");
        debug!("reversible chain (seed {}): {}", self.seed, self.stats);
        &self.x
    }

    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    /// Sum of the sampled auxiliary matrices.
    pub fn sum_x(&self) -> ArrayView2<'_, f64> {
        self.sum_x.view()
    }

    /// Sum of the sampled transition matrices.
    pub fn sum_t(&self) -> ArrayView2<'_, f64> {
        self.sum_t.view()
    }

    pub fn n_accumulated(&self) -> u64 {
        self.n_accumulated
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    /// Transition matrix of the current state.
    pub fn transition_matrix(&self) -> Array2<f64> {
        transition_matrix(self.x.view())
    }

    /// Stationary distribution of the current state.
    pub fn stationary_distribution(&self) -> Array1<f64> {
        symmetric_stationary(self.x.view())
    }

    /// Posterior mean transition matrix `E[T]` over all sweeps so far.
    pub fn posterior_mean(&self) -> Array2<f64> {
        mean_transition_matrix(self.sum_t.view(), self.n_accumulated)
    }

    /// Transition matrix of the mean auxiliary matrix. Reversible, unlike
    /// [`ReversibleChain::posterior_mean`].
    pub fn normalized_mean_state(&self) -> Array2<f64> {
        normalized_mean_state(self.sum_x.view(), self.n_accumulated)
    }

    /// Posterior mean stationary distribution `E[pi]` over all sweeps so far.
    pub fn mean_stationary_distribution(&self) -> Array1<f64> {
        mean_of(&self.sum_pi, self.n_accumulated)
    }
}

impl MarkovChain for ReversibleChain {
    type State = Array2<f64>;

    fn step(&mut self) -> &Array2<f64> {
        self.sweep
            .run(self.x.view_mut(), self.step_size, &mut self.rng, &mut self.stats);
        self.sum_x += &self.x;
        accumulate_transition_matrix(self.sum_t.view_mut(), self.x.view());
        self.sum_pi += &symmetric_stationary(self.x.view());
        self.n_accumulated += 1;
        &self.x
    }

    fn current_state(&self) -> &Array2<f64> {
        &self.x
    }
}

/// A single chain restricted to the entries of a [`SparsityPattern`].
///
/// Rows whose diagonal is not listed compensate through an
/// [`ImplicitDiagonal`] owned by the chain, and their mean self-transition
/// probability shows up on the diagonal of
/// [`SparseReversibleChain::posterior_mean_dense`].
#[derive(Debug, Clone)]
pub struct SparseReversibleChain {
    counts: Vec<f64>,
    row_counts: Vec<f64>,
    pattern: SparsityPattern,
    x: Vec<f64>,
    diagonal: ImplicitDiagonal,
    sum_x: Vec<f64>,
    sum_t: Vec<f64>,
    sum_t_diagonal: Vec<f64>,
    sum_pi: Array1<f64>,
    n_accumulated: u64,
    step_size: StepSize,
    stats: SweepStats,
    /// The random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl SparseReversibleChain {
    /// Creates a chain over `pattern` with `counts` listed in pattern order,
    /// starting from the symmetrized counts.
    pub fn new(counts: Vec<f64>, pattern: SparsityPattern) -> Result<Self, SamplerError> {
        let n = pattern.n();
        let x = sparse_initial_state(&counts, &pattern)?;
        let sum_x = vec![0.0; pattern.n_idx()];
        let diagonal = ImplicitDiagonal::new(n);
        validate_sparse(&counts, &x, &sum_x, &diagonal, &pattern)?;
        let row_counts = sparse_row_sums(&counts, &pattern);
        let seed = thread_rng().gen::<u64>();
        Ok(Self {
            counts,
            row_counts,
            sum_t: vec![0.0; pattern.n_idx()],
            pattern,
            x,
            diagonal,
            sum_x,
            sum_t_diagonal: vec![0.0; n],
            sum_pi: Array1::zeros(n),
            n_accumulated: 0,
            step_size: StepSize::default(),
            stats: SweepStats::default(),
            seed,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Sparse chain over the support a dense chain on `counts` would move.
    pub fn from_dense(counts: ArrayView2<f64>) -> Result<Self, SamplerError> {
        validate_counts(counts)?;
        let pattern = SparsityPattern::symmetric_support(counts)?;
        let values = pattern.gather(counts)?;
        Self::new(values, pattern)
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn set_step_size(mut self, step_size: StepSize) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn run(&mut self, n_steps: usize) -> &[f64] {
        for _ in 0..n_steps {
            self.step();
        }
        debug!("sparse reversible chain (seed {}): {}", self.seed, self.stats);
        &self.x
    }

    pub fn run_progress(&mut self, n_steps: usize) -> &[f64] {
        let pb = sweep_progress_bar(n_steps, "Sparse reversible chain");
        run_chain_with_progress(self, n_steps, &pb);
        pb.finish_with_message("Done!");
        debug!("sparse reversible chain (seed {}): {}", self.seed, self.stats);
        &self.x
    }

    pub fn pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    pub fn sum_x(&self) -> &[f64] {
        &self.sum_x
    }

    /// Compensation slots of the rows without a listed diagonal.
    pub fn implicit_diagonal(&self) -> &ImplicitDiagonal {
        &self.diagonal
    }

    pub fn n_accumulated(&self) -> u64 {
        self.n_accumulated
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    /// Stationary distribution of the current state.
    pub fn stationary_distribution(&self) -> Array1<f64> {
        normalized_by_total(state_row_sums(&self.x, &self.diagonal.values, &self.pattern))
    }

    /// Posterior mean stationary distribution `E[pi]` over all sweeps so far.
    pub fn mean_stationary_distribution(&self) -> Array1<f64> {
        mean_of(&self.sum_pi, self.n_accumulated)
    }

    /// Posterior mean transition matrix `E[T]` at the listed positions, in
    /// pattern order.
    pub fn posterior_mean(&self) -> Vec<f64> {
        if self.n_accumulated == 0 {
            return vec![0.0; self.pattern.n_idx()];
        }
        let scale = self.n_accumulated as f64;
        self.sum_t.iter().map(|v| v / scale).collect()
    }

    /// Posterior mean transition matrix scattered into a dense matrix,
    /// including the implicit diagonals.
    pub fn posterior_mean_dense(&self) -> Result<Array2<f64>, SamplerError> {
        let mut mean = self.pattern.scatter(&self.posterior_mean())?;
        if self.n_accumulated > 0 {
            let scale = self.n_accumulated as f64;
            for r in (0..self.pattern.n()).filter(|&r| self.pattern.diagonal(r).is_none()) {
                mean[[r, r]] = self.sum_t_diagonal[r] / scale;
            }
        }
        Ok(mean)
    }

    /// Current state scattered into a dense matrix, including the implicit
    /// diagonals.
    pub fn dense_state(&self) -> Result<Array2<f64>, SamplerError> {
        let mut x = self.pattern.scatter(&self.x)?;
        for r in (0..self.pattern.n()).filter(|&r| self.pattern.diagonal(r).is_none()) {
            x[[r, r]] = self.diagonal.values[r];
        }
        Ok(x)
    }

    fn accumulate(&mut self) {
        accumulate(&mut self.sum_x, &self.x);
        self.diagonal.accumulate(&self.pattern);
        let totals = state_row_sums(&self.x, &self.diagonal.values, &self.pattern);
        accumulate_sparse_transition_matrix(&mut self.sum_t, &self.x, &totals, &self.pattern);
        for (r, &total) in totals.iter().enumerate() {
            if total > 0.0 && self.pattern.diagonal(r).is_none() {
                self.sum_t_diagonal[r] += self.diagonal.values[r] / total;
            }
        }
        self.sum_pi += &normalized_by_total(totals);
        self.n_accumulated += 1;
    }
}

impl MarkovChain for SparseReversibleChain {
    type State = Vec<f64>;

    fn step(&mut self) -> &Vec<f64> {
        sweep_by_rows(
            &self.counts,
            &self.row_counts,
            &mut self.x,
            &mut self.diagonal.values,
            &self.pattern,
            self.step_size,
            &mut self.rng,
            &mut self.stats,
        );
        self.accumulate();
        &self.x
    }

    fn current_state(&self) -> &Vec<f64> {
        &self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run_chain;
    use crate::dense::update;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn counts3() -> Array2<f64> {
        arr2(&[[10.0, 2.0, 0.0], [3.0, 8.0, 1.0], [0.0, 2.0, 6.0]])
    }

    #[test]
    fn test_chain_matches_free_function() {
        let counts = counts3();
        let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(42);
        chain.run(200);

        let mut x = initial_state(counts.view());
        let mut sum_x = Array2::zeros((3, 3));
        let mut rng = SmallRng::seed_from_u64(42);
        let stats = update(
            counts.view(),
            sum_x.view_mut(),
            x.view_mut(),
            200,
            StepSize::default(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(chain.current_state(), &x);
        assert_eq!(chain.sum_x(), sum_x.view());
        assert_eq!(chain.stats(), &stats);
    }

    #[test]
    fn test_trace_has_one_state_per_sweep() {
        let counts = counts3();
        let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(3);
        let trace = run_chain(&mut chain, 20);
        assert_eq!(trace.len(), 20);
        assert_eq!(chain.n_accumulated(), 20);
        let total: Array2<f64> = trace.iter().fold(Array2::zeros((3, 3)), |acc, x| acc + x);
        assert_abs_diff_eq!(total, chain.sum_x().to_owned(), epsilon = 1e-9);

        let mean_t = trace.iter().fold(Array2::<f64>::zeros((3, 3)), |acc, x| {
            acc + transition_matrix(x.view())
        }) / 20.0;
        assert_abs_diff_eq!(chain.posterior_mean(), mean_t, epsilon = 1e-12);
    }

    #[test]
    fn test_stationary_distribution_satisfies_detailed_balance() {
        let counts = counts3();
        let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(5);
        chain.run(50);
        let t = chain.transition_matrix();
        let pi = chain.stationary_distribution();
        assert_abs_diff_eq!(pi.sum(), 1.0, epsilon = 1e-12);
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(pi[i] * t[[i, j]], pi[j] * t[[j, i]], epsilon = 1e-12);
            }
        }
        assert_abs_diff_eq!(chain.mean_stationary_distribution().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_posterior_mean_before_any_sweep_is_zero() {
        let chain = ReversibleChain::new(counts3().view()).unwrap();
        assert_eq!(chain.posterior_mean(), Array2::<f64>::zeros((3, 3)));
        let sparse = SparseReversibleChain::from_dense(counts3().view()).unwrap();
        assert_eq!(sparse.posterior_mean(), vec![0.0; sparse.pattern().n_idx()]);
        assert_eq!(sparse.mean_stationary_distribution(), Array1::<f64>::zeros(3));
    }

    #[test]
    fn test_with_state_validates() {
        let chain = ReversibleChain::new(counts3().view()).unwrap();
        let asymmetric = arr2(&[[1.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            chain.clone().with_state(asymmetric).unwrap_err(),
            SamplerError::AsymmetricState { row: 0, col: 1 }
        );
        assert!(chain.with_state(Array2::eye(3)).is_ok());
    }

    #[test]
    fn test_sparse_chain_matches_dense_chain() {
        let counts = counts3();
        let mut dense = ReversibleChain::new(counts.view()).unwrap().set_seed(9);
        let mut sparse = SparseReversibleChain::from_dense(counts.view()).unwrap().set_seed(9);
        dense.run(300);
        sparse.run(300);

        let x = sparse.dense_state().unwrap();
        assert_abs_diff_eq!(x, dense.current_state().clone(), epsilon = 1e-9);
        assert_abs_diff_eq!(
            sparse.posterior_mean_dense().unwrap(),
            dense.posterior_mean(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            sparse.stationary_distribution(),
            dense.stationary_distribution(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            sparse.mean_stationary_distribution(),
            dense.mean_stationary_distribution(),
            epsilon = 1e-9
        );
        assert_eq!(sparse.stats(), dense.stats());
    }

    #[test]
    fn test_sparse_chain_without_listed_diagonals_matches_dense_chain() {
        let counts = arr2(&[[0.0, 5.0], [3.0, 0.0]]);
        let pattern = SparsityPattern::new(vec![0, 1], vec![1, 0], 2).unwrap();
        let mut sparse = SparseReversibleChain::new(vec![5.0, 3.0], pattern)
            .unwrap()
            .set_seed(42);
        let mut dense = ReversibleChain::new(counts.view()).unwrap().set_seed(42);
        sparse.run(1000);
        dense.run(1000);

        assert!(sparse.stats().pair.accepted > 0);
        assert!(sparse.implicit_diagonal().values.iter().any(|&v| v > 0.0));
        assert_abs_diff_eq!(
            sparse.dense_state().unwrap(),
            dense.current_state().clone(),
            epsilon = 1e-9
        );
        let mean = sparse.posterior_mean_dense().unwrap();
        assert_abs_diff_eq!(mean, dense.posterior_mean(), epsilon = 1e-9);
        assert!(mean[[0, 1]] < 1.0 && mean[[1, 0]] < 1.0);
        assert_eq!(sparse.stats(), dense.stats());
    }

    #[test]
    fn test_sparse_chain_rejects_bad_counts() {
        let pattern = SparsityPattern::new(vec![0, 1], vec![1, 0], 2).unwrap();
        assert!(matches!(
            SparseReversibleChain::new(vec![1.0], pattern.clone()),
            Err(SamplerError::LengthMismatch { .. })
        ));
        assert!(matches!(
            SparseReversibleChain::new(vec![1.0, f64::NAN], pattern),
            Err(SamplerError::InvalidEntry { .. })
        ));
    }
}
