//! Posterior behaviour of the reversible sampler on small count matrices.
//!
//! Reference values for the two-state chain come from numerically integrating
//! the posterior density; the bands are several Monte Carlo standard errors wide
//! and narrow enough to tell `E[T]` from the ratio of means `E[X_ij] / E[x_i]`.

use approx::assert_abs_diff_eq;
use mini_revmcmc::assessment::{is_reversible, is_transition_matrix};
use mini_revmcmc::chain::ReversibleChain;
use mini_revmcmc::dense::{initial_state, update};
use mini_revmcmc::moves::StepSize;
use mini_revmcmc::normalize::normalized_mean_state;
use ndarray::{arr2, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn two_state_chain(n_step: usize, seed: u64) -> ReversibleChain {
    let counts = arr2(&[[0.0, 5.0], [3.0, 0.0]]);
    let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(seed);
    chain.run(n_step);
    chain
}

fn two_state_mean(n_step: usize, seed: u64) -> Array2<f64> {
    two_state_chain(n_step, seed).posterior_mean()
}

#[test]
fn test_two_state_off_diagonals_lie_strictly_inside_unit_interval() {
    for seed in [42, 43, 44] {
        let t = two_state_mean(1000, seed);
        assert!(is_transition_matrix(t.view(), 1e-9));
        assert!(t[[0, 1]] > 0.6 && t[[0, 1]] < 1.0, "T01 = {}", t[[0, 1]]);
        assert!(t[[1, 0]] > 0.5 && t[[1, 0]] < 1.0, "T10 = {}", t[[1, 0]]);
        // More observed 0 -> 1 than 1 -> 0 transitions.
        assert!(t[[0, 1]] > t[[1, 0]] - 0.05);
    }
}

#[test]
fn test_two_state_mean_converges_to_posterior_mean() {
    // E[T01] = 0.8471 and E[T10] = 0.7873.
    let chain = two_state_chain(200_000, 42);
    let t = chain.posterior_mean();
    assert_abs_diff_eq!(t[[0, 1]], 0.847, epsilon = 0.008);
    assert_abs_diff_eq!(t[[1, 0]], 0.787, epsilon = 0.01);

    // The mean state normalizes to the ratio of means, 0.8362 and 0.7684.
    let ratio = chain.normalized_mean_state();
    assert_abs_diff_eq!(ratio[[0, 1]], 0.836, epsilon = 0.008);
    assert_abs_diff_eq!(ratio[[1, 0]], 0.768, epsilon = 0.01);
    assert!(t[[0, 1]] > ratio[[0, 1]] && t[[1, 0]] > ratio[[1, 0]]);
}

#[test]
fn test_raw_accumulator_matches_the_chain() {
    // The free function only keeps sum_x; its normalized mean state is the
    // chain's ratio of means.
    let counts = arr2(&[[0.0, 5.0], [3.0, 0.0]]);
    let mut x = initial_state(counts.view());
    let mut sum_x = Array2::zeros((2, 2));
    let mut rng = SmallRng::seed_from_u64(42);
    let step = StepSize::default();
    update(counts.view(), sum_x.view_mut(), x.view_mut(), 5_000, step, &mut rng).unwrap();
    let chain = two_state_chain(5_000, 42);
    assert_abs_diff_eq!(
        normalized_mean_state(sum_x.view(), 5_000),
        chain.normalized_mean_state(),
        epsilon = 1e-12
    );
}

#[test]
fn test_large_symmetric_counts_concentrate_on_row_frequencies() {
    // For symmetric counts the reversible maximum likelihood estimate is C_ij / c_i.
    let counts = arr2(&[[400.0, 100.0, 0.0], [100.0, 300.0, 100.0], [0.0, 100.0, 400.0]]);
    let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(42);
    chain.run(10_000);
    let expected = arr2(&[[0.8, 0.2, 0.0], [0.2, 0.6, 0.2], [0.0, 0.2, 0.8]]);
    assert_abs_diff_eq!(chain.posterior_mean(), expected, epsilon = 0.02);
    assert_eq!(chain.posterior_mean()[[0, 2]], 0.0);
}

#[test]
fn test_every_sample_is_reversible() {
    let counts = arr2(&[[5.0, 7.0, 1.0], [2.0, 3.0, 6.0], [4.0, 1.0, 2.0]]);
    let mut chain = ReversibleChain::new(counts.view()).unwrap().set_seed(7);
    for _ in 0..20 {
        chain.run(25);
        let t = chain.transition_matrix();
        assert!(is_transition_matrix(t.view(), 1e-9));
        assert!(is_reversible(t.view(), 1e-9).unwrap());
    }
    assert!(is_transition_matrix(chain.posterior_mean().view(), 1e-9));
    let mean_state = chain.normalized_mean_state();
    assert!(is_reversible(mean_state.view(), 1e-9).unwrap());
}

#[test]
fn test_smaller_steps_accept_more_often() {
    let counts = arr2(&[[40.0, 10.0], [12.0, 30.0]]);
    let mut wide = ReversibleChain::new(counts.view()).unwrap().set_seed(1);
    let mut narrow = ReversibleChain::new(counts.view())
        .unwrap()
        .set_seed(1)
        .set_step_size(StepSize::new(0.05).unwrap());
    wide.run(2_000);
    narrow.run(2_000);
    assert!(narrow.stats().pair.acceptance_rate() > wide.stats().pair.acceptance_rate());
    assert!(narrow.stats().transfer.acceptance_rate() > wide.stats().transfer.acceptance_rate());
}
