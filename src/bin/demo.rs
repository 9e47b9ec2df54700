//! Samples the posterior over reversible transition matrices for a small
//! three-state count matrix and prints the posterior mean.

use mini_revmcmc::assessment::{is_reversible, is_transition_matrix};
use mini_revmcmc::chain::ReversibleChain;
use mini_revmcmc::dev_tools::format_matrix;
use mini_revmcmc::nonrev::NonReversibleSampler;
use ndarray::arr2;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const BURNIN: usize = 1_000;
    const SWEEPS: usize = 20_000;
    const SEED: u64 = 42;

    let counts = arr2(&[[90.0, 10.0, 0.0], [8.0, 80.0, 12.0], [0.0, 15.0, 75.0]]);

    let mut burnin = ReversibleChain::new(counts.view())?.set_seed(SEED);
    let start = burnin.run_progress(BURNIN).clone();
    let mut chain = ReversibleChain::new(counts.view())?
        .set_seed(SEED + 1)
        .with_state(start)?;
    chain.run_progress(SWEEPS);

    let t = chain.posterior_mean();
    println!("Posterior mean transition matrix ({} sweeps):", chain.n_accumulated());
    print!("{}", format_matrix(t.view()));
    println!("Stationary distribution: {:.4}", chain.mean_stationary_distribution());
    println!("Sampler: {}", chain.stats());
    println!("Row-stochastic: {}", is_transition_matrix(t.view(), 1e-10));
    let ratio = chain.normalized_mean_state();
    println!("Transition matrix of the mean state:");
    print!("{}", format_matrix(ratio.view()));
    println!("Reversible: {}", is_reversible(ratio.view(), 1e-8)?);

    let mut nonrev = NonReversibleSampler::new(counts.view())?.set_seed(SEED);
    let (p, pi) = nonrev.sample_with_stationary()?;
    println!("\nOne non-reversible sample:");
    print!("{}", format_matrix(p.view()));
    println!("Its stationary distribution: {:.4}", pi);
    println!("Reversible: {}", is_reversible(p.view(), 1e-8)?);

    Ok(())
}
