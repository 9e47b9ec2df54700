use indicatif::{ProgressBar, ProgressStyle};

pub trait MarkovChain {
    /// What a single iteration produces (a sampled matrix, for the samplers in this crate).
    type State;

    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> &Self::State;

    /// Get the current state without stepping.
    fn current_state(&self) -> &Self::State;
}

/// Runs `n_steps` iterations and returns a copy of every visited state.
pub fn run_chain<M>(chain: &mut M, n_steps: usize) -> Vec<M::State>
where
    M: MarkovChain,
    M::State: Clone,
{
    (0..n_steps).map(|_| chain.step().clone()).collect()
}

/// Runs `n_steps` iterations, advancing `pb` once per iteration, without
/// keeping the visited states.
pub fn run_chain_with_progress<M: MarkovChain>(chain: &mut M, n_steps: usize, pb: &ProgressBar) {
    pb.set_length(n_steps as u64);
    for _ in 0..n_steps {
        chain.step();
        pb.inc(1);
    }
}

/// A progress bar in the style used by all samplers of this crate.
pub fn sweep_progress_bar(n_steps: usize, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(n_steps as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}
