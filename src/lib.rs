//! MCMC sampling of reversible transition matrices from transition counts.
//!
//! The sampled object is a symmetric auxiliary matrix `X`; its row-normalized
//! form `T_ij = X_ij / x_i` is reversible with stationary distribution
//! `pi_i = x_i / sum(X)`. [`dense::update`] and [`sparse::update_sparse`] run
//! sweeps over caller-owned buffers, [`chain::ReversibleChain`] wraps the same
//! kernel with its own state and a seeded generator.

pub mod assessment;
pub mod chain;
pub mod core;
pub mod dense;
pub mod dev_tools;
pub mod error;
pub mod moves;
pub mod nonrev;
pub mod normalize;
pub mod pattern;
pub mod rows;
pub mod sparse;
pub mod stats;

pub use error::SamplerError;
