/*!
# Non-reversible sampler

Samples general (not necessarily reversible) transition matrices. Under a
uniform prior the rows of `P` are independent given the counts, and row `i`
follows `Dirichlet(Z_i + 1)`. Each Dirichlet draw is built from independent
`Gamma(alpha_ij, 1)` variates normalized by their row total.

```rust
use mini_revmcmc::assessment::is_transition_matrix;
use mini_revmcmc::nonrev::NonReversibleSampler;
use ndarray::arr2;

let counts = arr2(&[[10.0, 2.0], [3.0, 7.0]]);
let mut sampler = NonReversibleSampler::new(counts.view()).unwrap().set_seed(42);
let p = sampler.sample();
assert!(is_transition_matrix(p.view(), 1e-12));
```
*/

use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2};
use rand::prelude::*;
use rand_distr::Gamma;

use crate::assessment::stationary_distribution;
use crate::core::MarkovChain;
use crate::dense::validate_counts;
use crate::error::SamplerError;
use crate::normalize::normalize_all;

/// One `Gamma(alpha_ij, 1)` per entry, row-major.
fn gamma_table(alpha: ArrayView2<f64>) -> Result<Vec<Gamma<f64>>, SamplerError> {
    alpha
        .indexed_iter()
        .map(|((row, _), &value)| {
            if !(value.is_finite() && value > 0.0) {
                return Err(SamplerError::InvalidPrior { row, value });
            }
            Gamma::new(value, 1.0).map_err(|_| SamplerError::InvalidPrior { row, value })
        })
        .collect()
}

fn fill_dirichlet<R: Rng + ?Sized>(gammas: &[Gamma<f64>], mut p: ArrayViewMut2<f64>, rng: &mut R) {
    let n = p.ncols();
    for ((i, j), v) in p.indexed_iter_mut() {
        *v = gammas[i * n + j].sample(rng);
    }
    normalize_all(p);
}

/**
Replaces every row of `p` with a draw from `Dirichlet(alpha_i)`.

# Errors
Returns an error if `alpha` is not a non-empty square matrix, if `p` has a
different shape, or if any `alpha_ij` is not finite and positive. `p` is left
untouched in that case.
*/
pub fn update_nrev<R: Rng + ?Sized>(
    alpha: ArrayView2<f64>,
    p: ArrayViewMut2<f64>,
    rng: &mut R,
) -> Result<(), SamplerError> {
    let (n, cols) = alpha.dim();
    if n != cols {
        return Err(SamplerError::NotSquare {
            what: "Dirichlet parameters",
            rows: n,
            cols,
        });
    }
    if n == 0 {
        return Err(SamplerError::EmptyStateSpace);
    }
    if p.dim() != (n, n) {
        return Err(SamplerError::ShapeMismatch {
            what: "transition matrix",
            expected: (n, n),
            found: p.dim(),
        });
    }
    let gammas = gamma_table(alpha)?;
    fill_dirichlet(&gammas, p, rng);
    Ok(())
}

/// Posterior sampler for non-reversible transition matrices given counts `Z`.
#[derive(Debug, Clone)]
pub struct NonReversibleSampler {
    alpha: Array2<f64>,
    gammas: Vec<Gamma<f64>>,
    p: Array2<f64>,
    /// The random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl NonReversibleSampler {
    /// Creates a sampler with Dirichlet parameters `Z + 1` and draws an
    /// initial matrix.
    pub fn new(counts: ArrayView2<f64>) -> Result<Self, SamplerError> {
        let n = validate_counts(counts)?;
        let alpha = counts.mapv(|z| z + 1.0);
        let gammas = gamma_table(alpha.view())?;
        let seed = thread_rng().gen::<u64>();
        let mut sampler = Self {
            alpha,
            gammas,
            p: Array2::zeros((n, n)),
            seed,
            rng: SmallRng::seed_from_u64(seed),
        };
        sampler.draw();
        Ok(sampler)
    }

    /// Reseeds the generator and redraws the current matrix from the new seed.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self.draw();
        self
    }

    pub fn alpha(&self) -> ArrayView2<'_, f64> {
        self.alpha.view()
    }

    fn draw(&mut self) {
        fill_dirichlet(&self.gammas, self.p.view_mut(), &mut self.rng);
    }

    /// Draws a fresh transition matrix.
    pub fn sample(&mut self) -> &Array2<f64> {
        self.step()
    }

    /// Draws a fresh transition matrix together with its stationary distribution.
    pub fn sample_with_stationary(&mut self) -> Result<(Array2<f64>, Array1<f64>), SamplerError> {
        self.draw();
        let pi = stationary_distribution(self.p.view())?;
        Ok((self.p.clone(), pi))
    }
}

impl MarkovChain for NonReversibleSampler {
    type State = Array2<f64>;

    fn step(&mut self) -> &Array2<f64> {
        self.draw();
        &self.p
    }

    fn current_state(&self) -> &Array2<f64> {
        &self.p
    }
}
