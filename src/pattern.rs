/*!
Sparsity patterns and the per-row index used by the sparse sweep.

A pattern is a coordinate list `(rows[k], cols[k])` over `n_idx` tracked
positions of an `n x n` matrix. Values of a sparse matrix are stored in a
parallel slice of length `n_idx`; positions that are not listed are
implicitly zero and are never updated.

[`generate_row_indexes`] groups entry positions by row with a stable
counting sort, so a row's entries can be visited contiguously, in the order
in which they were listed, without rescanning the full coordinate list.

```rust
use mini_revmcmc::pattern::generate_row_indexes;

let index = generate_row_indexes(&[2, 0, 2, 1], 4).unwrap();
assert_eq!(index.row(0), &[1]);
assert_eq!(index.row(2), &[0, 2]);
assert!(index.row(3).is_empty());
```
*/

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};

use crate::error::SamplerError;

/// Row-grouped view over the positions of a coordinate list.
///
/// The positions of row `r` are `order[offsets[r]..offsets[r + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIndex {
    offsets: Vec<usize>,
    order: Vec<usize>,
}

impl RowIndex {
    /// Entry positions belonging to row `r`, in listed order.
    pub fn row(&self, r: usize) -> &[usize] {
        &self.order[self.offsets[r]..self.offsets[r + 1]]
    }

    pub fn n_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of indexed entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Builds the per-row index for the row coordinates `rows` of an `n`-row matrix.
///
/// Rows without entries get an empty slice. Within a row, entries keep the
/// relative order they have in `rows`.
pub fn generate_row_indexes(rows: &[usize], n: usize) -> Result<RowIndex, SamplerError> {
    let mut offsets = vec![0usize; n + 1];
    for (position, &r) in rows.iter().enumerate() {
        if r >= n {
            return Err(SamplerError::IndexOutOfRange {
                position,
                index: r,
                n,
            });
        }
        offsets[r + 1] += 1;
    }
    for r in 0..n {
        offsets[r + 1] += offsets[r];
    }

    let mut next = offsets[..n].to_vec();
    let mut order = vec![0usize; rows.len()];
    for (position, &r) in rows.iter().enumerate() {
        order[next[r]] = position;
        next[r] += 1;
    }

    Ok(RowIndex { offsets, order })
}

/// A validated, symmetric sparsity pattern with its row index.
///
/// Every listed off-diagonal position `(i, j)` must have its transpose
/// `(j, i)` listed as well, since the sampled state is symmetric. Diagonal
/// positions are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    n: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    index: RowIndex,
    diagonal: Vec<Option<usize>>,
    transpose: Vec<usize>,
}

impl SparsityPattern {
    /**
    Validates the coordinate lists and builds the row index.

    # Errors
    Returns an error if `n == 0`, if `rows` and `cols` differ in length, if an
    index lies outside `0..n`, if a position is listed twice, or if an
    off-diagonal position is listed without its transpose.

    # Examples

    ```rust
    use mini_revmcmc::pattern::SparsityPattern;

    let pattern = SparsityPattern::new(vec![0, 1, 1, 2], vec![1, 0, 2, 1], 3).unwrap();
    assert_eq!(pattern.n_idx(), 4);
    assert_eq!(pattern.transpose(2), 3);
    assert_eq!(pattern.diagonal(0), None);

    assert!(SparsityPattern::new(vec![0], vec![1], 3).is_err());
    ```
    */
    pub fn new(rows: Vec<usize>, cols: Vec<usize>, n: usize) -> Result<Self, SamplerError> {
        if n == 0 {
            return Err(SamplerError::EmptyStateSpace);
        }
        if rows.len() != cols.len() {
            return Err(SamplerError::LengthMismatch {
                what: "column index list",
                expected: rows.len(),
                found: cols.len(),
            });
        }
        if let Some((position, &index)) = cols.iter().enumerate().find(|&(_, &c)| c >= n) {
            return Err(SamplerError::IndexOutOfRange { position, index, n });
        }
        let index = generate_row_indexes(&rows, n)?;

        let mut positions = HashMap::with_capacity(rows.len());
        let mut diagonal = vec![None; n];
        for (k, (&r, &c)) in rows.iter().zip(cols.iter()).enumerate() {
            if positions.insert((r, c), k).is_some() {
                return Err(SamplerError::DuplicateEntry { row: r, col: c });
            }
            if r == c {
                diagonal[r] = Some(k);
            }
        }

        let transpose = rows
            .iter()
            .zip(cols.iter())
            .map(|(&r, &c)| {
                positions
                    .get(&(c, r))
                    .copied()
                    .ok_or(SamplerError::MissingTransposeEntry { row: r, col: c })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            n,
            rows,
            cols,
            index,
            diagonal,
            transpose,
        })
    }

    /// Pattern covering every diagonal position plus every off-diagonal
    /// position with `counts[[i, j]] + counts[[j, i]] > 0`, listed row-major.
    ///
    /// This is exactly the support the dense sampler moves, so running the
    /// sparse sampler on it reproduces a dense run.
    pub fn symmetric_support(counts: ArrayView2<f64>) -> Result<Self, SamplerError> {
        let (n, cols) = counts.dim();
        if n != cols {
            return Err(SamplerError::NotSquare {
                what: "count matrix",
                rows: n,
                cols,
            });
        }
        let (rows, cols): (Vec<usize>, Vec<usize>) = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| i == j || counts[[i, j]] + counts[[j, i]] > 0.0)
            .unzip();
        Self::new(rows, cols, n)
    }

    /// Number of states.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of tracked positions.
    pub fn n_idx(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn row_index(&self) -> &RowIndex {
        &self.index
    }

    /// Entry positions of row `r` in listed order.
    pub fn row_entries(&self, r: usize) -> &[usize] {
        self.index.row(r)
    }

    /// Entry position of the diagonal `(r, r)`, if listed.
    pub fn diagonal(&self, r: usize) -> Option<usize> {
        self.diagonal[r]
    }

    /// Entry position of the transpose of entry `k`.
    pub fn transpose(&self, k: usize) -> usize {
        self.transpose[k]
    }

    /// Reads the tracked positions out of a dense `n x n` matrix.
    pub fn gather(&self, dense: ArrayView2<f64>) -> Result<Vec<f64>, SamplerError> {
        if dense.dim() != (self.n, self.n) {
            return Err(SamplerError::ShapeMismatch {
                what: "dense matrix",
                expected: (self.n, self.n),
                found: dense.dim(),
            });
        }
        Ok(self
            .rows
            .iter()
            .zip(self.cols.iter())
            .map(|(&r, &c)| dense[[r, c]])
            .collect())
    }

    /// Expands sparse values into a dense `n x n` matrix with zeros elsewhere.
    pub fn scatter(&self, values: &[f64]) -> Result<Array2<f64>, SamplerError> {
        self.check_len("sparse values", values.len())?;
        let mut dense = Array2::zeros((self.n, self.n));
        for ((&r, &c), &v) in self.rows.iter().zip(self.cols.iter()).zip(values) {
            dense[[r, c]] = v;
        }
        Ok(dense)
    }

    pub(crate) fn check_len(&self, what: &'static str, found: usize) -> Result<(), SamplerError> {
        if found != self.n_idx() {
            return Err(SamplerError::LengthMismatch {
                what,
                expected: self.n_idx(),
                found,
            });
        }
        Ok(())
    }
}
