//! Error type shared by all sampling, normalization and assessment routines.

use thiserror::Error;

/// Precondition violations reported before any caller buffer is mutated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    #[error("state space must contain at least one state")]
    EmptyStateSpace,
    #[error("{what} must be square; found {rows}x{cols}")]
    NotSquare {
        what: &'static str,
        rows: usize,
        cols: usize,
    },
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("{what} has length {found}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("entry {position} has index {index}, outside 0..{n}")]
    IndexOutOfRange {
        position: usize,
        index: usize,
        n: usize,
    },
    #[error("sparsity pattern lists ({row}, {col}) more than once")]
    DuplicateEntry { row: usize, col: usize },
    #[error("sparsity pattern lists ({row}, {col}) but not ({col}, {row})")]
    MissingTransposeEntry { row: usize, col: usize },
    #[error("{what} entry ({row}, {col}) = {value} must be finite and non-negative")]
    InvalidEntry {
        what: &'static str,
        row: usize,
        col: usize,
        value: f64,
    },
    #[error("state must be symmetric; ({row}, {col}) differs from its transpose")]
    AsymmetricState { row: usize, col: usize },
    #[error("random walk step size must lie in (0, 1]; found {0}")]
    InvalidStepSize(f64),
    #[error("invalid prior parameter {value} for row {row}")]
    InvalidPrior { row: usize, value: f64 },
    #[error("power iteration did not converge within {iterations} iterations")]
    NoConvergence { iterations: usize },
}
