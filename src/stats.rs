//! Acceptance bookkeeping for the elementary moves of a sampling run.

use std::fmt;
use std::ops::AddAssign;

use crate::moves::MoveOutcome;

/// Outcome counters for one kind of move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveStats {
    pub accepted: u64,
    pub rejected: u64,
    pub out_of_bounds: u64,
    pub frozen: u64,
}

impl MoveStats {
    pub fn record(&mut self, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Accepted => self.accepted += 1,
            MoveOutcome::Rejected => self.rejected += 1,
            MoveOutcome::OutOfBounds => self.out_of_bounds += 1,
            MoveOutcome::Frozen => self.frozen += 1,
        }
    }

    /// Number of proposals actually drawn (frozen groups draw none).
    pub fn proposed(&self) -> u64 {
        self.accepted + self.rejected + self.out_of_bounds
    }

    /// Fraction of drawn proposals that were accepted, or 0 if none were drawn.
    pub fn acceptance_rate(&self) -> f64 {
        match self.proposed() {
            0 => 0.0,
            n => self.accepted as f64 / n as f64,
        }
    }
}

impl AddAssign for MoveStats {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.out_of_bounds += other.out_of_bounds;
        self.frozen += other.frozen;
    }
}

/// Summary of a sampling call: sweeps performed and per-move outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sweeps: u64,
    /// Pair moves (off-diagonal against the two diagonals).
    pub pair: MoveStats,
    /// Diagonal-to-diagonal transfers.
    pub transfer: MoveStats,
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, other: Self) {
        self.sweeps += other.sweeps;
        self.pair += other.pair;
        self.transfer += other.transfer;
    }
}

impl fmt::Display for SweepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sweeps, pair acceptance {:.3} ({} out of bounds), ",
            self.sweeps,
            self.pair.acceptance_rate(),
            self.pair.out_of_bounds,
        )?;
        write!(
            f,
            "transfer acceptance {:.3} ({} out of bounds)",
            self.transfer.acceptance_rate(),
            self.transfer.out_of_bounds,
        )
    }
}
