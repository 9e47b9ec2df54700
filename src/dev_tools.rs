//! Small helpers for timing runs and printing matrices.

use std::time::{Duration, Instant};

use log::debug;
use ndarray::ArrayView2;

pub struct Timer {
    start: Instant,
    last: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
        }
    }

    /// Time since the previous lap (or creation), restarting the lap clock.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }

    /// Time since creation.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    // Logs the lap time at debug level and returns it.
    pub fn log<T: std::fmt::Debug>(&mut self, msg: T) -> Duration {
        let elapsed = self.lap();
        debug!("{:?}: {:?}", msg, elapsed);
        elapsed
    }
}

/// Renders a matrix with one row per line and fixed-width columns.
///
/// ```rust
/// use mini_revmcmc::dev_tools::format_matrix;
/// use ndarray::arr2;
///
/// let text = format_matrix(arr2(&[[0.25, 0.75], [0.5, 0.5]]).view());
/// assert_eq!(text, "  0.2500  0.7500\n  0.5000  0.5000\n");
/// ```
pub fn format_matrix(m: ArrayView2<f64>) -> String {
    m.rows()
        .into_iter()
        .map(|row| {
            let mut line: String = row.iter().map(|v| format!("{:>8.4}", v)).collect();
            line.push('\n');
            line
        })
        .collect()
}
