//! Online multi-tau correlator.
//!
//! Hierarchical accumulation of a time-correlation function during the
//! run: each level keeps a sliding window of `p` samples and a running
//! correlation sum per lag; every `m` samples consumed by a level forward
//! one input sample to the next coarser level. This yields geometric lag
//! coverage in O(levels) memory instead of O(samples^2).
//!
//! Only the running sum `C` is tracked per lag; per-lag variance tracking
//! is deliberately not implemented (the offline blocking estimator in
//! [`crate::blocking`] owns error estimation).

use crate::error::SimulationError;

/// Block factor `m`: samples consumed per forwarded coarse sample.
pub const BLOCK_FACTOR: usize = 8;

/// Which correlation is accumulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrelationKind {
    /// Product of the first vector component at the two times.
    Product,
    /// Squared displacement over all three components.
    SquaredDisplacement,
}

/// Per-chain multi-level correlator state.
#[derive(Clone, Debug)]
pub struct MultiTauCorrelator {
    kind: CorrelationKind,
    levels: usize,
    window: usize,
    /// Sliding sample windows, newest first: `d[level][0]` is the latest
    /// input at that level.
    d: Vec<Vec<[f64; 3]>>,
    /// Running correlation sums per lag.
    c: Vec<Vec<f64>>,
    /// Per-lag sample counters (divisors for averaging).
    counts: Vec<Vec<u64>>,
    /// Block accumulators feeding the next coarser level.
    accum: Vec<[f64; 3]>,
    /// Fill counters for the block accumulators.
    fill: Vec<usize>,
}

impl MultiTauCorrelator {
    /// Create a correlator with `levels` levels of window width `window`.
    ///
    /// The window must be a positive multiple of the block factor so the
    /// coarse-level lag range `[window / m, window)` is well formed.
    pub fn new(
        levels: usize,
        window: usize,
        kind: CorrelationKind,
    ) -> Result<Self, SimulationError> {
        if levels == 0 || window == 0 || window % BLOCK_FACTOR != 0 {
            return Err(SimulationError::Config(format!(
                "correlator needs levels > 0 and window a positive multiple of {}, got {} x {}",
                BLOCK_FACTOR, levels, window
            )));
        }
        Ok(Self {
            kind,
            levels,
            window,
            d: vec![vec![[0.0; 3]; window]; levels],
            c: vec![vec![0.0; window]; levels],
            counts: vec![vec![0; window]; levels],
            accum: vec![[0.0; 3]; levels],
            fill: vec![0; levels],
        })
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Window width `p`.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Lag in raw-sample units for `(level, lag)`.
    pub fn sample_lag(&self, level: usize, lag: usize) -> usize {
        lag * BLOCK_FACTOR.pow(level as u32)
    }

    /// Insert one raw sample and cascade block forwards.
    pub fn push(&mut self, sample: [f64; 3]) {
        self.insert(0, sample);
        for level in 0..self.levels {
            if self.fill[level] == BLOCK_FACTOR {
                let forwarded = self.accum[level];
                self.accum[level] = [0.0; 3];
                self.fill[level] = 0;
                self.insert(level + 1, forwarded);
            }
        }
    }

    /// Accumulated correlation sum at `(level, lag)`.
    pub fn sum(&self, level: usize, lag: usize) -> Option<f64> {
        self.c.get(level)?.get(lag).copied()
    }

    /// Per-lag sample count at `(level, lag)`.
    pub fn count(&self, level: usize, lag: usize) -> Option<u64> {
        self.counts.get(level)?.get(lag).copied()
    }

    /// Averaged correlation at `(level, lag)`, `None` until a sample has
    /// been accumulated there.
    pub fn mean(&self, level: usize, lag: usize) -> Option<f64> {
        let n = self.count(level, lag)?;
        if n == 0 {
            return None;
        }
        Some(self.c[level][lag] / n as f64)
    }

    fn insert(&mut self, level: usize, sample: [f64; 3]) {
        if level >= self.levels {
            return;
        }

        let d = &mut self.d[level];
        for j in (1..self.window).rev() {
            d[j] = d[j - 1];
        }
        d[0] = sample;

        // Finer levels already cover lags below window / m.
        let start = if level == 0 {
            0
        } else {
            self.window / BLOCK_FACTOR
        };
        for j in start..self.window {
            self.counts[level][j] += 1;
            let value = match self.kind {
                CorrelationKind::Product => d[0][0] * d[j][0],
                CorrelationKind::SquaredDisplacement => {
                    let mut msd = 0.0;
                    for k in 0..3 {
                        let diff = d[0][k] - d[j][k];
                        msd += diff * diff;
                    }
                    msd
                }
            };
            self.c[level][j] += value;
        }

        // Non-averaging forwarding: the accumulator records the first
        // sample of each m-block.
        if self.fill[level] == 0 {
            for k in 0..3 {
                self.accum[level][k] += sample[k];
            }
        }
        self.fill[level] += 1;
    }
}
