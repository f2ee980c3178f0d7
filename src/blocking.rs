//! Offline block-transformed correlation with error bars.
//!
//! For a stored trajectory, computes the correlation function at a
//! geometric schedule of lag times and, per lag, a standard error
//! corrected for autocorrelation by the Flyvbjerg-Petersen blocking
//! method: consecutive samples are pairwise averaged (halving the sample
//! count) until two successive error estimates agree within their combined
//! uncertainty or fewer than four blocks remain.

use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::correlator::CorrelationKind;
use crate::error::SimulationError;

/// Lag-schedule base: unit spacing through `BLOCK_BASE * BLOCK_STRIDE`.
pub const BLOCK_BASE: usize = 8;
/// Lag-schedule stride growth per decade.
pub const BLOCK_STRIDE: usize = 2;

/// Minimum correlation count per lag for a meaningful blocking pass.
const MIN_SAMPLES: usize = 8;

/// Correlation value with its blocking-corrected standard error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrelationPoint {
    pub lag: usize,
    pub mean: f64,
    pub error: f64,
}

/// Lag schedule: unit spacing for the first `BLOCK_BASE * BLOCK_STRIDE`
/// lags, then geometric growth per decade.
pub fn lag_schedule(decades: usize) -> Vec<usize> {
    let mut lags: Vec<usize> = (0..BLOCK_BASE * BLOCK_STRIDE).collect();
    for l in 1..=decades {
        let stride = BLOCK_STRIDE.pow(l as u32);
        let mut lag = BLOCK_BASE * stride;
        let end = BLOCK_BASE * stride * BLOCK_STRIDE;
        while lag < end {
            lags.push(lag);
            lag += stride;
        }
    }
    lags
}

/// Compute the correlation function of one chain's stored trajectory.
///
/// `data` has one row per vector component (3 rows) and one column per
/// stored sample. Lags whose sample count falls below the blocking minimum
/// are dropped from the tail of the schedule.
pub fn block_correlation(
    data: ArrayView2<'_, f64>,
    kind: CorrelationKind,
    decades: usize,
) -> Result<Vec<CorrelationPoint>, SimulationError> {
    if data.nrows() != 3 {
        return Err(SimulationError::Config(format!(
            "trajectory must have 3 component rows, got {}",
            data.nrows()
        )));
    }
    let t = data.ncols();
    if t < BLOCK_BASE * BLOCK_STRIDE + MIN_SAMPLES {
        return Err(SimulationError::Config(format!(
            "trajectory of {} samples is too short for the lag schedule",
            t
        )));
    }

    let lags: Vec<usize> = lag_schedule(decades)
        .into_iter()
        .take_while(|&lag| lag + MIN_SAMPLES <= t)
        .collect();

    let points = lags
        .par_iter()
        .map(|&lag| {
            let (mean, error) = block_point(data, lag, kind);
            CorrelationPoint { lag, mean, error }
        })
        .collect();

    Ok(points)
}

/// Raw correlation mean at one lag plus its blocking-converged standard
/// error.
fn block_point(data: ArrayView2<'_, f64>, lag: usize, kind: CorrelationKind) -> (f64, f64) {
    let t = data.ncols();
    let mut n = t - lag;

    let mut values: Vec<f64> = (0..n)
        .map(|r| match kind {
            CorrelationKind::Product => data[[0, r]] * data[[0, r + lag]],
            CorrelationKind::SquaredDisplacement => (0..3)
                .map(|k| {
                    let diff = data[[k, r]] - data[[k, r + lag]];
                    diff * diff
                })
                .sum(),
        })
        .collect();

    let mean = values.iter().sum::<f64>() / n as f64;

    // Naive standard error of the unblocked samples.
    let (mut sa, mut sb) = standard_error(&values[..n], mean);

    // First halving, then iterate until two consecutive estimates agree
    // within their combined uncertainty or too few blocks remain. Bounded
    // by log2(n) halvings.
    n /= 2;
    halve(&mut values, n);
    let (mut sap, mut sbp) = standard_error(&values[..n], mean);

    while (sa - sap).abs() > sbp + sb && n > 4 {
        sa = sap;
        sb = sbp;
        n /= 2;
        halve(&mut values, n);
        let next = standard_error(&values[..n], mean);
        sap = next.0;
        sbp = next.1;
    }

    (mean, sap)
}

/// Standard error of `values` around the fixed unblocked `mean`, and the
/// uncertainty of that error estimate.
fn standard_error(values: &[f64], mean: f64) -> (f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let c0 = values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let sa = (c0 / (n - 1) as f64).sqrt();
    let sb = sa / (2.0 * (n - 1) as f64).sqrt();
    (sa, sb)
}

/// Average consecutive pairs in place; the first `n` slots hold the result.
fn halve(values: &mut [f64], n: usize) {
    for r in 0..n {
        values[r] = 0.5 * (values[2 * r] + values[2 * r + 1]);
    }
}
