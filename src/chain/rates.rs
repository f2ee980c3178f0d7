//! Deformation and per-strand transition rates.
//!
//! Rates are scaled by a fixed integer factor before truncation so the
//! subsequent cumulative sum and comparison in the event selector run in
//! exact integer arithmetic, eliminating floating-point order-of-summation
//! nondeterminism.

use super::state::ChainState;

/// Fixed scaling factor applied to rates before integer truncation.
pub const RATE_SCALE: f64 = 1e6;

/// Rate categories per table row, in scan order.
pub const COL_SHUFFLE_LEFT: usize = 0;
pub const COL_SHUFFLE_RIGHT: usize = 1;
pub const COL_CD_DESTROY: usize = 2;
pub const COL_CD_CREATE: usize = 3;

/// Model parameters shared by every chain in the ensemble.
#[derive(Clone, Copy, Debug)]
pub struct ChainParams {
    /// Kuhn segments per chain.
    pub nk: f64,
    /// Chain-end friction parameter of the free-energy model.
    pub beta: f64,
    /// Whether constraint dynamics is active.
    pub cd_flag: bool,
    /// Prefactor of the constraint-dynamics creation rate, applied to
    /// `N - 1` per strand.
    pub cd_create_prefactor: f64,
}

/// Per-chain table of integer-scaled rates: one row per strand index
/// `j in [0, Z]`, four categories per row.
#[derive(Clone, Debug)]
pub struct RateTable {
    rows: Vec<[u64; 4]>,
}

impl RateTable {
    /// Allocate a table for chains of the given strand capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: vec![[0; 4]; capacity + 1],
        }
    }

    /// Row for strand index `j`.
    #[inline]
    pub fn row(&self, j: usize) -> &[u64; 4] {
        &self.rows[j]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, j: usize) -> &mut [u64; 4] {
        &mut self.rows[j]
    }

    /// Sum of all entries over rows `[0, z]`, restricted to the sliding
    /// columns when constraint dynamics is off.
    pub fn total(&self, z: usize, cd_flag: bool) -> u64 {
        let cols = if cd_flag { 4 } else { 2 };
        self.rows[..=z]
            .iter()
            .map(|row| row[..cols].iter().sum::<u64>())
            .sum()
    }
}

/// Apply affine strain: map each active strand's orientation vector through
/// the velocity-gradient tensor `kappa` (row-major 3x3) scaled by `dt`.
/// Segment counts are untouched.
pub fn apply_strain(chain: &mut ChainState, kappa: &[f64; 9], dt: f64) {
    let z = chain.z;
    for s in &mut chain.strands[..z] {
        let q = s.q;
        s.q[0] = q[0] + dt * (kappa[0] * q[0] + kappa[1] * q[1] + kappa[2] * q[2]);
        s.q[1] = q[1] + dt * (kappa[3] * q[0] + kappa[4] * q[1] + kappa[5] * q[2]);
        s.q[2] = q[2] + dt * (kappa[6] * q[0] + kappa[7] * q[1] + kappa[8] * q[2]);
    }
}

/// Fill the rate table for one chain.
///
/// Interior strand pairs get the two sliding-dynamics shuffle rates from
/// the entropic-spring free energy; the two end rows get the one-sided
/// destruction/creation rates; constraint-dynamics columns are filled when
/// enabled. Rows `[0, z]` are fully rewritten.
pub fn compute_rates(chain: &ChainState, params: &ChainParams, table: &mut RateTable) {
    let z = chain.z();
    let strands = chain.strands();

    for j in 0..z {
        let row = table.row_mut(j);
        *row = [0; 4];

        if j + 1 < z {
            let a = &strands[j];
            let b = &strands[j + 1];
            let qa = a.q_sq();
            let qb = b.q_sq();

            // Shuffle left: a segment moves from strand j+1 to strand j.
            // Requires the donor to keep at least one segment.
            if b.n > 1.0 {
                let sig1 = 0.75 / (a.n * (a.n + 1.0));
                let sig2 = 0.75 / (b.n * (b.n - 1.0));
                // Degenerate branch at |Q|^2 == 0 keeps the distribution
                // regular for free-end strands.
                let (prefactor1, f1) = if qa == 0.0 {
                    (1.0, 2.0 * a.n + 0.5)
                } else {
                    (a.n / (a.n + 1.0), a.n)
                };
                let (prefactor2, f2) = if qb == 0.0 {
                    (1.0, 2.0 * b.n - 0.5)
                } else {
                    (b.n / (b.n - 1.0), b.n)
                };
                let friction = 2.0 / (f1 + f2);
                row[COL_SHUFFLE_LEFT] = (RATE_SCALE
                    * friction
                    * (prefactor1 * prefactor2).powf(0.75)
                    * (qa * sig1 - qb * sig2).exp()) as u64;
            }

            // Shuffle right: a segment moves from strand j to strand j+1.
            if a.n > 1.0 {
                let sig1 = 0.75 / (a.n * (a.n - 1.0));
                let sig2 = 0.75 / (b.n * (b.n + 1.0));
                let (prefactor1, f1) = if qa == 0.0 {
                    (1.0, 2.0 * a.n - 0.5)
                } else {
                    (a.n / (a.n - 1.0), a.n)
                };
                let (prefactor2, f2) = if qb == 0.0 {
                    (1.0, 2.0 * b.n + 0.5)
                } else {
                    (b.n / (b.n + 1.0), b.n)
                };
                let friction = 2.0 / (f1 + f2);
                row[COL_SHUFFLE_RIGHT] = (RATE_SCALE
                    * friction
                    * (prefactor1 * prefactor2).powf(0.75)
                    * (-qa * sig1 + qb * sig2).exp()) as u64;
            }

            if params.cd_flag {
                row[COL_CD_DESTROY] = (RATE_SCALE * a.tau_cd) as u64;
                row[COL_CD_CREATE] =
                    (RATE_SCALE * params.cd_create_prefactor * (a.n - 1.0)) as u64;
            }
        }
    }

    chain_end_rates(chain, params, table);
}

/// Fill the two boundary rows `z-1` and `z` with the one-sided chain-end
/// rates: destruction when the end strand carries a single segment,
/// creation otherwise; a whole chain with `Z == 1` uses the fixed
/// end-to-end rate.
fn chain_end_rates(chain: &ChainState, params: &ChainParams, table: &mut RateTable) {
    let z = chain.z();
    let strands = chain.strands();

    *table.row_mut(z) = [0; 4];
    if z >= 1 {
        *table.row_mut(z - 1) = [0; 4];
    }

    if z == 1 {
        let rate = (RATE_SCALE / (params.beta * params.nk)) as u64;
        table.row_mut(z - 1)[COL_SHUFFLE_RIGHT] = rate;
        table.row_mut(z)[COL_SHUFFLE_RIGHT] = rate;
    } else {
        let first = &strands[0];
        let last = &strands[z - 1];

        if first.n == 1.0 {
            // Destruction by SD at the beginning.
            let neighbor = strands[1].n;
            let c = if z == 2 { neighbor + 0.25 } else { neighbor * 0.5 };
            table.row_mut(z)[COL_SHUFFLE_LEFT] = (RATE_SCALE / (c + 0.75)) as u64;
        } else {
            // Creation by SD at the beginning.
            table.row_mut(z)[COL_SHUFFLE_RIGHT] =
                (RATE_SCALE * 2.0 / (params.beta * (first.n + 0.5))) as u64;
        }

        if last.n == 1.0 {
            // Destruction by SD at the end.
            let neighbor = strands[z - 2].n;
            let c = if z == 2 { neighbor + 0.25 } else { neighbor * 0.5 };
            table.row_mut(z - 1)[COL_SHUFFLE_LEFT] = (RATE_SCALE / (c + 0.75)) as u64;
        } else {
            // Creation by SD at the end.
            table.row_mut(z - 1)[COL_SHUFFLE_RIGHT] =
                (RATE_SCALE * 2.0 / (params.beta * (last.n + 0.5))) as u64;
        }
    }

    if params.cd_flag {
        let last = &strands[z - 1];
        table.row_mut(z - 1)[COL_CD_CREATE] =
            (RATE_SCALE * params.cd_create_prefactor * (last.n - 1.0)) as u64;
    }
}
