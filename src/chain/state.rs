//! Per-chain entanglement state.
//!
//! A chain is an ordered, fixed-capacity array of entanglement strands.
//! Array position encodes adjacency: strand `j` and `j+1` are topological
//! neighbors. The array is allocated once and mutated in place; insertions
//! and deletions shift elements rather than reallocating.

use crate::error::SimulationError;

/// One entanglement strand: orientation vector, segment count, creation
/// time and sampled constraint-dynamics lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strand {
    /// End-to-end orientation vector of the strand.
    pub q: [f64; 3],
    /// Number of Kuhn segments carried by the strand.
    pub n: f64,
    /// Simulation time at which the entanglement was created (0 for
    /// constraint-dynamics entanglements and free ends).
    pub t_cr: f64,
    /// Inverse constraint-dynamics lifetime sampled at creation.
    pub tau_cd: f64,
}

impl Strand {
    /// Vacant slot marker.
    pub fn empty() -> Self {
        Self {
            q: [0.0; 3],
            n: 0.0,
            t_cr: 0.0,
            tau_cd: 0.0,
        }
    }

    /// Free dangling end: unit segment, zero orientation.
    pub fn free_end() -> Self {
        Self {
            q: [0.0; 3],
            n: 1.0,
            t_cr: 0.0,
            tau_cd: 0.0,
        }
    }

    /// Squared magnitude of the orientation vector.
    #[inline]
    pub fn q_sq(&self) -> f64 {
        self.q[0] * self.q[0] + self.q[1] * self.q[1] + self.q[2] * self.q[2]
    }
}

/// State of a single simulated chain.
///
/// Invariants:
/// - `0 <= z <= capacity`
/// - the total segment count over active strands is conserved by every
///   event (splits and merges redistribute segments, they never create or
///   destroy them)
#[derive(Clone, Debug)]
pub struct ChainState {
    /// Fixed-capacity strand array; slots `[0, z)` are active.
    pub(crate) strands: Vec<Strand>,
    /// Active strand count.
    pub(crate) z: usize,
    /// Simulated time of this chain.
    pub chain_time: f64,
    /// Kahan residual for `chain_time` accumulation.
    pub time_compensation: f64,
    /// Size of the last accepted time step.
    pub tdt: f64,
    /// Set when the chain is paused at the synchronization barrier.
    pub reach_flag: bool,
    /// Index of the next stress-write slot.
    pub write_time: usize,
    /// Lifetime record of the last destroyed entanglement
    /// (`log10(lifetime) + 10`), written only when the entanglement had a
    /// nonzero creation time.
    pub f_t: f64,
}

impl ChainState {
    /// Create a chain with a single strand of `n` segments (a fully
    /// unentangled chain, free ends only).
    pub fn single_strand(capacity: usize, n: f64) -> Result<Self, SimulationError> {
        if capacity < 2 {
            return Err(SimulationError::Config(format!(
                "strand capacity must be at least 2, got {}",
                capacity
            )));
        }
        if n < 1.0 {
            return Err(SimulationError::Config(format!(
                "chain must carry at least one segment, got {}",
                n
            )));
        }
        let mut strands = vec![Strand::empty(); capacity];
        strands[0] = Strand {
            q: [0.0; 3],
            n,
            t_cr: 0.0,
            tau_cd: 0.0,
        };
        Ok(Self {
            strands,
            z: 1,
            chain_time: 0.0,
            time_compensation: 0.0,
            tdt: 0.0,
            reach_flag: false,
            write_time: 0,
            f_t: 0.0,
        })
    }

    /// Create a chain from an explicit strand configuration.
    pub fn from_strands(capacity: usize, strands: &[Strand]) -> Result<Self, SimulationError> {
        if strands.is_empty() || strands.len() > capacity {
            return Err(SimulationError::Config(format!(
                "strand count {} must be in 1..={}",
                strands.len(),
                capacity
            )));
        }
        let mut chain = Self::single_strand(capacity.max(2), strands[0].n.max(1.0))?;
        chain.z = strands.len();
        for (slot, s) in chain.strands.iter_mut().zip(strands.iter()) {
            *slot = *s;
        }
        Ok(chain)
    }

    /// Active strand count.
    #[inline]
    pub fn z(&self) -> usize {
        self.z
    }

    /// Total slot capacity of the strand array.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.strands.len()
    }

    /// Active strands, in chain order.
    #[inline]
    pub fn strands(&self) -> &[Strand] {
        &self.strands[..self.z]
    }

    /// Active strand at position `j`.
    #[inline]
    pub fn strand(&self, j: usize) -> &Strand {
        &self.strands[j]
    }

    /// Total segment count over active strands.
    pub fn total_segments(&self) -> f64 {
        self.strands[..self.z].iter().map(|s| s.n).sum()
    }

    /// Advance `chain_time` by `dt` with Kahan-compensated summation, so
    /// long runs of many small increments do not lose precision.
    pub fn advance_time(&mut self, dt: f64) {
        self.tdt = dt;
        let y = dt - self.time_compensation;
        let t = self.chain_time + y;
        self.time_compensation = (t - self.chain_time) - y;
        self.chain_time = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_strand_chain() {
        let chain = ChainState::single_strand(8, 20.0).unwrap();
        assert_eq!(chain.z(), 1);
        assert_eq!(chain.capacity(), 8);
        assert_eq!(chain.total_segments(), 20.0);
        assert!(!chain.reach_flag);
    }

    #[test]
    fn test_rejects_degenerate_setup() {
        assert!(ChainState::single_strand(1, 20.0).is_err());
        assert!(ChainState::single_strand(8, 0.0).is_err());
    }

    #[test]
    fn test_from_strands() {
        let strands = [
            Strand {
                q: [1.0, 0.0, 0.0],
                n: 3.0,
                t_cr: 0.0,
                tau_cd: 0.0,
            },
            Strand::free_end(),
        ];
        let chain = ChainState::from_strands(8, &strands).unwrap();
        assert_eq!(chain.z(), 2);
        assert_eq!(chain.total_segments(), 4.0);
        assert_eq!(chain.strand(0).q, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_kahan_time_advance() {
        // Many tiny increments onto a large accumulated time. Naive
        // summation drifts measurably; the compensated sum stays exact to
        // within one ulp of the analytic total.
        let mut chain = ChainState::single_strand(4, 2.0).unwrap();
        chain.chain_time = 1.0e9;
        let dt = 1.0e-7;
        let steps = 100_000;
        for _ in 0..steps {
            chain.advance_time(dt);
        }
        let expected = 1.0e9 + dt * steps as f64;
        assert!((chain.chain_time - expected).abs() < 1e-6);
        assert_eq!(chain.tdt, dt);
    }
}
