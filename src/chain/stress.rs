//! Stress sampling and the synchronization barrier.
//!
//! Chains advance at their own KMC pace; their stress is reconciled to a
//! common global sampling grid. Whenever a chain's time crosses the next
//! scheduled write boundary, the six independent stress components are
//! stored in a periodic slot. When the chain reaches the externally
//! supplied sync time without exceeding the current write boundary, it is
//! paused at the barrier until the driver releases it.

use super::state::ChainState;

/// Periodic per-chain stress storage, one 6-tuple per write slot.
#[derive(Clone, Debug)]
pub struct StressBuffer {
    slots: Vec<[f64; 6]>,
}

impl StressBuffer {
    /// Allocate one slot per sampling interval of the sync window, plus
    /// the boundary slot.
    pub fn new(max_sync_time: f64, time_resolution: f64) -> Self {
        let n = (max_sync_time / time_resolution) as usize + 1;
        Self {
            slots: vec![[0.0; 6]; n],
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stored stress tensor at `slot`, if in range.
    pub fn slot(&self, slot: usize) -> Option<&[f64; 6]> {
        self.slots.get(slot)
    }
}

/// Outcome of the per-step barrier/sampling check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlOutcome {
    /// Nothing to do this step.
    Idle,
    /// The chain reached the sync barrier and was paused.
    Paused,
    /// A stress sample was written; carries the three shear components
    /// `(tau_xy, tau_yz, tau_xz)` for correlation accumulation.
    Wrote([f64; 3]),
}

/// Check the sync barrier and record stress if the chain crossed its next
/// write boundary.
///
/// Pausing resets the Kahan compensator (via `tdt = 0`) so the next
/// released step starts clean.
pub fn chain_control(
    chain: &mut ChainState,
    stress: &mut StressBuffer,
    next_sync_time: f64,
    max_sync_time: f64,
    time_resolution: f64,
) -> ControlOutcome {
    if chain.reach_flag {
        return ControlOutcome::Paused;
    }

    let write_boundary = chain.write_time as f64 * time_resolution;

    if chain.chain_time >= next_sync_time && chain.chain_time <= write_boundary {
        chain.reach_flag = true;
        chain.tdt = 0.0;
        chain.time_compensation = 0.0;
        return ControlOutcome::Paused;
    }

    if chain.chain_time > write_boundary {
        // Periodic slot within the sync window; the boundary slot is used
        // at exact multiples once the first window has been written.
        let within = (chain.chain_time % max_sync_time) / time_resolution;
        let slot = if within as usize == 0 && chain.write_time != 0 {
            (max_sync_time / time_resolution) as usize
        } else {
            within as usize
        };

        let mut s = [0.0f64; 6];
        for strand in chain.strands() {
            let [qx, qy, qz] = strand.q;
            s[0] -= 3.0 * qx * qx / strand.n;
            s[1] -= 3.0 * qy * qy / strand.n;
            s[2] -= 3.0 * qz * qz / strand.n;
            s[3] -= 3.0 * qx * qy / strand.n;
            s[4] -= 3.0 * qy * qz / strand.n;
            s[5] -= 3.0 * qx * qz / strand.n;
        }
        stress.slots[slot] = s;
        chain.write_time += 1;
        return ControlOutcome::Wrote([s[3], s[4], s[5]]);
    }

    ControlOutcome::Idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::state::Strand;

    fn stretched_chain() -> ChainState {
        let strands = [
            Strand {
                q: [1.0, 2.0, 0.0],
                n: 4.0,
                t_cr: 0.0,
                tau_cd: 0.0,
            },
            Strand {
                q: [0.0, 1.0, 1.0],
                n: 2.0,
                t_cr: 0.0,
                tau_cd: 0.0,
            },
        ];
        ChainState::from_strands(8, &strands).unwrap()
    }

    #[test]
    fn test_stress_written_on_boundary_crossing() {
        let mut chain = stretched_chain();
        let mut buf = StressBuffer::new(100.0, 1.0);
        chain.chain_time = 2.3;
        chain.write_time = 2;

        let outcome = chain_control(&mut chain, &mut buf, 1.0e9, 100.0, 1.0);

        // tau_xx = -3*(1/4), tau_xy = -3*(2/4), tau_yz = -3*(1/2).
        let s = buf.slot(2).unwrap();
        assert!((s[0] + 0.75).abs() < 1e-12);
        assert!((s[3] + 1.5).abs() < 1e-12);
        assert!((s[4] + 1.5).abs() < 1e-12);
        assert_eq!(chain.write_time, 3);
        assert_eq!(outcome, ControlOutcome::Wrote([s[3], s[4], s[5]]));
    }

    #[test]
    fn test_barrier_pauses_chain() {
        let mut chain = stretched_chain();
        let mut buf = StressBuffer::new(100.0, 1.0);
        chain.chain_time = 50.2;
        chain.write_time = 51; // stress recorded up to the boundary
        chain.tdt = 0.7;
        chain.time_compensation = 1e-9;

        let outcome = chain_control(&mut chain, &mut buf, 50.0, 100.0, 1.0);

        assert_eq!(outcome, ControlOutcome::Paused);
        assert!(chain.reach_flag);
        assert_eq!(chain.tdt, 0.0);
        assert_eq!(chain.time_compensation, 0.0);
        assert_eq!(chain.write_time, 51);
    }

    #[test]
    fn test_idle_between_boundaries() {
        let mut chain = stretched_chain();
        let mut buf = StressBuffer::new(100.0, 1.0);
        chain.chain_time = 3.0;
        chain.write_time = 3;

        let outcome = chain_control(&mut chain, &mut buf, 1.0e9, 100.0, 1.0);
        assert_eq!(outcome, ControlOutcome::Idle);
        assert!(!chain.reach_flag);
    }

    #[test]
    fn test_paused_chain_stays_paused() {
        let mut chain = stretched_chain();
        let mut buf = StressBuffer::new(100.0, 1.0);
        chain.reach_flag = true;
        chain.chain_time = 7.7;

        let outcome = chain_control(&mut chain, &mut buf, 1.0e9, 100.0, 1.0);
        assert_eq!(outcome, ControlOutcome::Paused);
        assert_eq!(chain.write_time, 0);
    }
}
