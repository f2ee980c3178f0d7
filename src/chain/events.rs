//! Entanglement state-machine transitions.
//!
//! Applies exactly one selected event to a chain's strand array. Deletions
//! compact the array downward (safe in ascending order); insertions shift
//! upward, which overlaps source and destination ranges, so the pre-shift
//! array is snapshotted into a scratch buffer first and all shifted slots
//! are copied from the snapshot.

use super::random::{PoolKind, RandomPool};
use super::select::JumpEvent;
use super::state::{ChainState, Strand};

/// Apply one selected event to a chain.
///
/// The scratch buffer is reused across steps to avoid per-event allocation;
/// its contents are overwritten.
pub fn apply_event(
    chain: &mut ChainState,
    event: JumpEvent,
    pool: &mut RandomPool,
    scratch: &mut Vec<Strand>,
) {
    match event {
        JumpEvent::ShuffleLeft { j } => apply_shuffle(chain, j, true),
        JumpEvent::ShuffleRight { j } => apply_shuffle(chain, j, false),
        JumpEvent::Destroy { j, .. } => apply_destroy(chain, j),
        JumpEvent::CreateBySd { j, at_beginning } => {
            apply_create_sd(chain, j, at_beginning, pool, scratch)
        }
        JumpEvent::CreateByCd { j, frac } => apply_create_cd(chain, j, frac, pool, scratch),
    }
}

/// Move one segment unit between adjacent strands. No array-shape change.
fn apply_shuffle(chain: &mut ChainState, j: usize, left: bool) {
    if left {
        chain.strands[j].n += 1.0;
        chain.strands[j + 1].n -= 1.0;
    } else {
        chain.strands[j].n -= 1.0;
        chain.strands[j + 1].n += 1.0;
    }
}

/// Merge strand `j+1` into strand `j` and compact the array.
///
/// Three cases differ only in which neighbor's metadata is dropped: at the
/// beginning the merged strand keeps its successor's creation metadata, at
/// the end the merged free end carries none, and interior merges also sum
/// the orientation vectors.
fn apply_destroy(chain: &mut ChainState, j: usize) {
    let z = chain.z;

    let cr_time = chain.strands[j].t_cr;
    if cr_time != 0.0 {
        chain.f_t = (chain.chain_time - cr_time).log10() + 10.0;
    }

    chain.z -= 1;

    if j == 0 {
        chain.strands[0].n += chain.strands[1].n;
        chain.strands[0].q = [0.0; 3];
        chain.strands[0].t_cr = chain.strands[1].t_cr;
        chain.strands[0].tau_cd = chain.strands[1].tau_cd;

        for k in 1..z - 1 {
            chain.strands[k] = chain.strands[k + 1];
        }
        chain.strands[z - 1] = Strand::empty();
    } else if j == z - 2 {
        chain.strands[j].n += chain.strands[j + 1].n;
        chain.strands[j].q = [0.0; 3];
        chain.strands[j].t_cr = 0.0;
        chain.strands[j].tau_cd = 0.0;

        chain.strands[j + 1] = Strand::empty();
    } else {
        for m in 0..3 {
            chain.strands[j].q[m] += chain.strands[j + 1].q[m];
        }
        chain.strands[j].n += chain.strands[j + 1].n;
        chain.strands[j].t_cr = chain.strands[j + 1].t_cr;
        chain.strands[j].tau_cd = chain.strands[j + 1].tau_cd;

        for k in j + 1..z - 1 {
            chain.strands[k] = chain.strands[k + 1];
        }
        chain.strands[z - 1] = Strand::empty();
    }
}

/// Split off a unit free end at a chain boundary by sliding dynamics. The
/// adjacent strand absorbs the remainder with a freshly sampled orientation
/// (variance `new_N / 3`).
fn apply_create_sd(
    chain: &mut ChainState,
    j: usize,
    at_beginning: bool,
    pool: &mut RandomPool,
    scratch: &mut Vec<Strand>,
) {
    let z = chain.z;
    debug_assert!(z < chain.capacity(), "strand capacity exhausted");

    let draw = pool.next_gauss(PoolKind::SlidingDynamics);
    let tcd = draw[3];
    let new_n = chain.strands[j].n - 1.0;
    let sigma = if z == 1 { 0.0 } else { (new_n / 3.0).sqrt() };
    let q = [draw[0] * sigma, draw[1] * sigma, draw[2] * sigma];

    chain.z += 1;

    if at_beginning {
        snapshot(chain, z, scratch);
        for k in j + 1..=z {
            chain.strands[k] = scratch[k - 1];
        }
        // The shifted slot keeps its creation metadata from the snapshot;
        // only the orientation and segment count are replaced.
        chain.strands[j + 1].q = q;
        chain.strands[j + 1].n = new_n;

        chain.strands[j] = Strand {
            q: [0.0; 3],
            n: 1.0,
            t_cr: chain.chain_time,
            tau_cd: tcd,
        };
    } else {
        chain.strands[j + 1] = Strand::free_end();
        chain.strands[j] = Strand {
            q,
            n: new_n,
            t_cr: chain.chain_time,
            tau_cd: tcd,
        };
    }
}

/// Split strand `j` in two by constraint dynamics, partitioning its segment
/// count by the recorded fractional position and redistributing its
/// orientation proportionally plus a sampled fluctuation.
fn apply_create_cd(
    chain: &mut ChainState,
    j: usize,
    frac: f64,
    pool: &mut RandomPool,
    scratch: &mut Vec<Strand>,
) {
    let z = chain.z;
    debug_assert!(z < chain.capacity(), "strand capacity exhausted");

    let source = chain.strands[j];
    let draw = pool.next_gauss(PoolKind::ConstraintDynamics);
    let tcd = draw[3];
    let new_n = (0.5 + frac * (source.n - 2.0)).floor() + 1.0;

    chain.z += 1;

    if j == 0 {
        let remainder = source.n - new_n;
        let sigma = (remainder / 3.0).sqrt();
        let q = [draw[0] * sigma, draw[1] * sigma, draw[2] * sigma];

        snapshot(chain, z, scratch);
        for k in j + 1..=z {
            chain.strands[k] = scratch[k - 1];
        }

        chain.strands[j].tau_cd = tcd;
        chain.strands[j].t_cr = 0.0;

        chain.strands[j + 1].q = q;
        chain.strands[j + 1].n = remainder;

        chain.strands[j].n = new_n;
        chain.strands[j].q = [0.0; 3];
        return;
    }

    let mut sigma = (new_n * (source.n - new_n) / (3.0 * source.n)).sqrt();
    if j == z - 1 {
        sigma = (new_n / 3.0).sqrt();
    }
    let ratio = new_n / source.n;
    let q = [
        draw[0] * sigma + source.q[0] * ratio,
        draw[1] * sigma + source.q[1] * ratio,
        draw[2] * sigma + source.q[2] * ratio,
    ];

    snapshot(chain, z, scratch);
    for k in j + 1..=z {
        chain.strands[k] = scratch[k - 1];
    }

    chain.strands[j + 1].q = [
        source.q[0] - q[0],
        source.q[1] - q[1],
        source.q[2] - q[2],
    ];
    chain.strands[j + 1].n = source.n - new_n;

    chain.strands[j].q = q;
    chain.strands[j].n = new_n;

    // Creation at the tail turns the outer half into a free end.
    if j == z - 1 {
        chain.strands[j + 1].q = [0.0; 3];
    }

    chain.strands[j].tau_cd = tcd;
    chain.strands[j].t_cr = 0.0;
}

/// Copy the active strands into the scratch buffer so shifted slots can be
/// read after their originals are overwritten.
fn snapshot(chain: &ChainState, z: usize, scratch: &mut Vec<Strand>) {
    scratch.clear();
    scratch.extend_from_slice(&chain.strands[..z]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::random::LifetimeSampler;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool() -> RandomPool {
        let mut rng = StdRng::seed_from_u64(99);
        let mut pool = RandomPool::new(64).unwrap();
        pool.fill(
            &mut rng,
            &LifetimeSampler::discrete(vec![1.0], vec![1.0], vec![2.0]).unwrap(),
        );
        pool
    }

    fn interior_chain() -> ChainState {
        let strands = [
            Strand::free_end(),
            Strand {
                q: [0.4, -0.1, 0.2],
                n: 6.0,
                t_cr: 3.0,
                tau_cd: 0.5,
            },
            Strand {
                q: [-0.2, 0.3, 0.0],
                n: 8.0,
                t_cr: 5.0,
                tau_cd: 0.25,
            },
            Strand::free_end(),
        ];
        ChainState::from_strands(10, &strands).unwrap()
    }

    #[test]
    fn test_shuffle_conserves_segments() {
        let mut chain = interior_chain();
        let total = chain.total_segments();
        apply_shuffle(&mut chain, 1, true);
        assert_eq!(chain.strand(1).n, 7.0);
        assert_eq!(chain.strand(2).n, 7.0);
        assert_eq!(chain.total_segments(), total);
        apply_shuffle(&mut chain, 1, false);
        assert_eq!(chain.strand(1).n, 6.0);
        assert_eq!(chain.total_segments(), total);
    }

    #[test]
    fn test_destroy_interior_merges_and_compacts() {
        let mut chain = interior_chain();
        let total = chain.total_segments();
        chain.chain_time = 13.0;
        apply_destroy(&mut chain, 1);

        assert_eq!(chain.z(), 3);
        assert_eq!(chain.total_segments(), total);
        // Interior merge sums orientation and carries the successor's
        // metadata.
        let merged = chain.strand(1);
        assert_eq!(merged.n, 14.0);
        assert!((merged.q[0] - 0.2).abs() < 1e-12);
        assert_eq!(merged.t_cr, 5.0);
        assert_eq!(merged.tau_cd, 0.25);
        // Lifetime record: the destroyed entanglement was created at t=3.
        assert!((chain.f_t - ((13.0f64 - 3.0).log10() + 10.0)).abs() < 1e-12);
        // Tail slot vacated.
        assert_eq!(chain.strands[3], Strand::empty());
    }

    #[test]
    fn test_destroy_at_beginning() {
        let mut chain = interior_chain();
        let total = chain.total_segments();
        apply_destroy(&mut chain, 0);

        assert_eq!(chain.z(), 3);
        assert_eq!(chain.total_segments(), total);
        let head = chain.strand(0);
        assert_eq!(head.n, 7.0);
        assert_eq!(head.q, [0.0; 3]);
        // Carries the successor's creation metadata.
        assert_eq!(head.t_cr, 3.0);
        assert_eq!(head.tau_cd, 0.5);
    }

    #[test]
    fn test_destroy_at_end() {
        let mut chain = interior_chain();
        let total = chain.total_segments();
        apply_destroy(&mut chain, 2);

        assert_eq!(chain.z(), 3);
        assert_eq!(chain.total_segments(), total);
        let tail = chain.strand(2);
        assert_eq!(tail.n, 9.0);
        assert_eq!(tail.q, [0.0; 3]);
        assert_eq!(tail.t_cr, 0.0);
        assert_eq!(tail.tau_cd, 0.0);
    }

    /// Chain whose dangling ends carry more than one segment, so SD
    /// creation is admissible at both boundaries.
    fn open_end_chain() -> ChainState {
        let strands = [
            Strand {
                q: [0.0; 3],
                n: 5.0,
                t_cr: 0.0,
                tau_cd: 0.0,
            },
            Strand {
                q: [0.4, -0.1, 0.2],
                n: 6.0,
                t_cr: 3.0,
                tau_cd: 0.5,
            },
            Strand {
                q: [0.0; 3],
                n: 7.0,
                t_cr: 0.0,
                tau_cd: 0.0,
            },
        ];
        ChainState::from_strands(10, &strands).unwrap()
    }

    #[test]
    fn test_create_sd_at_end() {
        let mut chain = open_end_chain();
        let mut pool = pool();
        let mut scratch = Vec::new();
        let total = chain.total_segments();
        chain.chain_time = 2.5;

        apply_create_sd(&mut chain, 2, false, &mut pool, &mut scratch);

        assert_eq!(chain.z(), 4);
        assert_eq!(chain.total_segments(), total);
        // New free end of unit length at the tail.
        assert_eq!(chain.strand(3).n, 1.0);
        assert_eq!(chain.strand(3).q, [0.0; 3]);
        // The split strand absorbed the remainder and records its creation.
        let created = chain.strand(2);
        assert_eq!(created.n, 6.0);
        assert_eq!(created.t_cr, 2.5);
        assert_eq!(created.tau_cd, 0.5);
    }

    #[test]
    fn test_create_sd_at_beginning_shifts_up() {
        let mut chain = open_end_chain();
        let mut pool = pool();
        let mut scratch = Vec::new();
        let total = chain.total_segments();
        let old = chain.strands().to_vec();
        chain.chain_time = 4.0;

        apply_create_sd(&mut chain, 0, true, &mut pool, &mut scratch);

        assert_eq!(chain.z(), 4);
        assert_eq!(chain.total_segments(), total);
        // New free end at the head.
        assert_eq!(chain.strand(0).n, 1.0);
        assert_eq!(chain.strand(0).t_cr, 4.0);
        // Old head lost its unit segment; its metadata survived the shift.
        assert_eq!(chain.strand(1).n, 4.0);
        assert_eq!(chain.strand(1).t_cr, old[0].t_cr);
        // Strands above the insertion point shifted intact.
        assert_eq!(chain.strand(2), &old[1]);
        assert_eq!(chain.strand(3), &old[2]);
    }

    #[test]
    fn test_create_cd_interior_partitions_segments() {
        let mut chain = interior_chain();
        let mut pool = pool();
        let mut scratch = Vec::new();
        let total = chain.total_segments();
        let source = *chain.strand(2);
        let old_tail = *chain.strand(3);

        apply_create_cd(&mut chain, 2, 0.5, &mut pool, &mut scratch);

        assert_eq!(chain.z(), 5);
        // new_N = floor(0.5 + 0.5 * (8 - 2)) + 1 = 4.
        assert_eq!(chain.strand(2).n, 4.0);
        assert_eq!(chain.strand(3).n, source.n - 4.0);
        assert_eq!(chain.total_segments(), total);
        // Orientation split: the two halves sum to the source vector.
        for m in 0..3 {
            let sum = chain.strand(2).q[m] + chain.strand(3).q[m];
            assert!((sum - source.q[m]).abs() < 1e-12);
        }
        // New entanglement has zero creation time and a sampled lifetime.
        assert_eq!(chain.strand(2).t_cr, 0.0);
        assert_eq!(chain.strand(2).tau_cd, 0.5);
        // Old tail shifted up intact.
        assert_eq!(chain.strand(4), &old_tail);
    }

    #[test]
    fn test_create_cd_at_beginning() {
        let strands = [
            Strand {
                q: [0.6, 0.0, 0.0],
                n: 10.0,
                t_cr: 0.0,
                tau_cd: 0.1,
            },
            Strand::free_end(),
        ];
        let mut chain = ChainState::from_strands(8, &strands).unwrap();
        let mut pool = pool();
        let mut scratch = Vec::new();
        let total = chain.total_segments();

        apply_create_cd(&mut chain, 0, 0.25, &mut pool, &mut scratch);

        assert_eq!(chain.z(), 3);
        assert_eq!(chain.total_segments(), total);
        // new_N = floor(0.5 + 0.25 * 8) + 1 = 3; head keeps the new count
        // with zero orientation.
        assert_eq!(chain.strand(0).n, 3.0);
        assert_eq!(chain.strand(0).q, [0.0; 3]);
        assert_eq!(chain.strand(0).t_cr, 0.0);
        assert_eq!(chain.strand(0).tau_cd, 0.5);
        assert_eq!(chain.strand(1).n, 7.0);
    }
}
