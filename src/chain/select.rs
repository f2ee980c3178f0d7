//! Weighted event selection.
//!
//! Converts a chain's integer rate table into a single sampled
//! (location, event-type) pair: draw `x = ceil(total * u)`, then scan strand
//! rows in increasing order, testing the four rate categories in fixed
//! order, until the cumulative interval containing `x` is found. Wins in
//! the two boundary rows are remapped to chain-end events.

use crate::error::SimulationError;

use super::rates::{RateTable, COL_CD_CREATE, COL_CD_DESTROY, COL_SHUFFLE_LEFT, COL_SHUFFLE_RIGHT};

/// Which stochastic process produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Process {
    SlidingDynamics,
    ConstraintDynamics,
}

/// One selected transition for a chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JumpEvent {
    /// Move one segment from strand `j+1` to strand `j`.
    ShuffleLeft { j: usize },
    /// Move one segment from strand `j` to strand `j+1`.
    ShuffleRight { j: usize },
    /// Merge strand `j+1` into strand `j`.
    Destroy { j: usize, process: Process },
    /// Split off a unit free end by sliding dynamics at strand `j`.
    CreateBySd { j: usize, at_beginning: bool },
    /// Split strand `j` in two by constraint dynamics; `frac` is the
    /// fractional position within the winning rate interval, used to
    /// partition the segment count.
    CreateByCd { j: usize, frac: f64 },
}

/// Outcome of the weighted scan: the total rate (integer-scaled) and the
/// selected event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub total: u64,
    pub event: JumpEvent,
}

/// Select exactly one event for a chain from its rate table.
///
/// `u` must be a non-zero uniform variate in (0, 1]. Returns
/// [`SimulationError::ZeroTotalRate`] when no event is possible (an
/// infinite time step), and [`SimulationError::SelectionMiss`] when the
/// scan exhausts the table despite a nonzero total, which indicates an
/// inconsistent rate table.
pub fn select_event(
    table: &RateTable,
    z: usize,
    cd_flag: bool,
    u: f64,
    chain: usize,
) -> Result<Selection, SimulationError> {
    let total = table.total(z, cd_flag);
    if total == 0 || z == 0 {
        return Err(SimulationError::ZeroTotalRate { chain });
    }

    let x = (total as f64 * u).ceil() as u64;
    let cols = if cd_flag { 4 } else { 2 };

    let mut sum = 0u64;
    for j in 0..=z {
        let row = table.row(j);
        for (col, &rate) in row[..cols].iter().enumerate() {
            let hi = sum + rate;
            if sum < x && x <= hi {
                let event = remap(j, col, z, x, hi, rate, chain)?;
                return Ok(Selection { total, event });
            }
            sum = hi;
        }
    }

    Err(SimulationError::SelectionMiss { chain, total })
}

/// Map a winning (row, category) pair onto a concrete event, remapping the
/// two boundary rows onto chain-end creation/destruction.
fn remap(
    j: usize,
    col: usize,
    z: usize,
    x: u64,
    hi: u64,
    rate: u64,
    chain: usize,
) -> Result<JumpEvent, SimulationError> {
    let event = match col {
        COL_SHUFFLE_LEFT => {
            if j == z {
                // Destroy the entanglement at the beginning of the chain.
                JumpEvent::Destroy {
                    j: 0,
                    process: Process::SlidingDynamics,
                }
            } else if j == z - 1 {
                // Destroy the entanglement at the end: merge the last
                // interior strand pair.
                let j = z.checked_sub(2).ok_or(SimulationError::SelectionMiss {
                    chain,
                    total: hi,
                })?;
                JumpEvent::Destroy {
                    j,
                    process: Process::SlidingDynamics,
                }
            } else {
                JumpEvent::ShuffleLeft { j }
            }
        }
        COL_SHUFFLE_RIGHT => {
            if j == z {
                JumpEvent::CreateBySd {
                    j: 0,
                    at_beginning: true,
                }
            } else if j == z - 1 {
                JumpEvent::CreateBySd {
                    j: z - 1,
                    at_beginning: false,
                }
            } else {
                JumpEvent::ShuffleRight { j }
            }
        }
        COL_CD_DESTROY => JumpEvent::Destroy {
            j,
            process: Process::ConstraintDynamics,
        },
        COL_CD_CREATE => JumpEvent::CreateByCd {
            j,
            frac: (x - (hi - rate)) as f64 / rate as f64,
        },
        _ => unreachable!("rate table has four categories"),
    };
    Ok(event)
}
