//! Error taxonomy for the simulation core.
//!
//! Configuration problems are caught at construction time; the two runtime
//! faults (zero total rate, selection miss) identify the offending chain so
//! the driver can abort the run or exclude that chain.

use thiserror::Error;

/// Faults surfaced by the simulation core.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimulationError {
    /// Malformed setup input (lookup tables, buffer sizes, model parameters).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A chain's total transition rate summed to zero; the KMC time step
    /// would be infinite.
    #[error("zero total transition rate for chain {chain}")]
    ZeroTotalRate { chain: usize },

    /// The weighted scan failed to locate an event despite a nonzero total
    /// rate. Indicates an inconsistent rate table.
    #[error("no event found for chain {chain} despite total rate {total}")]
    SelectionMiss { chain: usize, total: u64 },
}
