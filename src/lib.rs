//! Kinetic Monte Carlo simulation of entangled polymer chains in the dual
//! slip-link model.
//!
//! A chain is an ordered array of entanglement strands; stochastic events
//! (segment shuffles, entanglement creation and destruction by sliding or
//! constraint dynamics) are selected by integer-scaled weighted sampling
//! and applied one at a time, with time advancing by the inverse total
//! rate. Chains are independent and stepped in parallel; their stress is
//! reconciled to a common sampling grid through a synchronization barrier.
//! Correlation functions are available online ([`correlator`]) and offline
//! with blocking error bars ([`blocking`]).

pub mod blocking;
pub mod chain;
pub mod correlator;
pub mod error;

pub use blocking::{block_correlation, lag_schedule, CorrelationPoint};
pub use chain::{
    ChainParams, ChainState, Ensemble, EnsembleConfig, LifetimeSampler, Strand,
};
pub use correlator::{CorrelationKind, MultiTauCorrelator};
pub use error::SimulationError;
