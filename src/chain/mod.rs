//! Slip-link chain module: kinetic Monte Carlo of entangled polymer chains.
//!
//! This module provides the per-chain machinery and the ensemble driver:
//! - ChainState / Strand: fixed-capacity entanglement configuration
//! - RandomPool / LifetimeSampler: pre-drawn variate supply
//! - RateTable: deformation and integer-scaled transition rates
//! - select_event: deterministic weighted event selection
//! - apply_event: the entanglement state machine
//! - StressBuffer / chain_control: stress sampling and the sync barrier
//! - Ensemble: rayon-parallel driver over independent chains

pub mod ensemble;
pub mod events;
pub mod random;
pub mod rates;
pub mod select;
pub mod state;
pub mod stress;

pub use ensemble::{Ensemble, EnsembleConfig};
pub use events::apply_event;
pub use random::{AnalyticLifetime, LifetimeSampler, PoolKind, RandomPool};
pub use rates::{apply_strain, compute_rates, ChainParams, RateTable, RATE_SCALE};
pub use select::{select_event, JumpEvent, Process, Selection};
pub use state::{ChainState, Strand};
pub use stress::{chain_control, ControlOutcome, StressBuffer};
