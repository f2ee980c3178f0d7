//! Ensemble driver: independent chains stepped in parallel.
//!
//! Each chain owns its full runtime (state, variate pool, rate table,
//! stress buffer, correlator, RNG), so a step touches no shared mutable
//! data and the ensemble parallelizes over chains with rayon. Chains are
//! seeded deterministically from a base seed plus their index, making runs
//! reproducible for a fixed seed and thread-count independent.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::correlator::{CorrelationKind, MultiTauCorrelator};
use crate::error::SimulationError;

use super::events::apply_event;
use super::random::{LifetimeSampler, PoolKind, RandomPool};
use super::rates::{apply_strain, compute_rates, ChainParams, RateTable, RATE_SCALE};
use super::select::select_event;
use super::state::{ChainState, Strand};
use super::stress::{chain_control, ControlOutcome, StressBuffer};

/// Ensemble-wide configuration.
#[derive(Clone, Debug)]
pub struct EnsembleConfig {
    /// Number of independent chains.
    pub n_chains: usize,
    /// Strand-array capacity per chain; must exceed the segment count so
    /// splits can never run out of slots.
    pub capacity: usize,
    /// Kuhn segments per chain.
    pub nk: f64,
    /// Chain-end friction parameter.
    pub beta: f64,
    /// Velocity-gradient tensor, row-major 3x3. All zeros for equilibrium.
    pub kappa: [f64; 9],
    /// Whether constraint dynamics is active.
    pub cd_flag: bool,
    /// Prefactor of the constraint-dynamics creation rate.
    pub cd_create_prefactor: f64,
    /// Stress sampling interval.
    pub time_resolution: f64,
    /// Length of one synchronization window.
    pub max_sync_time: f64,
    /// Pre-drawn variates per pool buffer.
    pub pool_size: usize,
    /// Multi-tau correlator levels.
    pub correlator_levels: usize,
    /// Multi-tau correlator window width.
    pub correlator_window: usize,
    /// Which correlation the online correlator accumulates.
    pub correlation: CorrelationKind,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n_chains: 1000,
            capacity: 21,
            nk: 20.0,
            beta: 1.0,
            kappa: [0.0; 9],
            cd_flag: false,
            cd_create_prefactor: 0.0,
            time_resolution: 1.0,
            max_sync_time: 1000.0,
            pool_size: 256,
            correlator_levels: 10,
            correlator_window: 16,
            correlation: CorrelationKind::Product,
        }
    }
}

impl EnsembleConfig {
    fn validate(&self) -> Result<(), SimulationError> {
        if self.n_chains == 0 {
            return Err(SimulationError::Config(
                "ensemble needs at least one chain".to_string(),
            ));
        }
        if self.nk < 2.0 {
            return Err(SimulationError::Config(format!(
                "chain needs at least two segments to entangle, got {}",
                self.nk
            )));
        }
        if self.beta <= 0.0 {
            return Err(SimulationError::Config(format!(
                "beta must be positive, got {}",
                self.beta
            )));
        }
        if (self.capacity as f64) < self.nk + 1.0 {
            return Err(SimulationError::Config(format!(
                "capacity {} cannot hold every split of a {}-segment chain",
                self.capacity, self.nk
            )));
        }
        if self.time_resolution <= 0.0 || self.max_sync_time < self.time_resolution {
            return Err(SimulationError::Config(format!(
                "need 0 < time_resolution <= max_sync_time, got {} / {}",
                self.time_resolution, self.max_sync_time
            )));
        }
        Ok(())
    }
}

/// Everything one chain needs to step itself.
struct ChainRuntime {
    index: usize,
    state: ChainState,
    pool: RandomPool,
    rates: RateTable,
    stress: StressBuffer,
    correlator: MultiTauCorrelator,
    rng: StdRng,
    scratch: Vec<Strand>,
}

impl ChainRuntime {
    /// One KMC iteration: refill exhausted pools, apply the accumulated
    /// strain, reconcile against the sampling grid, then pick and apply a
    /// single transition.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        params: &ChainParams,
        kappa: &[f64; 9],
        flow: bool,
        lifetime: &LifetimeSampler,
        next_sync_time: f64,
        max_sync_time: f64,
        time_resolution: f64,
    ) -> Result<(), SimulationError> {
        if self.state.reach_flag {
            return Ok(());
        }

        if self.pool.uniform_exhausted() {
            self.pool.refill_uniform(&mut self.rng);
        }
        for kind in [PoolKind::SlidingDynamics, PoolKind::ConstraintDynamics] {
            if self.pool.gauss_exhausted(kind) {
                self.pool.refill_gauss(&mut self.rng, lifetime, kind);
            }
        }

        if flow {
            let tdt = self.state.tdt;
            apply_strain(&mut self.state, kappa, tdt);
        }

        match chain_control(
            &mut self.state,
            &mut self.stress,
            next_sync_time,
            max_sync_time,
            time_resolution,
        ) {
            ControlOutcome::Paused => return Ok(()),
            ControlOutcome::Wrote(shear) => self.correlator.push(shear),
            ControlOutcome::Idle => {}
        }

        compute_rates(&self.state, params, &mut self.rates);
        let u = self.pool.next_uniform();
        let selection = select_event(&self.rates, self.state.z(), params.cd_flag, u, self.index)?;
        self.state.advance_time(RATE_SCALE / selection.total as f64);
        apply_event(
            &mut self.state,
            selection.event,
            &mut self.pool,
            &mut self.scratch,
        );
        Ok(())
    }
}

/// An ensemble of independent chains plus the shared model parameters.
pub struct Ensemble {
    params: ChainParams,
    kappa: [f64; 9],
    flow: bool,
    time_resolution: f64,
    max_sync_time: f64,
    lifetime: LifetimeSampler,
    chains: Vec<ChainRuntime>,
}

impl Ensemble {
    /// Build an ensemble of unentangled chains.
    pub fn new(
        config: EnsembleConfig,
        lifetime: LifetimeSampler,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if config.cd_flag && !lifetime.enabled() {
            return Err(SimulationError::Config(
                "constraint dynamics requires a lifetime sampler".to_string(),
            ));
        }

        let params = ChainParams {
            nk: config.nk,
            beta: config.beta,
            cd_flag: config.cd_flag,
            cd_create_prefactor: config.cd_create_prefactor,
        };
        let flow = config.kappa.iter().any(|&k| k != 0.0);

        let mut chains = Vec::with_capacity(config.n_chains);
        for index in 0..config.n_chains {
            let mut rng = StdRng::seed_from_u64(seed + index as u64);
            let mut pool = RandomPool::new(config.pool_size)?;
            pool.fill(&mut rng, &lifetime);
            chains.push(ChainRuntime {
                index,
                state: ChainState::single_strand(config.capacity, config.nk)?,
                pool,
                rates: RateTable::new(config.capacity),
                stress: StressBuffer::new(config.max_sync_time, config.time_resolution),
                correlator: MultiTauCorrelator::new(
                    config.correlator_levels,
                    config.correlator_window,
                    config.correlation,
                )?,
                rng,
                scratch: Vec::with_capacity(config.capacity),
            });
        }

        info!(
            "initialized ensemble: {} chains, {} segments each, cd {}",
            config.n_chains,
            config.nk,
            if config.cd_flag { "on" } else { "off" }
        );

        Ok(Self {
            params,
            kappa: config.kappa,
            flow,
            time_resolution: config.time_resolution,
            max_sync_time: config.max_sync_time,
            lifetime,
            chains,
        })
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// State of chain `i`.
    pub fn chain(&self, i: usize) -> Option<&ChainState> {
        self.chains.get(i).map(|c| &c.state)
    }

    /// Step every unpaused chain once, in parallel.
    pub fn step(&mut self, next_sync_time: f64) -> Result<(), SimulationError> {
        let params = self.params;
        let kappa = self.kappa;
        let flow = self.flow;
        let lifetime = &self.lifetime;
        let max_sync_time = self.max_sync_time;
        let time_resolution = self.time_resolution;

        self.chains.par_iter_mut().try_for_each(|chain| {
            chain.step(
                &params,
                &kappa,
                flow,
                lifetime,
                next_sync_time,
                max_sync_time,
                time_resolution,
            )
        })
    }

    /// Step until every chain is paused at the barrier.
    pub fn advance_to(&mut self, next_sync_time: f64) -> Result<(), SimulationError> {
        while !self.all_reached() {
            self.step(next_sync_time)?;
        }
        Ok(())
    }

    /// Whether every chain is paused at the synchronization barrier.
    pub fn all_reached(&self) -> bool {
        self.chains.iter().all(|c| c.state.reach_flag)
    }

    /// Release every paused chain for the next window.
    pub fn release_barrier(&mut self) {
        for chain in &mut self.chains {
            chain.state.reach_flag = false;
        }
        debug!("released {} chains from the sync barrier", self.chains.len());
    }

    /// Stored stress tensor of chain `i` at `slot`.
    pub fn read_stress(&self, i: usize, slot: usize) -> Option<[f64; 6]> {
        self.chains.get(i)?.stress.slot(slot).copied()
    }

    /// Averaged online correlation of chain `i` at `(level, lag)`.
    pub fn read_correlation(&self, i: usize, level: usize, lag: usize) -> Option<f64> {
        self.chains.get(i)?.correlator.mean(level, lag)
    }
}
