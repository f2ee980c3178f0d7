//! Per-chain random variate supply.
//!
//! Each chain owns fixed-size buffers of pre-drawn variates: non-zero
//! uniforms for event selection, and 4-wide Gaussian-triple-plus-lifetime
//! entries for strand creation by sliding dynamics (SD) and constraint
//! dynamics (CD). Buffers are refilled on exhaustion; a refill rewrites the
//! consumed prefix and resets the consumption counter.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::SimulationError;

/// Which creation process a Gaussian pool serves. Selects the lifetime
/// distribution branch: SD pulls from the equilibrium distribution, CD from
/// the creation distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolKind {
    SlidingDynamics,
    ConstraintDynamics,
}

/// Parameters of the closed-form lifetime distributions.
///
/// The equilibrium branch returns `(p·at + dt)^ct` below the cutoff
/// `1 - g`, the creation branch `(p·adt + ddt)^cdt` below `bdt`; both fall
/// back to the terminal inverse relaxation time beyond their cutoff.
#[derive(Clone, Copy, Debug)]
pub struct AnalyticLifetime {
    pub at: f64,
    pub ct: f64,
    pub dt: f64,
    pub g: f64,
    pub adt: f64,
    pub bdt: f64,
    pub cdt: f64,
    pub ddt: f64,
    pub tau_d_inverse: f64,
}

/// Sampler for constraint-dynamics waiting times (inverse lifetimes),
/// polymorphic over the two supported representations.
#[derive(Clone, Debug)]
pub enum LifetimeSampler {
    /// Constraint dynamics disabled; lifetime slots are zero.
    Disabled,
    /// Discrete relaxation modes: inverse-CDF lookup, first table entry
    /// `>= p` wins.
    Discrete {
        table_eq: Vec<f64>,
        table_cr: Vec<f64>,
        table_tau: Vec<f64>,
    },
    /// Closed-form two-branch distributions.
    Analytic(AnalyticLifetime),
}

impl LifetimeSampler {
    /// Build a discrete sampler, validating the tables: equal non-zero
    /// lengths, and both CDFs must end at or above 1.0 so the lookup scan
    /// cannot fall off the table.
    pub fn discrete(
        table_eq: Vec<f64>,
        table_cr: Vec<f64>,
        table_tau: Vec<f64>,
    ) -> Result<Self, SimulationError> {
        if table_eq.is_empty() || table_eq.len() != table_cr.len() || table_eq.len() != table_tau.len()
        {
            return Err(SimulationError::Config(format!(
                "lifetime tables must have equal non-zero lengths (eq={}, cr={}, tau={})",
                table_eq.len(),
                table_cr.len(),
                table_tau.len()
            )));
        }
        for (name, table) in [("eq", &table_eq), ("cr", &table_cr)] {
            if *table.last().unwrap_or(&0.0) < 1.0 {
                return Err(SimulationError::Config(format!(
                    "lifetime CDF table '{}' must end at or above 1.0",
                    name
                )));
            }
        }
        if table_tau.iter().any(|&tau| tau <= 0.0) {
            return Err(SimulationError::Config(
                "lifetime tau table entries must be positive".to_string(),
            ));
        }
        Ok(Self::Discrete {
            table_eq,
            table_cr,
            table_tau,
        })
    }

    /// Sample an inverse lifetime for probability draw `p in (0, 1)`.
    pub fn sample(&self, kind: PoolKind, p: f64) -> f64 {
        match self {
            Self::Disabled => 0.0,
            Self::Discrete {
                table_eq,
                table_cr,
                table_tau,
            } => {
                let cdf = match kind {
                    PoolKind::SlidingDynamics => table_eq,
                    PoolKind::ConstraintDynamics => table_cr,
                };
                let idx = cdf
                    .iter()
                    .position(|&c| c >= p)
                    .unwrap_or(cdf.len() - 1);
                1.0 / table_tau[idx]
            }
            Self::Analytic(a) => match kind {
                PoolKind::SlidingDynamics => {
                    if p < 1.0 - a.g {
                        (p * a.at + a.dt).powf(a.ct)
                    } else {
                        a.tau_d_inverse
                    }
                }
                PoolKind::ConstraintDynamics => {
                    if p < a.bdt {
                        (p * a.adt + a.ddt).powf(a.cdt)
                    } else {
                        a.tau_d_inverse
                    }
                }
            },
        }
    }

    /// Whether constraint dynamics is active.
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Fixed-size variate buffers for one chain.
///
/// Invariant: each consumption counter is `<=` its buffer length; the
/// caller must refill a buffer before consuming past its end.
#[derive(Clone, Debug)]
pub struct RandomPool {
    uniform: Vec<f64>,
    uniform_used: usize,
    gauss_sd: Vec<[f64; 4]>,
    sd_used: usize,
    gauss_cd: Vec<[f64; 4]>,
    cd_used: usize,
}

impl RandomPool {
    /// Allocate buffers of `len` entries each. The pool starts exhausted;
    /// call [`fill`](Self::fill) before first use.
    pub fn new(len: usize) -> Result<Self, SimulationError> {
        if len == 0 {
            return Err(SimulationError::Config(
                "random pool length must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            uniform: vec![0.0; len],
            uniform_used: len,
            gauss_sd: vec![[0.0; 4]; len],
            sd_used: len,
            gauss_cd: vec![[0.0; 4]; len],
            cd_used: len,
        })
    }

    /// Buffer length.
    pub fn len(&self) -> usize {
        self.uniform.len()
    }

    /// True when the uniform buffer is fully consumed.
    pub fn uniform_exhausted(&self) -> bool {
        self.uniform_used >= self.uniform.len()
    }

    /// True when the Gaussian buffer for `kind` is fully consumed.
    pub fn gauss_exhausted(&self, kind: PoolKind) -> bool {
        match kind {
            PoolKind::SlidingDynamics => self.sd_used >= self.gauss_sd.len(),
            PoolKind::ConstraintDynamics => self.cd_used >= self.gauss_cd.len(),
        }
    }

    /// Fill every buffer and reset all counters.
    pub fn fill(&mut self, rng: &mut StdRng, sampler: &LifetimeSampler) {
        self.uniform_used = self.uniform.len();
        self.sd_used = self.gauss_sd.len();
        self.cd_used = self.gauss_cd.len();
        self.refill_uniform(rng);
        self.refill_gauss(rng, sampler, PoolKind::SlidingDynamics);
        self.refill_gauss(rng, sampler, PoolKind::ConstraintDynamics);
    }

    /// Rewrite the consumed prefix of the uniform buffer and reset its
    /// counter. Exact-zero draws are resampled because zero feeds
    /// logarithms and inverse-CDF lookups elsewhere.
    pub fn refill_uniform(&mut self, rng: &mut StdRng) {
        for slot in &mut self.uniform[..self.uniform_used] {
            *slot = draw_nonzero_uniform(rng);
        }
        debug!("refilled {} uniform variates", self.uniform_used);
        self.uniform_used = 0;
    }

    /// Rewrite the consumed prefix of a Gaussian buffer and reset its
    /// counter. Each entry holds a Gaussian triple plus a derived
    /// constraint-dynamics inverse lifetime.
    pub fn refill_gauss(&mut self, rng: &mut StdRng, sampler: &LifetimeSampler, kind: PoolKind) {
        let (buf, used) = match kind {
            PoolKind::SlidingDynamics => (&mut self.gauss_sd, &mut self.sd_used),
            PoolKind::ConstraintDynamics => (&mut self.gauss_cd, &mut self.cd_used),
        };
        for slot in &mut buf[..*used] {
            let p = draw_nonzero_uniform(rng);
            slot[3] = sampler.sample(kind, p);
            for g in &mut slot[..3] {
                *g = rng.sample(StandardNormal);
            }
        }
        *used = 0;
    }

    /// Consume one uniform variate.
    pub fn next_uniform(&mut self) -> f64 {
        debug_assert!(self.uniform_used < self.uniform.len());
        let x = self.uniform[self.uniform_used];
        self.uniform_used += 1;
        x
    }

    /// Consume one Gaussian-plus-lifetime entry.
    pub fn next_gauss(&mut self, kind: PoolKind) -> [f64; 4] {
        let (buf, used) = match kind {
            PoolKind::SlidingDynamics => (&self.gauss_sd, &mut self.sd_used),
            PoolKind::ConstraintDynamics => (&self.gauss_cd, &mut self.cd_used),
        };
        debug_assert!(*used < buf.len());
        let x = buf[*used];
        *used += 1;
        x
    }
}

fn draw_nonzero_uniform(rng: &mut StdRng) -> f64 {
    let mut x = 0.0;
    while x == 0.0 {
        x = rng.gen::<f64>();
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniforms_are_nonzero() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = RandomPool::new(64).unwrap();
        pool.fill(&mut rng, &LifetimeSampler::Disabled);
        for _ in 0..64 {
            let x = pool.next_uniform();
            assert!(x > 0.0 && x < 1.0);
        }
        assert!(pool.uniform_exhausted());
    }

    #[test]
    fn test_refill_rewrites_consumed_prefix() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut pool = RandomPool::new(8).unwrap();
        pool.fill(&mut rng, &LifetimeSampler::Disabled);
        let first = pool.next_uniform();
        let untouched = pool.uniform[5];
        pool.refill_uniform(&mut rng);
        assert!(!pool.uniform_exhausted());
        // Slot 0 was consumed and rewritten; slot 5 was not.
        assert_ne!(pool.uniform[0], first);
        assert_eq!(pool.uniform[5], untouched);
    }

    #[test]
    fn test_discrete_lifetime_lookup() {
        let sampler =
            LifetimeSampler::discrete(vec![0.5, 1.0], vec![0.25, 1.0], vec![2.0, 4.0]).unwrap();
        assert_eq!(sampler.sample(PoolKind::SlidingDynamics, 0.3), 0.5);
        assert_eq!(sampler.sample(PoolKind::SlidingDynamics, 0.9), 0.25);
        assert_eq!(sampler.sample(PoolKind::ConstraintDynamics, 0.2), 0.5);
        assert_eq!(sampler.sample(PoolKind::ConstraintDynamics, 0.3), 0.25);
    }

    #[test]
    fn test_discrete_tables_validated() {
        // Last CDF entry below 1.0 would let the lookup fall off the table.
        assert!(LifetimeSampler::discrete(vec![0.5, 0.9], vec![0.5, 1.0], vec![1.0, 1.0]).is_err());
        assert!(LifetimeSampler::discrete(vec![1.0], vec![1.0, 1.0], vec![1.0]).is_err());
        assert!(LifetimeSampler::discrete(vec![1.0], vec![1.0], vec![0.0]).is_err());
    }

    #[test]
    fn test_analytic_lifetime_branches() {
        let sampler = LifetimeSampler::Analytic(AnalyticLifetime {
            at: 1.0,
            ct: 1.0,
            dt: 0.0,
            g: 0.5,
            adt: 2.0,
            bdt: 0.25,
            cdt: 1.0,
            ddt: 0.0,
            tau_d_inverse: 0.125,
        });
        // Equilibrium: below cutoff 1 - g the power branch applies.
        assert_eq!(sampler.sample(PoolKind::SlidingDynamics, 0.25), 0.25);
        assert_eq!(sampler.sample(PoolKind::SlidingDynamics, 0.75), 0.125);
        // Creation branch with its own cutoff.
        assert_eq!(sampler.sample(PoolKind::ConstraintDynamics, 0.1), 0.2);
        assert_eq!(sampler.sample(PoolKind::ConstraintDynamics, 0.5), 0.125);
    }

    #[test]
    fn test_disabled_lifetime_is_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pool = RandomPool::new(16).unwrap();
        pool.fill(&mut rng, &LifetimeSampler::Disabled);
        let entry = pool.next_gauss(PoolKind::SlidingDynamics);
        assert_eq!(entry[3], 0.0);
    }
}
