//! Bayesian configuration search over a continuous cell-size factor.

use crate::options::{AcquisitionKind, ContainerKind, DataLayout, Newton3Kind, TraversalKind};
use crate::traits::tuning::TuningStrategy;
use crate::traits::types::{AutoPairError, Result};
use crate::tuning::configuration::{enumerate_search_space, Configuration};
use crate::tuning::gaussian_process::GaussianProcess;
use nalgebra::DVector;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// How many random configurations the acquisition function is evaluated on
/// per step.
const ACQUISITION_SAMPLES: usize = 50;

/// Models the runtime as a Gaussian process over encoded configurations and
/// proposes the acquisition minimizer of a random sample set.
///
/// The cell-size factor is explored continuously over `[min, max]` of the
/// allowed factors; the discrete dimensions are sampled from the compatible
/// tuples.
#[derive(Debug)]
pub struct BayesianSearch {
    /// Discrete part of the space: every compatible tuple at the reference
    /// cell-size factor.
    discrete_space: Vec<Configuration>,
    csf_min: f64,
    csf_max: f64,
    acquisition: AcquisitionKind,
    max_evidence: usize,
    gp: GaussianProcess,
    rng: StdRng,
    current: Configuration,
    evidence_count: usize,
    best_observed: Option<(Configuration, u64)>,
    committed: Option<Configuration>,
}

impl BayesianSearch {
    /// Strategy over the allowed option sets.
    ///
    /// # Arguments
    /// * `acquisition` - Acquisition function to minimize.
    /// * `max_evidence` - Number of measurements before committing.
    /// * `seed` - Seed of the deterministic sampler.
    pub fn new(
        containers: &[ContainerKind],
        cell_size_factors: &[f64],
        traversals: &[TraversalKind],
        layouts: &[DataLayout],
        newton3_options: &[Newton3Kind],
        acquisition: AcquisitionKind,
        max_evidence: usize,
        seed: u64,
    ) -> Result<Self> {
        let csf_min = cell_size_factors.iter().copied().fold(f64::INFINITY, f64::min);
        let csf_max = cell_size_factors
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !(csf_min.is_finite() && csf_max.is_finite()) {
            return Err(AutoPairError::InvalidConfiguration(
                "no cell size factors given".into(),
            ));
        }
        let discrete_space = enumerate_search_space(
            containers,
            &[csf_min],
            traversals,
            layouts,
            newton3_options,
        );
        if discrete_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(
                "bayesian search over an empty configuration space".into(),
            ));
        }
        let current = discrete_space[0];
        // one distance scale per encoded dimension; the continuous dimension
        // is normalized to the factor interval
        let csf_span = (csf_max - csf_min).max(f64::EPSILON);
        let dim_scale = vec![1.0 / (csf_span * csf_span), 1.0, 1.0, 1.0, 1.0];
        Ok(Self {
            discrete_space,
            csf_min,
            csf_max,
            acquisition,
            max_evidence: max_evidence.max(1),
            gp: GaussianProcess::new(1.0, dim_scale, 1e-3),
            rng: StdRng::seed_from_u64(seed),
            current,
            evidence_count: 0,
            best_observed: None,
            committed: None,
        })
    }

    fn encode(config: &Configuration) -> DVector<f64> {
        let container = ContainerKind::ALL
            .iter()
            .position(|&c| c == config.container)
            .unwrap_or(0) as f64;
        let traversal = TraversalKind::ALL
            .iter()
            .position(|&t| t == config.traversal)
            .unwrap_or(0) as f64;
        let layout = match config.layout {
            DataLayout::Aos => 0.0,
            DataLayout::Soa => 1.0,
        };
        let newton3 = match config.newton3 {
            Newton3Kind::Enabled => 0.0,
            Newton3Kind::Disabled => 1.0,
        };
        DVector::from_vec(vec![
            config.cell_size_factor,
            container,
            traversal,
            layout,
            newton3,
        ])
    }

    fn sample_configuration(&mut self) -> Configuration {
        let discrete = Uniform::from(0..self.discrete_space.len());
        let csf = Uniform::from(self.csf_min..=self.csf_max);
        let mut config = self.discrete_space[discrete.sample(&mut self.rng)];
        config.cell_size_factor = csf.sample(&mut self.rng);
        config
    }

    fn propose_next(&mut self) {
        let candidates: Vec<Configuration> = (0..ACQUISITION_SAMPLES)
            .map(|_| self.sample_configuration())
            .collect();
        let encoded: Vec<DVector<f64>> = candidates.iter().map(Self::encode).collect();
        let best = self
            .gp
            .sample_acquisition_min(self.acquisition, &encoded)
            .unwrap_or(0);
        self.current = candidates[best];
    }
}

impl TuningStrategy for BayesianSearch {
    fn current_configuration(&self) -> Configuration {
        self.committed.unwrap_or(self.current)
    }

    fn tune(&mut self, last_was_invalid: bool) -> Result<bool> {
        if self.evidence_count >= self.max_evidence {
            let (config, _) = self.best_observed.ok_or_else(|| {
                AutoPairError::Tuning(
                    "trying to determine the fastest configuration without any measurements"
                        .into(),
                )
            })?;
            self.committed = Some(config);
            tracing::debug!(%config, "selected configuration");
            return Ok(false);
        }
        if last_was_invalid {
            // never propose the failing configuration again this phase
            let failing = self.current;
            self.discrete_space.retain(|c| {
                (c.container, c.traversal, c.layout, c.newton3)
                    != (
                        failing.container,
                        failing.traversal,
                        failing.layout,
                        failing.newton3,
                    )
            });
            if self.discrete_space.is_empty() {
                return Err(AutoPairError::Tuning(
                    "every configuration of the bayesian search space was invalid".into(),
                ));
            }
        }
        self.propose_next();
        Ok(true)
    }

    fn add_evidence(&mut self, time_ns: u64, _iteration: usize) {
        let config = self.current;
        self.gp.add_evidence(Self::encode(&config), time_ns as f64);
        self.evidence_count += 1;
        if self
            .best_observed
            .map(|(_, best)| time_ns < best)
            .unwrap_or(true)
        {
            self.best_observed = Some((config, time_ns));
        }
    }

    fn remove_newton3_option(&mut self, option: Newton3Kind) -> Result<()> {
        self.discrete_space.retain(|c| c.newton3 != option);
        if self.discrete_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "removing every configuration with newton3 {option} emptied the search space"
            )));
        }
        if self.current.newton3 == option {
            self.current = self.discrete_space[0];
        }
        if self
            .committed
            .map(|c| c.newton3 == option)
            .unwrap_or(false)
        {
            self.committed = None;
        }
        Ok(())
    }

    fn reset(&mut self, _iteration: usize) -> Result<()> {
        self.gp.clear();
        self.evidence_count = 0;
        self.best_observed = None;
        self.committed = None;
        self.propose_next();
        Ok(())
    }

    fn search_space_is_trivial(&self) -> bool {
        self.discrete_space.len() == 1 && self.csf_min == self.csf_max
    }

    fn search_space_is_empty(&self) -> bool {
        self.discrete_space.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn strategy() -> BayesianSearch {
        BayesianSearch::new(
            &[ContainerKind::LinkedCells],
            &[0.5, 2.0],
            &[TraversalKind::C08, TraversalKind::Sliced],
            &[DataLayout::Aos, DataLayout::Soa],
            &Newton3Kind::ALL,
            AcquisitionKind::LowerConfidenceBound,
            8,
            42,
        )
        .unwrap()
    }

    #[test]
    fn test_proposals_stay_in_bounds() {
        let mut bs = strategy();
        bs.reset(0).unwrap();
        for i in 0..8 {
            let config = bs.current_configuration();
            assert!(config.cell_size_factor >= 0.5 && config.cell_size_factor <= 2.0);
            assert!(config.is_valid());
            bs.add_evidence(1000 + i, i as usize);
            bs.tune(false).unwrap();
        }
    }

    #[test]
    fn test_commits_best_observed_after_max_evidence() {
        let mut bs = strategy();
        bs.reset(0).unwrap();
        let mut fastest = None;
        for i in 0..8u64 {
            let config = bs.current_configuration();
            let time = if i == 3 { 10 } else { 1000 + i };
            if i == 3 {
                fastest = Some(config);
            }
            bs.add_evidence(time, i as usize);
            if !bs.tune(false).unwrap() {
                break;
            }
        }
        assert!(!bs.tune(false).unwrap());
        assert_eq!(Some(bs.current_configuration()), fastest);
    }

    #[test]
    fn test_deterministic_under_seed() {
        let mut a = strategy();
        let mut b = strategy();
        a.reset(0).unwrap();
        b.reset(0).unwrap();
        assert_eq!(a.current_configuration(), b.current_configuration());
    }
}
