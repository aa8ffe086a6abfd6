//! The engine façade: lifecycle, tuning loop, and data-plane access.

use crate::containers::selector::AnyContainer;
use crate::containers::{DomainInfo, PairwiseSpec, ParticleContainer};
use crate::options::{
    AcquisitionKind, ContainerKind, DataLayout, IteratorBehavior, LoadEstimatorKind, Newton3Kind,
    SelectorStrategy, TraversalKind, TuningStrategyKind,
};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traits::tuning::TuningStrategy;
use crate::traits::types::{AutoPairError, Result};
use crate::tuning::bayesian::BayesianSearch;
use crate::tuning::configuration::{enumerate_search_space, Configuration};
use crate::tuning::full_search::FullSearch;
use crate::tuning::predictive::PredictiveTuning;
use crate::utils::timer::Timer;
use std::marker::PhantomData;

/// Configures and constructs an [`AutoPair`] engine.
///
/// All setters are optional; [`build`](AutoPairBuilder::build) validates the
/// combination and fails with a message naming the offending parameter.
pub struct AutoPairBuilder<P> {
    box_min: [f64; 3],
    box_max: [f64; 3],
    cutoff: f64,
    skin: f64,
    rebuild_frequency: usize,
    tuning_interval: usize,
    num_samples: usize,
    max_evidence: usize,
    allowed_containers: Vec<ContainerKind>,
    allowed_traversals: Vec<TraversalKind>,
    allowed_layouts: Vec<DataLayout>,
    allowed_newton3: Vec<Newton3Kind>,
    allowed_cell_size_factors: Vec<f64>,
    tuning_strategy: TuningStrategyKind,
    selector_strategy: SelectorStrategy,
    acquisition: AcquisitionKind,
    load_estimator: LoadEstimatorKind,
    relative_optimum_range: f64,
    max_tuning_phases_without_test: usize,
    seed: u64,
    injected_strategy: Option<Box<dyn TuningStrategy>>,
    _particle: PhantomData<P>,
}

impl<P: Particle> Default for AutoPairBuilder<P> {
    fn default() -> Self {
        Self {
            box_min: [0.0; 3],
            box_max: [1.0; 3],
            cutoff: 1.0,
            skin: 0.2,
            rebuild_frequency: 20,
            tuning_interval: 100,
            num_samples: 3,
            max_evidence: 10,
            allowed_containers: ContainerKind::ALL.to_vec(),
            allowed_traversals: TraversalKind::ALL.to_vec(),
            allowed_layouts: vec![DataLayout::Aos, DataLayout::Soa],
            allowed_newton3: Newton3Kind::ALL.to_vec(),
            allowed_cell_size_factors: vec![1.0],
            tuning_strategy: TuningStrategyKind::FullSearch,
            selector_strategy: SelectorStrategy::FastestAbs,
            acquisition: AcquisitionKind::LowerConfidenceBound,
            load_estimator: LoadEstimatorKind::SquaredCellSize,
            relative_optimum_range: 1.2,
            max_tuning_phases_without_test: 5,
            seed: 0,
            injected_strategy: None,
            _particle: PhantomData,
        }
    }
}

impl<P: Particle> AutoPairBuilder<P> {
    /// Fresh builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower corner of the owned box.
    pub fn box_min(mut self, v: [f64; 3]) -> Self {
        self.box_min = v;
        self
    }

    /// Upper corner of the owned box.
    pub fn box_max(mut self, v: [f64; 3]) -> Self {
        self.box_max = v;
        self
    }

    /// Interaction cutoff handed to the containers.
    pub fn cutoff(mut self, v: f64) -> Self {
        self.cutoff = v;
        self
    }

    /// Verlet skin on top of the cutoff.
    pub fn verlet_skin(mut self, v: f64) -> Self {
        self.skin = v;
        self
    }

    /// Neighbor lists are rebuilt at least every this many iterations.
    pub fn verlet_rebuild_frequency(mut self, v: usize) -> Self {
        self.rebuild_frequency = v;
        self
    }

    /// Iterations between two tuning phases.
    pub fn tuning_interval(mut self, v: usize) -> Self {
        self.tuning_interval = v;
        self
    }

    /// Measurements per configuration within a tuning phase.
    pub fn num_samples(mut self, v: usize) -> Self {
        self.num_samples = v;
        self
    }

    /// Measurement budget of the Bayesian strategy.
    pub fn max_evidence(mut self, v: usize) -> Self {
        self.max_evidence = v;
        self
    }

    /// Containers the tuner may choose from.
    pub fn allowed_containers(mut self, v: Vec<ContainerKind>) -> Self {
        self.allowed_containers = v;
        self
    }

    /// Traversals the tuner may choose from.
    pub fn allowed_traversals(mut self, v: Vec<TraversalKind>) -> Self {
        self.allowed_traversals = v;
        self
    }

    /// Data layouts the tuner may choose from.
    pub fn allowed_data_layouts(mut self, v: Vec<DataLayout>) -> Self {
        self.allowed_layouts = v;
        self
    }

    /// Newton-3 modes the tuner may choose from.
    pub fn allowed_newton3_options(mut self, v: Vec<Newton3Kind>) -> Self {
        self.allowed_newton3 = v;
        self
    }

    /// Cell-size factors the tuner may choose from.
    pub fn allowed_cell_size_factors(mut self, v: Vec<f64>) -> Self {
        self.allowed_cell_size_factors = v;
        self
    }

    /// Which tuning strategy drives the search.
    pub fn tuning_strategy(mut self, v: TuningStrategyKind) -> Self {
        self.tuning_strategy = v;
        self
    }

    /// How the samples of one configuration reduce to evidence.
    pub fn selector_strategy(mut self, v: SelectorStrategy) -> Self {
        self.selector_strategy = v;
        self
    }

    /// Acquisition function of the Bayesian strategy.
    pub fn acquisition(mut self, v: AcquisitionKind) -> Self {
        self.acquisition = v;
        self
    }

    /// Load estimator of the balanced sliced traversal.
    pub fn load_estimator(mut self, v: LoadEstimatorKind) -> Self {
        self.load_estimator = v;
        self
    }

    /// Prediction range of the predictive strategy.
    pub fn relative_optimum_range(mut self, v: f64) -> Self {
        self.relative_optimum_range = v;
        self
    }

    /// Staleness bound of the predictive strategy.
    pub fn max_tuning_phases_without_test(mut self, v: usize) -> Self {
        self.max_tuning_phases_without_test = v;
        self
    }

    /// Seed of the Bayesian sampler.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Inject a pre-built tuning strategy, e.g. a rank-partitioned search
    /// constructed around an MPI communicator. Overrides
    /// [`tuning_strategy`](AutoPairBuilder::tuning_strategy).
    pub fn with_strategy(mut self, strategy: Box<dyn TuningStrategy>) -> Self {
        self.injected_strategy = Some(strategy);
        self
    }

    /// Validate the options and construct the engine.
    pub fn build(self) -> Result<AutoPair<P>> {
        for k in 0..3 {
            if self.box_max[k] <= self.box_min[k] {
                return Err(AutoPairError::InvalidConfiguration(format!(
                    "box is empty along axis {k}: [{}, {}]",
                    self.box_min[k], self.box_max[k]
                )));
            }
        }
        if self.cutoff <= 0.0 {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "cutoff must be positive, got {}",
                self.cutoff
            )));
        }
        if self.skin < 0.0 {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "skin must be non-negative, got {}",
                self.skin
            )));
        }
        if self.num_samples == 0 || self.tuning_interval == 0 {
            return Err(AutoPairError::InvalidConfiguration(
                "num_samples and tuning_interval must be at least 1".into(),
            ));
        }

        let search_space = enumerate_search_space(
            &self.allowed_containers,
            &self.allowed_cell_size_factors,
            &self.allowed_traversals,
            &self.allowed_layouts,
            &self.allowed_newton3,
        );
        if search_space.is_empty() && self.injected_strategy.is_none() {
            return Err(AutoPairError::InvalidConfiguration(
                "the allowed options leave an empty configuration search space".into(),
            ));
        }

        let strategy: Box<dyn TuningStrategy> = match self.injected_strategy {
            Some(strategy) => strategy,
            None => match self.tuning_strategy {
                TuningStrategyKind::FullSearch => Box::new(FullSearch::new(search_space)?),
                TuningStrategyKind::Predictive => Box::new(PredictiveTuning::new(
                    search_space,
                    self.relative_optimum_range,
                    self.max_tuning_phases_without_test,
                )?),
                TuningStrategyKind::Bayesian => Box::new(BayesianSearch::new(
                    &self.allowed_containers,
                    &self.allowed_cell_size_factors,
                    &self.allowed_traversals,
                    &self.allowed_layouts,
                    &self.allowed_newton3,
                    self.acquisition,
                    self.max_evidence,
                    self.seed,
                )?),
                TuningStrategyKind::FullSearchMpi => {
                    // the rank-partitioned strategy needs a communicator,
                    // injected through with_strategy; fall back locally
                    tracing::warn!(
                        "no communicator injected for the rank-partitioned search, \
                         falling back to the local full search"
                    );
                    Box::new(FullSearch::new(search_space)?)
                }
            },
        };

        let domain = DomainInfo {
            box_min: self.box_min,
            box_max: self.box_max,
            cutoff: self.cutoff,
            skin: self.skin,
        };
        let current_config = strategy.current_configuration();
        let container = AnyContainer::build(
            current_config.container,
            domain,
            current_config.cell_size_factor,
        );

        Ok(AutoPair {
            domain,
            container,
            strategy,
            current_config,
            iteration: 0,
            iterations_since_tuning: 0,
            tuning_interval: self.tuning_interval,
            num_samples: self.num_samples,
            rebuild_frequency: self.rebuild_frequency.max(1),
            steps_since_rebuild: 0,
            samples: Vec::new(),
            is_tuning: false,
            tuned_once: false,
            selector_strategy: self.selector_strategy,
            load_estimator: self.load_estimator,
        })
    }
}

/// The auto-tuning pairwise interaction engine.
///
/// Lifecycle per iteration: add or move particles, call
/// [`update_container`](AutoPair::update_container) when particles may have
/// left the box, then [`iterate_pairwise`](AutoPair::iterate_pairwise) with
/// the interaction functor. The engine rebuilds stale neighbor structures,
/// measures sampling iterations, and reconfigures itself between tuning
/// phases.
pub struct AutoPair<P: Particle> {
    domain: DomainInfo,
    container: AnyContainer<P>,
    strategy: Box<dyn TuningStrategy>,
    current_config: Configuration,
    iteration: usize,
    iterations_since_tuning: usize,
    tuning_interval: usize,
    num_samples: usize,
    rebuild_frequency: usize,
    steps_since_rebuild: usize,
    samples: Vec<u64>,
    is_tuning: bool,
    tuned_once: bool,
    selector_strategy: SelectorStrategy,
    load_estimator: LoadEstimatorKind,
}

impl<P: Particle> AutoPair<P> {
    /// Builder entry point.
    pub fn builder() -> AutoPairBuilder<P> {
        AutoPairBuilder::new()
    }

    /// Add an owned particle; its position must lie inside the box.
    pub fn add_particle(&mut self, p: P) -> Result<()> {
        self.container.add(p)
    }

    /// Add a halo particle; its position must lie outside the box.
    pub fn add_halo_particle(&mut self, p: P) -> Result<()> {
        self.container.add_halo(p)
    }

    /// Update a stored halo particle by id, or report that none matched.
    pub fn update_halo_particle(&mut self, p: P) -> bool {
        self.container.update_halo(p)
    }

    /// Remove all halo particles.
    pub fn delete_halo_particles(&mut self) {
        self.container.delete_halo()
    }

    /// Repartition drifted particles; returns the particles that left the
    /// box, each exactly once.
    pub fn update_container(&mut self) -> Vec<P> {
        self.container.update()
    }

    /// Deliver every particle pair within the cutoff to `functor` under the
    /// currently selected configuration.
    ///
    /// Returns whether this iteration was part of a tuning phase.
    pub fn iterate_pairwise<F: PairwiseFunctor<P>>(&mut self, functor: &F) -> Result<bool> {
        self.enforce_functor_newton3(functor)?;

        // enter a tuning phase on the tuning interval
        if !self.is_tuning
            && functor.is_relevant_for_tuning()
            && (!self.tuned_once || self.iterations_since_tuning >= self.tuning_interval)
            && !self.strategy.search_space_is_trivial()
        {
            tracing::debug!(iteration = self.iteration, "starting tuning phase");
            self.is_tuning = true;
            self.samples.clear();
            self.strategy.reset(self.iteration)?;
            self.apply_configuration()?;
        }

        // rebuild stale neighbor structures
        if self.steps_since_rebuild >= self.rebuild_frequency || self.container.is_update_needed()
        {
            self.container
                .rebuild_neighbor_lists(self.current_config.newton3.as_bool());
            self.steps_since_rebuild = 0;
        }

        let spec = self.pairwise_spec();
        let mut timer = Timer::new();
        timer.start();
        let run = self.container.iterate_pairwise(&spec, functor);
        let elapsed_ns = timer.stop();

        let was_tuning = self.is_tuning;
        match run {
            Ok(()) => {
                if self.is_tuning && functor.is_relevant_for_tuning() {
                    self.samples.push(elapsed_ns);
                    if self.samples.len() >= self.num_samples {
                        let evidence = self.reduce_samples();
                        self.strategy.add_evidence(evidence, self.iteration);
                        self.samples.clear();
                        self.advance_tuning(false)?;
                    }
                }
            }
            Err(error) => {
                if self.is_tuning {
                    // the configuration cannot run here; skip its sample
                    tracing::debug!(config = %self.current_config, %error, "configuration invalid");
                    self.samples.clear();
                    self.advance_tuning(true)?;
                } else {
                    return Err(error);
                }
            }
        }

        self.iteration += 1;
        self.steps_since_rebuild += 1;
        if !self.is_tuning {
            self.iterations_since_tuning += 1;
        }
        Ok(was_tuning)
    }

    /// Visit every particle matching `behavior`.
    pub fn for_each(&self, behavior: IteratorBehavior, mut f: impl FnMut(&P)) {
        self.container.for_each(behavior, &mut f)
    }

    /// Mutably visit every particle matching `behavior`.
    pub fn for_each_mut(&mut self, behavior: IteratorBehavior, mut f: impl FnMut(&mut P)) {
        self.container.for_each_mut(behavior, &mut f)
    }

    /// Visit every particle in the closed region `[lo, hi]` matching
    /// `behavior`.
    pub fn for_each_in_region(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        mut f: impl FnMut(&P),
    ) {
        self.container.for_each_in_region(lo, hi, behavior, &mut f)
    }

    /// Mutably visit every particle in the closed region `[lo, hi]`.
    pub fn for_each_in_region_mut(
        &mut self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        mut f: impl FnMut(&mut P),
    ) {
        self.container
            .for_each_in_region_mut(lo, hi, behavior, &mut f)
    }

    /// Fold over every particle matching `behavior`.
    pub fn reduce<A>(
        &self,
        behavior: IteratorBehavior,
        init: A,
        mut f: impl FnMut(A, &P) -> A,
    ) -> A {
        let mut acc = Some(init);
        self.container.for_each(behavior, &mut |p| {
            acc = Some(f(acc.take().expect("accumulator present"), p));
        });
        acc.expect("accumulator present")
    }

    /// Number of particles matching `behavior`.
    pub fn num_particles(&self, behavior: IteratorBehavior) -> usize {
        self.container.num_particles(behavior)
    }

    /// Snapshot of every particle matching `behavior`.
    pub fn particles(&self, behavior: IteratorBehavior) -> Vec<P> {
        self.container.collect_particles(behavior)
    }

    /// The interaction cutoff.
    pub fn cutoff(&self) -> f64 {
        self.domain.cutoff
    }

    /// The Verlet skin.
    pub fn verlet_skin(&self) -> f64 {
        self.domain.skin
    }

    /// Cutoff plus skin.
    pub fn interaction_length(&self) -> f64 {
        self.domain.interaction_length()
    }

    /// Lower corner of the owned box.
    pub fn box_min(&self) -> [f64; 3] {
        self.domain.box_min
    }

    /// Upper corner of the owned box.
    pub fn box_max(&self) -> [f64; 3] {
        self.domain.box_max
    }

    /// The configuration in effect.
    pub fn current_configuration(&self) -> Configuration {
        self.current_config
    }

    /// Completed pairwise iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn pairwise_spec(&self) -> PairwiseSpec {
        PairwiseSpec {
            traversal: self.current_config.traversal,
            layout: self.current_config.layout,
            newton3: self.current_config.newton3.as_bool(),
            load_estimator: self.load_estimator,
        }
    }

    fn reduce_samples(&self) -> u64 {
        match self.selector_strategy {
            SelectorStrategy::FastestAbs => {
                self.samples.iter().copied().min().unwrap_or(u64::MAX)
            }
            SelectorStrategy::FastestMean => {
                self.samples.iter().sum::<u64>() / self.samples.len().max(1) as u64
            }
        }
    }

    fn advance_tuning(&mut self, last_was_invalid: bool) -> Result<()> {
        let more = self.strategy.tune(last_was_invalid)?;
        if !more {
            self.is_tuning = false;
            self.tuned_once = true;
            self.iterations_since_tuning = 0;
            tracing::debug!(
                config = %self.strategy.current_configuration(),
                "committed configuration"
            );
        }
        self.apply_configuration()
    }

    /// Drop Newton-3 modes the functor refuses from the search space.
    fn enforce_functor_newton3<F: PairwiseFunctor<P>>(&mut self, functor: &F) -> Result<()> {
        if !functor.allows_newton3() && !functor.allows_non_newton3() {
            return Err(AutoPairError::InvalidConfiguration(
                "functor allows neither Newton-3 mode".into(),
            ));
        }
        if !functor.allows_newton3() && self.current_config.newton3 == Newton3Kind::Enabled {
            self.strategy.remove_newton3_option(Newton3Kind::Enabled)?;
            self.apply_configuration()?;
        }
        if !functor.allows_non_newton3() && self.current_config.newton3 == Newton3Kind::Disabled {
            self.strategy.remove_newton3_option(Newton3Kind::Disabled)?;
            self.apply_configuration()?;
        }
        Ok(())
    }

    /// Make the container match the strategy's current configuration.
    ///
    /// Switching the container kind or cell size is the expensive path: the
    /// particles are carried over into a freshly built container.
    fn apply_configuration(&mut self) -> Result<()> {
        let next = self.strategy.current_configuration();
        let container_changed = next.container != self.current_config.container
            || next.cell_size_factor.to_bits() != self.current_config.cell_size_factor.to_bits();
        if container_changed || self.container.kind() != next.container {
            tracing::trace!(from = %self.current_config, to = %next, "switching container");
            let owned = self.container.collect_particles(IteratorBehavior::Owned);
            let halo = self.container.collect_particles(IteratorBehavior::Halo);
            let mut fresh =
                AnyContainer::build(next.container, self.domain, next.cell_size_factor);
            for p in owned {
                fresh.add(p)?;
            }
            for p in halo {
                fresh.add_halo(p)?;
            }
            self.container = fresh;
            self.steps_since_rebuild = self.rebuild_frequency;
        }
        self.current_config = next;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::functors::counting::PairCountFunctor;
    use crate::traits::particle::PointMass;
    use crate::utils::fixtures::particles_fixture;

    fn engine(kinds: Vec<ContainerKind>) -> AutoPair<PointMass> {
        let mut ap = AutoPair::builder()
            .box_min([0.0; 3])
            .box_max([10.0; 3])
            .cutoff(1.0)
            .verlet_skin(0.2)
            .num_samples(2)
            .tuning_interval(10)
            .allowed_containers(kinds)
            .build()
            .unwrap();
        for p in particles_fixture(200, 0.0, 10.0, 5) {
            ap.add_particle(p).unwrap();
        }
        ap
    }

    #[test]
    fn test_builder_rejects_bad_geometry() {
        assert!(AutoPair::<PointMass>::builder()
            .box_min([0.0; 3])
            .box_max([0.0; 3])
            .build()
            .is_err());
        assert!(AutoPair::<PointMass>::builder().cutoff(-1.0).build().is_err());
    }

    #[test]
    fn test_builder_rejects_empty_search_space() {
        let result = AutoPair::<PointMass>::builder()
            .allowed_containers(vec![ContainerKind::DirectSum])
            .allowed_traversals(vec![TraversalKind::C08])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_tuning_phase_terminates_and_commits() {
        let mut ap = engine(vec![ContainerKind::DirectSum, ContainerKind::LinkedCells]);
        let functor = PairCountFunctor::new(1.0);
        let mut tuning_iterations = 0;
        let mut finished = false;
        for _ in 0..200 {
            let was_tuning = ap.iterate_pairwise(&functor).unwrap();
            if was_tuning {
                tuning_iterations += 1;
            } else {
                finished = true;
                break;
            }
        }
        assert!(finished, "tuning never converged");
        assert!(tuning_iterations > 0);
        assert!(ap.current_configuration().is_valid());
    }

    #[test]
    fn test_particle_count_survives_container_switches() {
        let mut ap = engine(ContainerKind::ALL.to_vec());
        let functor = PairCountFunctor::new(1.0);
        for _ in 0..120 {
            ap.iterate_pairwise(&functor).unwrap();
        }
        assert_eq!(ap.num_particles(IteratorBehavior::Owned), 200);
    }

    #[test]
    fn test_reduce_sums_ids() {
        let ap = engine(vec![ContainerKind::LinkedCells]);
        let sum = ap.reduce(IteratorBehavior::Owned, 0u64, |acc, p| acc + p.id);
        assert_eq!(sum, (0..200).sum::<u64>());
    }
}
