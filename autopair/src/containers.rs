//! Spatial particle containers behind one contract.

pub mod compatible;
pub mod direct_sum;
pub mod linked_cells;
pub mod reference_linked_cells;
pub mod selector;
pub mod verlet_cluster_lists;
pub mod verlet_lists;

use crate::options::{DataLayout, IteratorBehavior, LoadEstimatorKind, TraversalKind};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traits::types::Result;

/// Geometry every container is parameterized with.
#[derive(Debug, Clone, Copy)]
pub struct DomainInfo {
    /// Lower corner of the owned box.
    pub box_min: [f64; 3],
    /// Upper corner of the owned box.
    pub box_max: [f64; 3],
    /// Interaction cutoff.
    pub cutoff: f64,
    /// Verlet skin on top of the cutoff.
    pub skin: f64,
}

impl DomainInfo {
    /// Cutoff plus skin, the minimum cell side.
    pub fn interaction_length(&self) -> f64 {
        self.cutoff + self.skin
    }
}

/// One pairwise iteration request: which traversal, in which layout, with or
/// without Newton's third law.
#[derive(Debug, Clone, Copy)]
pub struct PairwiseSpec {
    /// The traversal to schedule.
    pub traversal: TraversalKind,
    /// The data layout to drive the functor with.
    pub layout: DataLayout,
    /// Whether to exploit Newton's third law.
    pub newton3: bool,
    /// Load estimator consulted by the balanced sliced traversal.
    pub load_estimator: LoadEstimatorKind,
}

impl PairwiseSpec {
    /// Spec with the default load estimator.
    pub fn new(traversal: TraversalKind, layout: DataLayout, newton3: bool) -> Self {
        Self {
            traversal,
            layout,
            newton3,
            load_estimator: LoadEstimatorKind::SquaredCellSize,
        }
    }
}

/// The common container contract.
///
/// Failure semantics: [`add`](ParticleContainer::add) of a position outside
/// the owned box and [`add_halo`](ParticleContainer::add_halo) of a position
/// inside it are invariant violations and fail with the particle id and
/// position. [`iterate_pairwise`](ParticleContainer::iterate_pairwise) with a
/// traversal the container does not support fails naming the configuration.
pub trait ParticleContainer<P: Particle> {
    /// The container's geometry.
    fn domain(&self) -> &DomainInfo;

    /// Add an owned particle. Its position must lie inside the box.
    fn add(&mut self, p: P) -> Result<()>;

    /// Add a halo particle. Its position must lie outside the box.
    fn add_halo(&mut self, p: P) -> Result<()>;

    /// Update the stored halo particle with the id of `p` to `p`'s state.
    /// Returns whether a matching halo particle was found; callers may
    /// [`add_halo`](ParticleContainer::add_halo) on `false`.
    fn update_halo(&mut self, p: P) -> bool;

    /// Remove every halo particle.
    fn delete_halo(&mut self);

    /// Repartition drifted particles. Returns every particle that left the
    /// owned box exactly once; halo particles are dropped.
    fn update(&mut self) -> Vec<P>;

    /// Whether the container's internal structure is stale (drifted
    /// particles, invalid neighbor lists).
    fn is_update_needed(&self) -> bool;

    /// Rebuild internal neighbor structures for the given Newton-3 mode.
    fn rebuild_neighbor_lists(&mut self, newton3: bool);

    /// Visit every particle matching `behavior`.
    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P));

    /// Mutably visit every particle matching `behavior`.
    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P));

    /// Visit every particle in the closed region `[lo, hi]` matching
    /// `behavior`.
    fn for_each_in_region(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&P),
    );

    /// Mutably visit every particle in the closed region `[lo, hi]` matching
    /// `behavior`.
    fn for_each_in_region_mut(
        &mut self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&mut P),
    );

    /// Deliver every particle pair within the cutoff to `functor`, following
    /// `spec`.
    fn iterate_pairwise<F: PairwiseFunctor<P>>(
        &mut self,
        spec: &PairwiseSpec,
        functor: &F,
    ) -> Result<()>;

    /// Number of particles matching `behavior`.
    fn num_particles(&self, behavior: IteratorBehavior) -> usize {
        let mut n = 0;
        self.for_each(behavior, &mut |_| n += 1);
        n
    }

    /// Snapshot of every particle matching `behavior`.
    fn collect_particles(&self, behavior: IteratorBehavior) -> Vec<P> {
        let mut out = Vec::new();
        self.for_each(behavior, &mut |p| out.push(p.clone()));
        out
    }
}

/// Message for an owned add outside the box.
pub(crate) fn owned_outside_box_msg<P: Particle>(p: &P, domain: &DomainInfo) -> String {
    format!(
        "particle {} at {:?} is outside the owned box [{:?}, {:?}) and cannot be added as owned",
        p.id(),
        p.position(),
        domain.box_min,
        domain.box_max
    )
}

/// Message for a halo add inside the box.
pub(crate) fn halo_inside_box_msg<P: Particle>(p: &P, domain: &DomainInfo) -> String {
    format!(
        "halo particle {} at {:?} lies inside the owned box [{:?}, {:?})",
        p.id(),
        p.position(),
        domain.box_min,
        domain.box_max
    )
}

/// Message for an unsupported traversal request.
pub(crate) fn unsupported_traversal_msg(
    container: crate::options::ContainerKind,
    spec: &PairwiseSpec,
) -> String {
    format!(
        "container {} cannot run (traversal: {}, layout: {}, newton3: {})",
        container,
        spec.traversal,
        spec.layout,
        if spec.newton3 { "on" } else { "off" }
    )
}
