//! The pair-interaction kernel capability.

use crate::options::DataLayout;
use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView, SoaView};
use crate::traits::particle::{Particle, ParticleAttr};

/// Contract a user kernel must expose to the engine.
///
/// The engine calls exactly one of the kernel paths per scheduled task,
/// depending on the active data layout and container:
///
/// * [`aos_pair`](PairwiseFunctor::aos_pair) for array-of-structures pairs,
/// * [`soa_pair_self`](PairwiseFunctor::soa_pair_self) /
///   [`soa_pair_cross`](PairwiseFunctor::soa_pair_cross) for columnar cell
///   tasks,
/// * [`soa_verlet`](PairwiseFunctor::soa_verlet) for neighbor-list driven
///   iteration,
/// * [`soa_pair_one_way`](PairwiseFunctor::soa_pair_one_way) and
///   [`soa_verlet_row`](PairwiseFunctor::soa_verlet_row) for the
///   Newton-3-off parallel passes, where the kernel writes only the rows the
///   calling task owns and reads everything else through shared views.
///
/// The cutoff check is the kernel's responsibility: the engine delivers
/// candidate pairs, the kernel returns without effect beyond its cutoff.
///
/// # Newton-3 contract
///
/// With `newton3 == true` each unordered pair is delivered exactly once and
/// the kernel updates both partners. With `newton3 == false` the kernel
/// updates only the first partner (`i`, the first buffer, or the indexed
/// row); the engine delivers the mirrored pair through a separate call.
///
/// Implementations must be safe to call concurrently on tasks with disjoint
/// write sets; kernels that keep mutable shared state (e.g. global
/// accumulators) must guard it themselves.
pub trait PairwiseFunctor<P: Particle>: Send + Sync {
    /// Interaction cutoff; pairs beyond it have no effect.
    fn cutoff(&self) -> f64;

    /// Kernel for one particle pair in the array-of-structures layout.
    fn aos_pair(&self, i: &mut P, j: &mut P, newton3: bool);

    /// Kernel over all unique pairs inside one buffer view.
    fn soa_pair_self(&self, view: SoaView<'_>, newton3: bool);

    /// Kernel over all pairs between two disjoint buffer views.
    ///
    /// With `newton3 == false` only `view_i` is written.
    fn soa_pair_cross(&self, view_i: SoaView<'_>, view_j: SoaView<'_>, newton3: bool);

    /// Kernel over all pairs between a written view and a read-only view;
    /// the Newton-3-off form of
    /// [`soa_pair_cross`](PairwiseFunctor::soa_pair_cross) used when the
    /// second view's rows belong to a concurrently running task. Only
    /// `view_i` is written.
    fn soa_pair_one_way(&self, view_i: SoaView<'_>, view_j: SoaReadView<'_>);

    /// Kernel for the particle at `index` against `neighbors`, all rows of
    /// the same buffer.
    ///
    /// With `newton3 == false` only row `index` is written.
    fn soa_verlet(&self, buf: &mut SoaBuffer, index: usize, neighbors: &[usize], newton3: bool);

    /// Kernel for row `index` of `read` against `neighbors`, accumulating
    /// only into `force`, the force entries of that row.
    ///
    /// The Newton-3-off, row-parallel form of
    /// [`soa_verlet`](PairwiseFunctor::soa_verlet): concurrent tasks hold
    /// disjoint force rows while the read columns are shared.
    fn soa_verlet_row(
        &self,
        force: SoaForceRow<'_>,
        read: SoaReadView<'_>,
        index: usize,
        neighbors: &[usize],
    );

    /// Whether the kernel supports the Newton-3 pair delivery.
    fn allows_newton3(&self) -> bool;

    /// Whether the kernel supports the non-Newton-3 pair delivery.
    fn allows_non_newton3(&self) -> bool;

    /// Whether samples measured with this kernel should feed the tuner.
    /// Diagnostic kernels return `false`.
    fn is_relevant_for_tuning(&self) -> bool {
        true
    }

    /// Whether the kernel can run on clusters of `cluster_size` particles in
    /// the given layout.
    fn is_appropriate_cluster_size(&self, cluster_size: usize, _layout: DataLayout) -> bool {
        cluster_size > 0
    }

    /// Attributes the kernel reads; the loader gathers exactly these.
    fn needed_attributes(&self) -> &'static [ParticleAttr];

    /// Attributes the kernel writes; the extractor scatters exactly these.
    fn computed_attributes(&self) -> &'static [ParticleAttr];
}
