//! Runtime selection between the container kinds.

use crate::containers::direct_sum::DirectSum;
use crate::containers::linked_cells::LinkedCells;
use crate::containers::reference_linked_cells::ReferenceLinkedCells;
use crate::containers::verlet_cluster_lists::VerletClusterLists;
use crate::containers::verlet_lists::VerletLists;
use crate::containers::{DomainInfo, PairwiseSpec, ParticleContainer};
use crate::options::{ContainerKind, IteratorBehavior};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traits::types::Result;

/// Tagged union over the five containers.
///
/// Configuration boundaries dispatch through a match; inside
/// [`iterate_pairwise`](AnyContainer::iterate_pairwise) the concrete
/// container and functor are monomorphized, so the hot loop pays a single
/// dispatch per iteration.
#[derive(Debug)]
pub enum AnyContainer<P> {
    /// One owned plus one halo cell.
    DirectSum(DirectSum<P>),
    /// Cells own their particles.
    LinkedCells(LinkedCells<P>),
    /// Cells reference a central vector.
    ReferenceLinkedCells(ReferenceLinkedCells<P>),
    /// Per-particle neighbor lists.
    VerletLists(VerletLists<P>),
    /// Fixed-width clusters in xy-towers.
    VerletClusterLists(VerletClusterLists<P>),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            AnyContainer::DirectSum($c) => $body,
            AnyContainer::LinkedCells($c) => $body,
            AnyContainer::ReferenceLinkedCells($c) => $body,
            AnyContainer::VerletLists($c) => $body,
            AnyContainer::VerletClusterLists($c) => $body,
        }
    };
}

impl<P: Particle> AnyContainer<P> {
    /// Materialize a container of the given kind.
    pub fn build(kind: ContainerKind, domain: DomainInfo, cell_size_factor: f64) -> Self {
        match kind {
            ContainerKind::DirectSum => AnyContainer::DirectSum(DirectSum::new(domain)),
            ContainerKind::LinkedCells => {
                AnyContainer::LinkedCells(LinkedCells::new(domain, cell_size_factor))
            }
            ContainerKind::ReferenceLinkedCells => AnyContainer::ReferenceLinkedCells(
                ReferenceLinkedCells::new(domain, cell_size_factor),
            ),
            ContainerKind::VerletLists => AnyContainer::VerletLists(VerletLists::new(domain)),
            ContainerKind::VerletClusterLists => {
                AnyContainer::VerletClusterLists(VerletClusterLists::new(domain))
            }
        }
    }

    /// The stored container's kind.
    pub fn kind(&self) -> ContainerKind {
        match self {
            AnyContainer::DirectSum(_) => ContainerKind::DirectSum,
            AnyContainer::LinkedCells(_) => ContainerKind::LinkedCells,
            AnyContainer::ReferenceLinkedCells(_) => ContainerKind::ReferenceLinkedCells,
            AnyContainer::VerletLists(_) => ContainerKind::VerletLists,
            AnyContainer::VerletClusterLists(_) => ContainerKind::VerletClusterLists,
        }
    }
}

impl<P: Particle> ParticleContainer<P> for AnyContainer<P> {
    fn domain(&self) -> &DomainInfo {
        dispatch!(self, c => c.domain())
    }

    fn add(&mut self, p: P) -> Result<()> {
        dispatch!(self, c => c.add(p))
    }

    fn add_halo(&mut self, p: P) -> Result<()> {
        dispatch!(self, c => c.add_halo(p))
    }

    fn update_halo(&mut self, p: P) -> bool {
        dispatch!(self, c => c.update_halo(p))
    }

    fn delete_halo(&mut self) {
        dispatch!(self, c => c.delete_halo())
    }

    fn update(&mut self) -> Vec<P> {
        dispatch!(self, c => c.update())
    }

    fn is_update_needed(&self) -> bool {
        dispatch!(self, c => c.is_update_needed())
    }

    fn rebuild_neighbor_lists(&mut self, newton3: bool) {
        dispatch!(self, c => c.rebuild_neighbor_lists(newton3))
    }

    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P)) {
        dispatch!(self, c => c.for_each(behavior, f))
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P)) {
        dispatch!(self, c => c.for_each_mut(behavior, f))
    }

    fn for_each_in_region(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&P),
    ) {
        dispatch!(self, c => c.for_each_in_region(lo, hi, behavior, f))
    }

    fn for_each_in_region_mut(
        &mut self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&mut P),
    ) {
        dispatch!(self, c => c.for_each_in_region_mut(lo, hi, behavior, f))
    }

    fn iterate_pairwise<F: PairwiseFunctor<P>>(
        &mut self,
        spec: &PairwiseSpec,
        functor: &F,
    ) -> Result<()> {
        dispatch!(self, c => c.iterate_pairwise(spec, functor))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::PointMass;

    #[test]
    fn test_build_matches_kind() {
        let domain = DomainInfo {
            box_min: [0.0; 3],
            box_max: [10.0; 3],
            cutoff: 1.0,
            skin: 0.2,
        };
        for kind in ContainerKind::ALL {
            let container = AnyContainer::<PointMass>::build(kind, domain, 1.0);
            assert_eq!(container.kind(), kind);
        }
    }
}
