//! A container storing all particles in a single owned cell.

use crate::cell::ParticleCell;
use crate::containers::{
    halo_inside_box_msg, owned_outside_box_msg, unsupported_traversal_msg, DomainInfo,
    PairwiseSpec, ParticleContainer,
};
use crate::iterators::in_region;
use crate::options::{ContainerKind, DataLayout, IteratorBehavior, TraversalKind};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Ownership, Particle};
use crate::traits::types::{AutoPairError, Result};
use crate::traversals::cell_functor::CellFunctor;
use crate::traversals::direct;
use crate::utils::math::in_box;

/// Interactions are evaluated directly between all particle pairs, O(N²).
///
/// Use only for small particle counts; serves as the correctness baseline of
/// the test suite.
#[derive(Debug)]
pub struct DirectSum<P> {
    domain: DomainInfo,
    owned: ParticleCell<P>,
    halo: ParticleCell<P>,
}

impl<P: Particle> DirectSum<P> {
    /// Fresh container over the given domain.
    pub fn new(domain: DomainInfo) -> Self {
        Self {
            domain,
            owned: ParticleCell::new(),
            halo: ParticleCell::new(),
        }
    }

    fn cell_for(&self, behavior: IteratorBehavior) -> Vec<&ParticleCell<P>> {
        match behavior {
            IteratorBehavior::Owned => vec![&self.owned],
            IteratorBehavior::Halo => vec![&self.halo],
            _ => vec![&self.owned, &self.halo],
        }
    }
}

impl<P: Particle> ParticleContainer<P> for DirectSum<P> {
    fn domain(&self) -> &DomainInfo {
        &self.domain
    }

    fn add(&mut self, p: P) -> Result<()> {
        if !in_box(p.position(), self.domain.box_min, self.domain.box_max) {
            return Err(AutoPairError::InvariantViolation(owned_outside_box_msg(
                &p,
                &self.domain,
            )));
        }
        self.owned.add(p);
        Ok(())
    }

    fn add_halo(&mut self, p: P) -> Result<()> {
        if in_box(p.position(), self.domain.box_min, self.domain.box_max) {
            return Err(AutoPairError::InvariantViolation(halo_inside_box_msg(
                &p,
                &self.domain,
            )));
        }
        let mut p = p;
        p.set_ownership(Ownership::Halo);
        self.halo.add(p);
        Ok(())
    }

    fn update_halo(&mut self, p: P) -> bool {
        for stored in self.halo.iter_mut() {
            if stored.id() == p.id() {
                stored.set_position(p.position());
                stored.set_velocity(p.velocity());
                stored.set_force(p.force());
                return true;
            }
        }
        false
    }

    fn delete_halo(&mut self) {
        self.halo.clear();
    }

    fn update(&mut self) -> Vec<P> {
        self.delete_halo();
        self.owned
            .take_leavers(self.domain.box_min, self.domain.box_max)
    }

    fn is_update_needed(&self) -> bool {
        self.owned
            .iter()
            .any(|p| !in_box(p.position(), self.domain.box_min, self.domain.box_max))
    }

    fn rebuild_neighbor_lists(&mut self, _newton3: bool) {}

    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P)) {
        for cell in self.cell_for(behavior) {
            for p in cell.particles() {
                if behavior.contains(p) {
                    f(p);
                }
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P)) {
        for p in self
            .owned
            .particles_mut()
            .iter_mut()
            .chain(self.halo.particles_mut().iter_mut())
        {
            if behavior.contains(p) {
                f(p);
            }
        }
    }

    fn for_each_in_region(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&P),
    ) {
        self.for_each(behavior, &mut |p| {
            if in_region(p, lo, hi, behavior) {
                f(p);
            }
        });
    }

    fn for_each_in_region_mut(
        &mut self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&mut P),
    ) {
        self.for_each_mut(behavior, &mut |p| {
            if in_region(p, lo, hi, behavior) {
                f(p);
            }
        });
    }

    fn iterate_pairwise<F: PairwiseFunctor<P>>(
        &mut self,
        spec: &PairwiseSpec,
        functor: &F,
    ) -> Result<()> {
        if spec.traversal != TraversalKind::DirectSumTraversal {
            return Err(AutoPairError::InvalidConfiguration(
                unsupported_traversal_msg(ContainerKind::DirectSum, spec),
            ));
        }
        let cell_functor = CellFunctor::new(functor, spec.layout, spec.newton3);
        if spec.layout == DataLayout::Soa {
            self.owned.load_soa(functor);
            self.halo.load_soa(functor);
        }
        direct::traverse(&mut self.owned, &mut self.halo, &cell_functor);
        if spec.layout == DataLayout::Soa {
            self.owned.extract_soa(functor);
            self.halo.extract_soa(functor);
        }
        Ok(())
    }
}
