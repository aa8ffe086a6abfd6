//! A kernel without any effect, used to drive container state transitions in
//! tests.

use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView, SoaView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Particle, ParticleAttr};

/// No-op functor; accepts both Newton-3 modes and touches nothing.
#[derive(Debug, Default, Clone)]
pub struct EmptyFunctor {
    cutoff: f64,
}

impl EmptyFunctor {
    /// No-op functor with the given cutoff.
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }
}

impl<P: Particle> PairwiseFunctor<P> for EmptyFunctor {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn aos_pair(&self, _i: &mut P, _j: &mut P, _newton3: bool) {}

    fn soa_pair_self(&self, _view: SoaView<'_>, _newton3: bool) {}

    fn soa_pair_cross(&self, _view_i: SoaView<'_>, _view_j: SoaView<'_>, _newton3: bool) {}

    fn soa_pair_one_way(&self, _view_i: SoaView<'_>, _view_j: SoaReadView<'_>) {}

    fn soa_verlet(&self, _buf: &mut SoaBuffer, _index: usize, _neighbors: &[usize], _newton3: bool) {
    }

    fn soa_verlet_row(
        &self,
        _force: SoaForceRow<'_>,
        _read: SoaReadView<'_>,
        _index: usize,
        _neighbors: &[usize],
    ) {
    }

    fn allows_newton3(&self) -> bool {
        true
    }

    fn allows_non_newton3(&self) -> bool {
        true
    }

    fn is_relevant_for_tuning(&self) -> bool {
        false
    }

    fn needed_attributes(&self) -> &'static [ParticleAttr] {
        &[]
    }

    fn computed_attributes(&self) -> &'static [ParticleAttr] {
        &[]
    }
}
