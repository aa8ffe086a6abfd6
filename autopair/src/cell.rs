//! The owned-storage particle cell.

use crate::soa::SoaBuffer;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::utils::math::in_box;

/// A bounded collection of particles plus an attached columnar buffer.
///
/// The cell owns its particles (copied on insert). Dummy particles are kept
/// in place to pad fixed-width structures; iteration skips them unless the
/// caller asks for everything. While the attached buffer is live the
/// array-of-structures contents are stale for the functor's computed
/// attributes until [`extract_soa`](ParticleCell::extract_soa) runs.
#[derive(Debug, Clone, Default)]
pub struct ParticleCell<P> {
    particles: Vec<P>,
    /// Columnar buffer for the structure-of-arrays layout.
    pub soa: SoaBuffer,
}

impl<P: Particle> ParticleCell<P> {
    /// Fresh empty cell.
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            soa: SoaBuffer::default(),
        }
    }

    /// Append a particle.
    pub fn add(&mut self, p: P) {
        self.particles.push(p);
    }

    /// Total number of stored particles, dummies included.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Number of non-dummy particles.
    pub fn active_len(&self) -> usize {
        self.particles.iter().filter(|p| !p.is_dummy()).count()
    }

    /// Whether the cell holds no particles at all.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// All stored particles in insertion order, dummies included.
    pub fn particles(&self) -> &[P] {
        &self.particles
    }

    /// Mutable access to all stored particles.
    pub fn particles_mut(&mut self) -> &mut [P] {
        &mut self.particles
    }

    /// Ordered iteration over the non-dummy particles.
    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.particles.iter().filter(|p| !p.is_dummy())
    }

    /// Ordered mutable iteration over the non-dummy particles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.particles.iter_mut().filter(|p| !p.is_dummy())
    }

    /// Remove every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Compact away dummy particles.
    pub fn purge_dummies(&mut self) {
        self.particles.retain(|p| !p.is_dummy());
    }

    /// Stable sort of the particles by coordinate `axis` ascending.
    /// Membership is unchanged.
    pub fn sort_by_axis(&mut self, axis: usize) {
        self.particles.sort_by(|a, b| {
            a.position()[axis]
                .partial_cmp(&b.position()[axis])
                .expect("particle positions must not be NaN")
        });
    }

    /// Remove and return every non-dummy particle whose position left the
    /// half-open box `[lo, hi)`; dummies are dropped.
    pub fn take_leavers(&mut self, lo: [f64; 3], hi: [f64; 3]) -> Vec<P> {
        let mut leavers = Vec::new();
        let mut kept = Vec::with_capacity(self.particles.len());
        for p in self.particles.drain(..) {
            if p.is_dummy() {
                continue;
            }
            if in_box(p.position(), lo, hi) {
                kept.push(p);
            } else {
                leavers.push(p);
            }
        }
        self.particles = kept;
        leavers
    }

    /// Gather the functor's needed attributes into the attached buffer.
    pub fn load_soa<F: PairwiseFunctor<P>>(&mut self, functor: &F) {
        self.soa.load(&self.particles, functor.needed_attributes());
    }

    /// Scatter the functor's computed attributes back into the particles.
    pub fn extract_soa<F: PairwiseFunctor<P>>(&mut self, functor: &F) {
        self.soa
            .extract(&mut self.particles, functor.computed_attributes());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::{Ownership, PointMass};

    #[test]
    fn test_active_len_skips_dummies() {
        let mut cell = ParticleCell::new();
        cell.add(PointMass::new([0.0; 3], [0.0; 3], 0));
        let mut dummy = PointMass::new([f64::MAX; 3], [0.0; 3], 1);
        dummy.set_ownership(Ownership::Dummy);
        cell.add(dummy);
        assert_eq!(cell.len(), 2);
        assert_eq!(cell.active_len(), 1);
        assert_eq!(cell.iter().count(), 1);
        cell.purge_dummies();
        assert_eq!(cell.len(), 1);
    }

    #[test]
    fn test_sort_by_axis_is_stable_on_membership() {
        let mut cell = ParticleCell::new();
        for (i, z) in [3.0, 1.0, 2.0].iter().enumerate() {
            cell.add(PointMass::new([0.0, 0.0, *z], [0.0; 3], i as u64));
        }
        cell.sort_by_axis(2);
        let zs: Vec<f64> = cell.iter().map(|p| p.position()[2]).collect();
        assert_eq!(zs, vec![1.0, 2.0, 3.0]);
        assert_eq!(cell.len(), 3);
    }

    #[test]
    fn test_take_leavers_partitions() {
        let mut cell = ParticleCell::new();
        cell.add(PointMass::new([0.5, 0.5, 0.5], [0.0; 3], 0));
        cell.add(PointMass::new([1.5, 0.5, 0.5], [0.0; 3], 1));
        let leavers = cell.take_leavers([0.0; 3], [1.0; 3]);
        assert_eq!(leavers.len(), 1);
        assert_eq!(leavers[0].id, 1);
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.particles()[0].id, 0);
    }
}
