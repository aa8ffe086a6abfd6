//! A wrapping kernel that measures the hit rate of an inner kernel.

use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView, SoaView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Particle, ParticleAttr};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Forwards every delivery to an inner kernel while counting distance checks
/// and within-cutoff hits. The ratio estimates how much work a traversal
/// wastes on pairs beyond the cutoff.
#[derive(Debug)]
pub struct FlopCounterFunctor<P, F> {
    inner: F,
    cutoff_squared: f64,
    distance_checks: AtomicUsize,
    kernel_calls: AtomicUsize,
    _particle: PhantomData<P>,
}

impl<P: Particle, F: PairwiseFunctor<P>> FlopCounterFunctor<P, F> {
    /// Wrap `inner`.
    pub fn new(inner: F) -> Self {
        let cutoff = inner.cutoff();
        Self {
            inner,
            cutoff_squared: cutoff * cutoff,
            distance_checks: AtomicUsize::new(0),
            kernel_calls: AtomicUsize::new(0),
            _particle: PhantomData,
        }
    }

    /// Number of delivered candidate pairs.
    pub fn distance_checks(&self) -> usize {
        self.distance_checks.load(Ordering::Relaxed)
    }

    /// Number of candidate pairs within the cutoff.
    pub fn kernel_calls(&self) -> usize {
        self.kernel_calls.load(Ordering::Relaxed)
    }

    /// Fraction of candidate pairs that were within the cutoff.
    pub fn hit_rate(&self) -> f64 {
        let checks = self.distance_checks();
        if checks == 0 {
            0.0
        } else {
            self.kernel_calls() as f64 / checks as f64
        }
    }

    fn record(&self, dist_squared: f64) {
        self.distance_checks.fetch_add(1, Ordering::Relaxed);
        if dist_squared <= self.cutoff_squared {
            self.kernel_calls.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<P: Particle, F: PairwiseFunctor<P>> PairwiseFunctor<P> for FlopCounterFunctor<P, F> {
    fn cutoff(&self) -> f64 {
        self.inner.cutoff()
    }

    fn aos_pair(&self, i: &mut P, j: &mut P, newton3: bool) {
        if !i.is_dummy() && !j.is_dummy() {
            self.record(crate::utils::math::dist_sq(i.position(), j.position()));
        }
        self.inner.aos_pair(i, j, newton3);
    }

    fn soa_pair_self(&self, view: SoaView<'_>, newton3: bool) {
        for i in 0..view.len() {
            for j in (i + 1)..view.len() {
                let dr = [
                    view.x[i] - view.x[j],
                    view.y[i] - view.y[j],
                    view.z[i] - view.z[j],
                ];
                self.record(dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]);
            }
        }
        self.inner.soa_pair_self(view, newton3);
    }

    fn soa_pair_cross(&self, view_i: SoaView<'_>, view_j: SoaView<'_>, newton3: bool) {
        for i in 0..view_i.len() {
            for j in 0..view_j.len() {
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                self.record(dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]);
            }
        }
        self.inner.soa_pair_cross(view_i, view_j, newton3);
    }

    fn soa_pair_one_way(&self, view_i: SoaView<'_>, view_j: SoaReadView<'_>) {
        for i in 0..view_i.len() {
            for j in 0..view_j.len() {
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                self.record(dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]);
            }
        }
        self.inner.soa_pair_one_way(view_i, view_j);
    }

    fn soa_verlet(&self, buf: &mut SoaBuffer, index: usize, neighbors: &[usize], newton3: bool) {
        for &j in neighbors {
            let dr = [
                buf.x[index] - buf.x[j],
                buf.y[index] - buf.y[j],
                buf.z[index] - buf.z[j],
            ];
            self.record(dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]);
        }
        self.inner.soa_verlet(buf, index, neighbors, newton3);
    }

    fn soa_verlet_row(
        &self,
        force: SoaForceRow<'_>,
        read: SoaReadView<'_>,
        index: usize,
        neighbors: &[usize],
    ) {
        for &j in neighbors {
            let dr = [
                read.x[index] - read.x[j],
                read.y[index] - read.y[j],
                read.z[index] - read.z[j],
            ];
            self.record(dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]);
        }
        self.inner.soa_verlet_row(force, read, index, neighbors);
    }

    fn allows_newton3(&self) -> bool {
        self.inner.allows_newton3()
    }

    fn allows_non_newton3(&self) -> bool {
        self.inner.allows_non_newton3()
    }

    fn is_relevant_for_tuning(&self) -> bool {
        false
    }

    fn needed_attributes(&self) -> &'static [ParticleAttr] {
        self.inner.needed_attributes()
    }

    fn computed_attributes(&self) -> &'static [ParticleAttr] {
        self.inner.computed_attributes()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::functors::lj::LjFunctor;
    use crate::traits::particle::PointMass;

    #[test]
    fn test_counts_checks_and_hits() {
        let counter = FlopCounterFunctor::new(LjFunctor::new(1.0, 1.0, 1.0));
        let mut a = PointMass::new([0.0; 3], [0.0; 3], 0);
        let mut b = PointMass::new([0.5, 0.0, 0.0], [0.0; 3], 1);
        let mut c = PointMass::new([5.0, 0.0, 0.0], [0.0; 3], 2);
        counter.aos_pair(&mut a, &mut b, true);
        counter.aos_pair(&mut a, &mut c, true);
        assert_eq!(counter.distance_checks(), 2);
        assert_eq!(counter.kernel_calls(), 1);
        assert!((counter.hit_rate() - 0.5).abs() < 1e-15);
        // the inner kernel still ran
        assert!(a.f[0] != 0.0);
    }
}
