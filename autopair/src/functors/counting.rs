//! A kernel that counts its deliveries, for traversal coverage tests.

use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView, SoaView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Particle, ParticleAttr};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts every pair delivery within the cutoff.
///
/// With Newton-3 each unordered pair counts once; without, each ordered
/// delivery counts, so totals double.
#[derive(Debug, Default)]
pub struct PairCountFunctor {
    cutoff: f64,
    cutoff_squared: f64,
    count: AtomicUsize,
}

impl PairCountFunctor {
    /// Counter with the given cutoff.
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff,
            cutoff_squared: cutoff * cutoff,
            count: AtomicUsize::new(0),
        }
    }

    /// Deliveries counted so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    fn within(&self, dr: [f64; 3]) -> bool {
        dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2] <= self.cutoff_squared
    }
}

impl<P: Particle> PairwiseFunctor<P> for PairCountFunctor {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn aos_pair(&self, i: &mut P, j: &mut P, _newton3: bool) {
        if i.is_dummy() || j.is_dummy() {
            return;
        }
        let a = i.position();
        let b = j.position();
        if self.within([a[0] - b[0], a[1] - b[1], a[2] - b[2]]) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn soa_pair_self(&self, view: SoaView<'_>, newton3: bool) {
        let per_pair = if newton3 { 1 } else { 2 };
        for i in 0..view.len() {
            for j in (i + 1)..view.len() {
                let dr = [
                    view.x[i] - view.x[j],
                    view.y[i] - view.y[j],
                    view.z[i] - view.z[j],
                ];
                if self.within(dr) {
                    self.count.fetch_add(per_pair, Ordering::Relaxed);
                }
            }
        }
    }

    fn soa_pair_cross(&self, view_i: SoaView<'_>, view_j: SoaView<'_>, _newton3: bool) {
        for i in 0..view_i.len() {
            for j in 0..view_j.len() {
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                if self.within(dr) {
                    self.count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn soa_pair_one_way(&self, view_i: SoaView<'_>, view_j: SoaReadView<'_>) {
        for i in 0..view_i.len() {
            for j in 0..view_j.len() {
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                if self.within(dr) {
                    self.count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn soa_verlet(&self, buf: &mut SoaBuffer, index: usize, neighbors: &[usize], _newton3: bool) {
        for &j in neighbors {
            let dr = [
                buf.x[index] - buf.x[j],
                buf.y[index] - buf.y[j],
                buf.z[index] - buf.z[j],
            ];
            if self.within(dr) {
                self.count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn soa_verlet_row(
        &self,
        _force: SoaForceRow<'_>,
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
            if self.within(dr) {
                self.count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn allows_newton3(&self) -> bool {
        true
    }

    fn allows_non_newton3(&self) -> bool {
        true
    }

    fn needed_attributes(&self) -> &'static [ParticleAttr] {
        &[ParticleAttr::Position, ParticleAttr::Ownership]
    }

    fn computed_attributes(&self) -> &'static [ParticleAttr] {
        &[]
    }
}
