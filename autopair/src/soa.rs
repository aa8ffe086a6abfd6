//! Columnar particle storage for the structure-of-arrays layout.
//!
//! A [`SoaBuffer`] is attached to every cell. Functors declare the attributes
//! they read and write through
//! [`needed_attributes`](crate::traits::functor::PairwiseFunctor::needed_attributes)
//! and
//! [`computed_attributes`](crate::traits::functor::PairwiseFunctor::computed_attributes);
//! [`SoaBuffer::load`] gathers exactly the needed columns from the particles
//! and [`SoaBuffer::extract`] scatters exactly the computed columns back.
//! Loading followed by extracting with the same functor is therefore the
//! identity on every attribute the functor does not compute.

use crate::traits::particle::{Ownership, Particle, ParticleAttr};
use std::ops::Range;

/// Columnar buffer holding one column per particle attribute.
///
/// While a buffer is live (between load and extract) the array-of-structures
/// contents of the owning cell are considered stale for the computed
/// attributes.
#[derive(Debug, Default, Clone)]
pub struct SoaBuffer {
    /// x positions.
    pub x: Vec<f64>,
    /// y positions.
    pub y: Vec<f64>,
    /// z positions.
    pub z: Vec<f64>,
    /// x velocities.
    pub vx: Vec<f64>,
    /// y velocities.
    pub vy: Vec<f64>,
    /// z velocities.
    pub vz: Vec<f64>,
    /// x forces.
    pub fx: Vec<f64>,
    /// y forces.
    pub fy: Vec<f64>,
    /// z forces.
    pub fz: Vec<f64>,
    /// Particle ids.
    pub id: Vec<u64>,
    /// Type ids.
    pub type_id: Vec<usize>,
    /// Ownership tags.
    pub ownership: Vec<Ownership>,
}

/// Mutable view over a contiguous index range of a [`SoaBuffer`].
///
/// Positions and identity columns are read-only, force columns are writable;
/// this is the shape pair kernels consume.
pub struct SoaView<'a> {
    /// x positions.
    pub x: &'a [f64],
    /// y positions.
    pub y: &'a [f64],
    /// z positions.
    pub z: &'a [f64],
    /// x forces.
    pub fx: &'a mut [f64],
    /// y forces.
    pub fy: &'a mut [f64],
    /// z forces.
    pub fz: &'a mut [f64],
    /// Type ids.
    pub type_id: &'a [usize],
    /// Ownership tags.
    pub ownership: &'a [Ownership],
}

impl SoaView<'_> {
    /// Number of particles in the view.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Read-only view over a contiguous index range of a [`SoaBuffer`].
///
/// Concurrent tasks may share read views freely: they carry no force
/// columns, so handing one to a kernel cannot alias another task's force
/// accumulators.
#[derive(Clone, Copy)]
pub struct SoaReadView<'a> {
    /// x positions.
    pub x: &'a [f64],
    /// y positions.
    pub y: &'a [f64],
    /// z positions.
    pub z: &'a [f64],
    /// Type ids.
    pub type_id: &'a [usize],
    /// Ownership tags.
    pub ownership: &'a [Ownership],
}

impl<'a> SoaReadView<'a> {
    /// Number of particles in the view.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Sub-view over `range`.
    pub fn slice(&self, range: Range<usize>) -> SoaReadView<'a> {
        SoaReadView {
            x: &self.x[range.clone()],
            y: &self.y[range.clone()],
            z: &self.z[range.clone()],
            type_id: &self.type_id[range.clone()],
            ownership: &self.ownership[range],
        }
    }
}

/// Mutable force accumulator of a single buffer row.
///
/// The row-parallel neighbor-list pass hands every task exactly one of
/// these; the accumulators of different rows never overlap.
pub struct SoaForceRow<'a> {
    /// x force of the row.
    pub fx: &'a mut f64,
    /// y force of the row.
    pub fy: &'a mut f64,
    /// z force of the row.
    pub fz: &'a mut f64,
}

impl SoaBuffer {
    /// Number of particles currently loaded.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Drop all loaded data.
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.vx.clear();
        self.vy.clear();
        self.vz.clear();
        self.fx.clear();
        self.fy.clear();
        self.fz.clear();
        self.id.clear();
        self.type_id.clear();
        self.ownership.clear();
    }

    fn resize(&mut self, n: usize) {
        self.x.resize(n, 0.0);
        self.y.resize(n, 0.0);
        self.z.resize(n, 0.0);
        self.vx.resize(n, 0.0);
        self.vy.resize(n, 0.0);
        self.vz.resize(n, 0.0);
        self.fx.resize(n, 0.0);
        self.fy.resize(n, 0.0);
        self.fz.resize(n, 0.0);
        self.id.resize(n, 0);
        self.type_id.resize(n, 0);
        self.ownership.resize(n, Ownership::Dummy);
    }

    /// Gather the functor's needed attributes from `particles`.
    ///
    /// Columns of attributes not listed in `needed` are resized but keep
    /// their zero/default fill.
    pub fn load<P: Particle>(&mut self, particles: &[P], needed: &[ParticleAttr]) {
        self.clear();
        self.resize(particles.len());
        for attr in needed {
            match attr {
                ParticleAttr::Position => {
                    for (i, p) in particles.iter().enumerate() {
                        let [x, y, z] = p.position();
                        self.x[i] = x;
                        self.y[i] = y;
                        self.z[i] = z;
                    }
                }
                ParticleAttr::Velocity => {
                    for (i, p) in particles.iter().enumerate() {
                        let [vx, vy, vz] = p.velocity();
                        self.vx[i] = vx;
                        self.vy[i] = vy;
                        self.vz[i] = vz;
                    }
                }
                ParticleAttr::Force => {
                    for (i, p) in particles.iter().enumerate() {
                        let [fx, fy, fz] = p.force();
                        self.fx[i] = fx;
                        self.fy[i] = fy;
                        self.fz[i] = fz;
                    }
                }
                ParticleAttr::Id => {
                    for (i, p) in particles.iter().enumerate() {
                        self.id[i] = p.id();
                    }
                }
                ParticleAttr::TypeId => {
                    for (i, p) in particles.iter().enumerate() {
                        self.type_id[i] = p.type_id();
                    }
                }
                ParticleAttr::Ownership => {
                    for (i, p) in particles.iter().enumerate() {
                        self.ownership[i] = p.ownership();
                    }
                }
            }
        }
    }

    /// Scatter the functor's computed attributes back into `particles`.
    ///
    /// # Panics
    /// Panics if the buffer was loaded from a different number of particles.
    pub fn extract<P: Particle>(&self, particles: &mut [P], computed: &[ParticleAttr]) {
        assert_eq!(
            self.len(),
            particles.len(),
            "buffer was loaded from {} particles but extracts into {}",
            self.len(),
            particles.len()
        );
        for attr in computed {
            match attr {
                ParticleAttr::Position => {
                    for (i, p) in particles.iter_mut().enumerate() {
                        p.set_position([self.x[i], self.y[i], self.z[i]]);
                    }
                }
                ParticleAttr::Velocity => {
                    for (i, p) in particles.iter_mut().enumerate() {
                        p.set_velocity([self.vx[i], self.vy[i], self.vz[i]]);
                    }
                }
                ParticleAttr::Force => {
                    for (i, p) in particles.iter_mut().enumerate() {
                        p.set_force([self.fx[i], self.fy[i], self.fz[i]]);
                    }
                }
                ParticleAttr::Id => {
                    for (i, p) in particles.iter_mut().enumerate() {
                        p.set_id(self.id[i]);
                    }
                }
                ParticleAttr::TypeId | ParticleAttr::Ownership => {
                    // identity-only attributes, never computed by kernels
                }
            }
        }
    }

    /// Read-only view over the whole buffer.
    pub fn read_view(&self) -> SoaReadView<'_> {
        SoaReadView {
            x: &self.x,
            y: &self.y,
            z: &self.z,
            type_id: &self.type_id,
            ownership: &self.ownership,
        }
    }

    /// Mutable view over the whole buffer.
    pub fn view_mut(&mut self) -> SoaView<'_> {
        let n = self.len();
        self.range_view_mut(0..n)
    }

    /// Mutable view over `range`.
    pub fn range_view_mut(&mut self, range: Range<usize>) -> SoaView<'_> {
        SoaView {
            x: &self.x[range.clone()],
            y: &self.y[range.clone()],
            z: &self.z[range.clone()],
            fx: &mut self.fx[range.clone()],
            fy: &mut self.fy[range.clone()],
            fz: &mut self.fz[range.clone()],
            type_id: &self.type_id[range.clone()],
            ownership: &self.ownership[range],
        }
    }

    /// Two disjoint mutable views over `first` and `second`.
    ///
    /// # Panics
    /// Panics unless `first.end <= second.start`.
    pub fn pair_views_mut(
        &mut self,
        first: Range<usize>,
        second: Range<usize>,
    ) -> (SoaView<'_>, SoaView<'_>) {
        assert!(
            first.end <= second.start,
            "ranges {:?} and {:?} must be disjoint and ordered",
            first,
            second
        );
        let (fx_a, fx_rest) = self.fx.split_at_mut(second.start);
        let (fy_a, fy_rest) = self.fy.split_at_mut(second.start);
        let (fz_a, fz_rest) = self.fz.split_at_mut(second.start);
        let second_local = 0..(second.end - second.start);
        let a = SoaView {
            x: &self.x[first.clone()],
            y: &self.y[first.clone()],
            z: &self.z[first.clone()],
            fx: &mut fx_a[first.clone()],
            fy: &mut fy_a[first.clone()],
            fz: &mut fz_a[first.clone()],
            type_id: &self.type_id[first.clone()],
            ownership: &self.ownership[first],
        };
        let b = SoaView {
            x: &self.x[second.clone()],
            y: &self.y[second.clone()],
            z: &self.z[second.clone()],
            fx: &mut fx_rest[second_local.clone()],
            fy: &mut fy_rest[second_local.clone()],
            fz: &mut fz_rest[second_local],
            type_id: &self.type_id[second.clone()],
            ownership: &self.ownership[second],
        };
        (a, b)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::PointMass;

    fn particles(n: usize) -> Vec<PointMass> {
        (0..n)
            .map(|i| {
                let mut p = PointMass::new(
                    [i as f64, 2.0 * i as f64, 3.0 * i as f64],
                    [0.1, 0.2, 0.3],
                    i as u64,
                );
                p.set_force([1.0, 1.0, 1.0]);
                p
            })
            .collect()
    }

    #[test]
    fn test_load_extract_is_identity_on_uncomputed_attributes() {
        let mut ps = particles(5);
        let before = ps.clone();
        let mut buf = SoaBuffer::default();
        buf.load(
            &ps,
            &[
                ParticleAttr::Position,
                ParticleAttr::Force,
                ParticleAttr::Ownership,
            ],
        );
        // kernel writes forces only
        for f in buf.fx.iter_mut() {
            *f += 2.0;
        }
        buf.extract(&mut ps, &[ParticleAttr::Force]);
        for (p, q) in ps.iter().zip(before.iter()) {
            assert_eq!(p.position(), q.position());
            assert_eq!(p.velocity(), q.velocity());
            assert_eq!(p.id(), q.id());
            assert_eq!(p.force(), [q.force()[0] + 2.0, q.force()[1], q.force()[2]]);
        }
    }

    #[test]
    fn test_pair_views_are_disjoint() {
        let ps = particles(8);
        let mut buf = SoaBuffer::default();
        buf.load(&ps, &[ParticleAttr::Position, ParticleAttr::Force]);
        let (mut a, mut b) = buf.pair_views_mut(0..4, 4..8);
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 4);
        a.fx[0] = 42.0;
        b.fx[3] = -42.0;
        assert_eq!(buf.fx[0], 42.0);
        assert_eq!(buf.fx[7], -42.0);
    }
}
