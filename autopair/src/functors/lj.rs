//! A 12-6 Lennard-Jones pair kernel.

use crate::functors::properties::ParticlePropertiesLibrary;
use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView, SoaView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Ownership, Particle, ParticleAttr};
use crate::utils::math::{dist_sq, sub};

const NEEDED: &[ParticleAttr] = &[
    ParticleAttr::Position,
    ParticleAttr::Force,
    ParticleAttr::TypeId,
    ParticleAttr::Ownership,
];
const COMPUTED: &[ParticleAttr] = &[ParticleAttr::Force];

/// Lennard-Jones kernel with either uniform parameters or per-type mixing
/// through a [`ParticlePropertiesLibrary`].
///
/// The cutoff check happens inside the kernel; pairs beyond the cutoff and
/// pairs involving dummy particles have no effect.
#[derive(Debug, Clone)]
pub struct LjFunctor {
    cutoff: f64,
    cutoff_squared: f64,
    epsilon24: f64,
    sigma_squared: f64,
    properties: Option<ParticlePropertiesLibrary>,
}

impl LjFunctor {
    /// Kernel with uniform ε and σ for every pair.
    pub fn new(cutoff: f64, epsilon: f64, sigma: f64) -> Self {
        Self {
            cutoff,
            cutoff_squared: cutoff * cutoff,
            epsilon24: 24.0 * epsilon,
            sigma_squared: sigma * sigma,
            properties: None,
        }
    }

    /// Kernel with per-type parameters mixed by the library.
    pub fn with_properties(cutoff: f64, properties: ParticlePropertiesLibrary) -> Self {
        Self {
            cutoff,
            cutoff_squared: cutoff * cutoff,
            epsilon24: 0.0,
            sigma_squared: 0.0,
            properties: Some(properties),
        }
    }

    fn pair_parameters(&self, type_i: usize, type_j: usize) -> (f64, f64) {
        match &self.properties {
            Some(lib) => (
                lib.mixing_24_epsilon(type_i, type_j),
                lib.mixing_sigma_squared(type_i, type_j),
            ),
            None => (self.epsilon24, self.sigma_squared),
        }
    }

    /// Scalar force factor `f/r` for a pair at squared distance `dist2`.
    fn force_factor(&self, type_i: usize, type_j: usize, dist_squared: f64) -> f64 {
        let (epsilon24, sigma_squared) = self.pair_parameters(type_i, type_j);
        let inv_dist_squared = 1.0 / dist_squared;
        let lj6 = (sigma_squared * inv_dist_squared).powi(3);
        let lj12 = lj6 * lj6;
        epsilon24 * (lj12 + lj12 - lj6) * inv_dist_squared
    }
}

impl<P: Particle> PairwiseFunctor<P> for LjFunctor {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn aos_pair(&self, i: &mut P, j: &mut P, newton3: bool) {
        if i.is_dummy() || j.is_dummy() {
            return;
        }
        let dr = sub(i.position(), j.position());
        let dist_squared = dist_sq(i.position(), j.position());
        if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
            return;
        }
        let fac = self.force_factor(i.type_id(), j.type_id(), dist_squared);
        let f = [dr[0] * fac, dr[1] * fac, dr[2] * fac];
        i.add_force(f);
        if newton3 {
            j.add_force([-f[0], -f[1], -f[2]]);
        }
    }

    fn soa_pair_self(&self, mut view: SoaView<'_>, _newton3: bool) {
        // within one cell both partners belong to this task, so both sides
        // are accumulated regardless of the Newton-3 mode
        let n = view.len();
        for i in 0..n {
            if view.ownership[i] == Ownership::Dummy {
                continue;
            }
            let mut acc = [0.0f64; 3];
            for j in (i + 1)..n {
                if view.ownership[j] == Ownership::Dummy {
                    continue;
                }
                let dr = [
                    view.x[i] - view.x[j],
                    view.y[i] - view.y[j],
                    view.z[i] - view.z[j],
                ];
                let dist_squared = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
                if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
                    continue;
                }
                let fac = self.force_factor(view.type_id[i], view.type_id[j], dist_squared);
                acc[0] += dr[0] * fac;
                acc[1] += dr[1] * fac;
                acc[2] += dr[2] * fac;
                view.fx[j] -= dr[0] * fac;
                view.fy[j] -= dr[1] * fac;
                view.fz[j] -= dr[2] * fac;
            }
            view.fx[i] += acc[0];
            view.fy[i] += acc[1];
            view.fz[i] += acc[2];
        }
    }

    fn soa_pair_cross(&self, mut view_i: SoaView<'_>, mut view_j: SoaView<'_>, newton3: bool) {
        for i in 0..view_i.len() {
            if view_i.ownership[i] == Ownership::Dummy {
                continue;
            }
            let mut acc = [0.0f64; 3];
            for j in 0..view_j.len() {
                if view_j.ownership[j] == Ownership::Dummy {
                    continue;
                }
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                let dist_squared = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
                if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
                    continue;
                }
                let fac = self.force_factor(view_i.type_id[i], view_j.type_id[j], dist_squared);
                acc[0] += dr[0] * fac;
                acc[1] += dr[1] * fac;
                acc[2] += dr[2] * fac;
                if newton3 {
                    view_j.fx[j] -= dr[0] * fac;
                    view_j.fy[j] -= dr[1] * fac;
                    view_j.fz[j] -= dr[2] * fac;
                }
            }
            view_i.fx[i] += acc[0];
            view_i.fy[i] += acc[1];
            view_i.fz[i] += acc[2];
        }
    }

    fn soa_pair_one_way(&self, mut view_i: SoaView<'_>, view_j: SoaReadView<'_>) {
        for i in 0..view_i.len() {
            if view_i.ownership[i] == Ownership::Dummy {
                continue;
            }
            let mut acc = [0.0f64; 3];
            for j in 0..view_j.len() {
                if view_j.ownership[j] == Ownership::Dummy {
                    continue;
                }
                let dr = [
                    view_i.x[i] - view_j.x[j],
                    view_i.y[i] - view_j.y[j],
                    view_i.z[i] - view_j.z[j],
                ];
                let dist_squared = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
                if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
                    continue;
                }
                let fac = self.force_factor(view_i.type_id[i], view_j.type_id[j], dist_squared);
                acc[0] += dr[0] * fac;
                acc[1] += dr[1] * fac;
                acc[2] += dr[2] * fac;
            }
            view_i.fx[i] += acc[0];
            view_i.fy[i] += acc[1];
            view_i.fz[i] += acc[2];
        }
    }

    fn soa_verlet(&self, buf: &mut SoaBuffer, index: usize, neighbors: &[usize], newton3: bool) {
        if buf.ownership[index] == Ownership::Dummy {
            return;
        }
        let mut acc = [0.0f64; 3];
        for &j in neighbors {
            if buf.ownership[j] == Ownership::Dummy {
                continue;
            }
            let dr = [
                buf.x[index] - buf.x[j],
                buf.y[index] - buf.y[j],
                buf.z[index] - buf.z[j],
            ];
            let dist_squared = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
            if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
                continue;
            }
            let fac = self.force_factor(buf.type_id[index], buf.type_id[j], dist_squared);
            acc[0] += dr[0] * fac;
            acc[1] += dr[1] * fac;
            acc[2] += dr[2] * fac;
            if newton3 {
                buf.fx[j] -= dr[0] * fac;
                buf.fy[j] -= dr[1] * fac;
                buf.fz[j] -= dr[2] * fac;
            }
        }
        buf.fx[index] += acc[0];
        buf.fy[index] += acc[1];
        buf.fz[index] += acc[2];
    }

    fn soa_verlet_row(
        &self,
        force: SoaForceRow<'_>,
        read: SoaReadView<'_>,
        index: usize,
        neighbors: &[usize],
    ) {
        if read.ownership[index] == Ownership::Dummy {
            return;
        }
        let mut acc = [0.0f64; 3];
        for &j in neighbors {
            if read.ownership[j] == Ownership::Dummy {
                continue;
            }
            let dr = [
                read.x[index] - read.x[j],
                read.y[index] - read.y[j],
                read.z[index] - read.z[j],
            ];
            let dist_squared = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
            if dist_squared > self.cutoff_squared || dist_squared == 0.0 {
                continue;
            }
            let fac = self.force_factor(read.type_id[index], read.type_id[j], dist_squared);
            acc[0] += dr[0] * fac;
            acc[1] += dr[1] * fac;
            acc[2] += dr[2] * fac;
        }
        *force.fx += acc[0];
        *force.fy += acc[1];
        *force.fz += acc[2];
    }

    fn allows_newton3(&self) -> bool {
        true
    }

    fn allows_non_newton3(&self) -> bool {
        true
    }

    fn needed_attributes(&self) -> &'static [ParticleAttr] {
        NEEDED
    }

    fn computed_attributes(&self) -> &'static [ParticleAttr] {
        COMPUTED
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::PointMass;
    use approx::assert_relative_eq;

    #[test]
    fn test_force_matches_analytic_gradient() {
        let functor = LjFunctor::new(3.0, 1.0, 1.0);
        let mut a = PointMass::new([0.0; 3], [0.0; 3], 0);
        let mut b = PointMass::new([1.5, 0.0, 0.0], [0.0; 3], 1);
        PairwiseFunctor::<PointMass>::aos_pair(&functor, &mut a, &mut b, true);
        // F(r) = 24 eps (2 (sigma/r)^12 - (sigma/r)^6) / r, along -x on a
        let r: f64 = 1.5;
        let s6 = r.powi(-6);
        let expected = 24.0 * (2.0 * s6 * s6 - s6) / r;
        assert_relative_eq!(a.f[0], -expected.abs(), epsilon = 1e-12);
        assert_relative_eq!(a.f[0], -b.f[0], epsilon = 1e-15);
        assert_eq!(a.f[1], 0.0);
    }

    #[test]
    fn test_cutoff_and_dummies_have_no_effect() {
        let functor = LjFunctor::new(1.0, 1.0, 1.0);
        let mut a = PointMass::new([0.0; 3], [0.0; 3], 0);
        let mut b = PointMass::new([1.5, 0.0, 0.0], [0.0; 3], 1);
        PairwiseFunctor::<PointMass>::aos_pair(&functor, &mut a, &mut b, true);
        assert_eq!(a.f, [0.0; 3]);
        let mut dummy = PointMass::new([0.5, 0.0, 0.0], [0.0; 3], 2);
        dummy.set_ownership(Ownership::Dummy);
        PairwiseFunctor::<PointMass>::aos_pair(&functor, &mut a, &mut dummy, true);
        assert_eq!(a.f, [0.0; 3]);
    }

    #[test]
    fn test_newton3_off_writes_first_partner_only() {
        let functor = LjFunctor::new(2.0, 1.0, 1.0);
        let mut a = PointMass::new([0.0; 3], [0.0; 3], 0);
        let mut b = PointMass::new([1.1, 0.0, 0.0], [0.0; 3], 1);
        PairwiseFunctor::<PointMass>::aos_pair(&functor, &mut a, &mut b, false);
        assert!(a.f[0] != 0.0);
        assert_eq!(b.f, [0.0; 3]);
    }

    #[test]
    fn test_mixing_library_drives_parameters() {
        let mut lib = ParticlePropertiesLibrary::default();
        lib.add_type(0, 1.0, 1.0, 1.0);
        lib.add_type(1, 1.0, 1.0, 1.0);
        let mixed = LjFunctor::with_properties(3.0, lib);
        let uniform = LjFunctor::new(3.0, 1.0, 1.0);
        let mut a1 = PointMass::new([0.0; 3], [0.0; 3], 0);
        let mut b1 = PointMass::new([1.2, 0.3, 0.0], [0.0; 3], 1);
        b1.type_id = 1;
        let mut a2 = a1.clone();
        let mut b2 = b1.clone();
        PairwiseFunctor::<PointMass>::aos_pair(&mixed, &mut a1, &mut b1, true);
        PairwiseFunctor::<PointMass>::aos_pair(&uniform, &mut a2, &mut b2, true);
        assert_relative_eq!(a1.f[0], a2.f[0], epsilon = 1e-15);
    }
}
