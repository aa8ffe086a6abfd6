//! Velocity-scaling thermostat.

use crate::auto_pair::AutoPair;
use crate::functors::properties::ParticlePropertiesLibrary;
use crate::options::IteratorBehavior;
use crate::traits::particle::Particle;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Current temperature of the owned particles in reduced units,
/// `T = Σ m·v² / (3·N)` with the Boltzmann constant set to one.
///
/// Returns zero for an empty system.
pub fn calc_temperature<P: Particle>(
    engine: &AutoPair<P>,
    properties: &ParticlePropertiesLibrary,
) -> f64 {
    let mut kinetic = 0.0;
    let mut count = 0usize;
    engine.for_each(IteratorBehavior::Owned, |p| {
        let v = p.velocity();
        kinetic += properties.get_mass(p.type_id()) * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]);
        count += 1;
    });
    if count == 0 {
        return 0.0;
    }
    kinetic / (3.0 * count as f64)
}

/// Add normally distributed velocity kicks to every owned particle.
///
/// With `use_current_temperature` the kick width per particle is
/// `sqrt(T/m)`, otherwise a fixed width of 0.1 is used; the latter also
/// heats a system at rest.
pub fn add_brownian_motion<P: Particle, R: Rng>(
    engine: &mut AutoPair<P>,
    properties: &ParticlePropertiesLibrary,
    use_current_temperature: bool,
    rng: &mut R,
) {
    let current = calc_temperature(engine, properties);
    engine.for_each_mut(IteratorBehavior::Owned, |p| {
        let width = if use_current_temperature {
            (current / properties.get_mass(p.type_id())).sqrt()
        } else {
            0.1
        };
        let normal = Normal::new(0.0, width.max(f64::MIN_POSITIVE))
            .expect("width is finite and non-negative");
        let mut v = p.velocity();
        for component in v.iter_mut() {
            *component += normal.sample(rng);
        }
        p.set_velocity(v);
    });
}

/// Scale the velocities toward `target_temperature`, changing the
/// temperature by at most `delta_temperature` per call.
///
/// Repeated application reaches the target in
/// `ceil(|target - current| / delta)` calls and then leaves the system
/// unchanged.
pub fn apply<P: Particle>(
    engine: &mut AutoPair<P>,
    properties: &ParticlePropertiesLibrary,
    target_temperature: f64,
    delta_temperature: f64,
) {
    let current = calc_temperature(engine, properties);
    if current == 0.0 {
        return;
    }
    let delta = delta_temperature.abs();
    let next = if (target_temperature - current).abs() <= delta {
        target_temperature
    } else if target_temperature > current {
        current + delta
    } else {
        current - delta
    };
    let factor = (next / current).sqrt();
    engine.for_each_mut(IteratorBehavior::Owned, |p| {
        let v = p.velocity();
        p.set_velocity([v[0] * factor, v[1] * factor, v[2] * factor]);
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::functors::properties::MixingRule;
    use crate::options::ContainerKind;
    use crate::traits::particle::PointMass;
    use crate::utils::fixtures::grid_fixture;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn system(particles_per_dim: [usize; 3]) -> (AutoPair<PointMass>, ParticlePropertiesLibrary) {
        let spacing = 1.0;
        let side = |n: usize| (n as f64 * spacing).max(1.2);
        let mut engine = AutoPair::builder()
            .box_min([0.0; 3])
            .box_max([
                side(particles_per_dim[0]),
                side(particles_per_dim[1]),
                side(particles_per_dim[2]),
            ])
            .cutoff(1.0)
            .verlet_skin(0.2)
            .allowed_containers(vec![ContainerKind::LinkedCells])
            .build()
            .unwrap();
        for p in grid_fixture(particles_per_dim, spacing) {
            engine.add_particle(p).unwrap();
        }
        let mut properties = ParticlePropertiesLibrary::new(MixingRule::Geometric);
        properties.add_type(0, 1.0, 1.0, 1.0);
        (engine, properties)
    }

    #[test]
    fn test_brownian_motion_heats_a_cold_system() {
        let (mut engine, properties) = system([2, 1, 1]);
        let mut rng = StdRng::seed_from_u64(2);
        assert_relative_eq!(calc_temperature(&engine, &properties), 0.0);
        add_brownian_motion(&mut engine, &properties, false, &mut rng);
        assert!(calc_temperature(&engine, &properties) > 0.0);
        engine.for_each(crate::options::IteratorBehavior::Owned, |p| {
            assert!(p.velocity().iter().any(|&v| v != 0.0));
        });
    }

    #[test]
    fn test_scaling_reaches_target_in_bounded_steps() {
        let (mut engine, properties) = system([2, 2, 2]);
        let mut rng = StdRng::seed_from_u64(3);
        add_brownian_motion(&mut engine, &properties, false, &mut rng);

        // pin the system at T = 1 exactly
        apply(&mut engine, &properties, 1.0, f64::MAX);
        assert_relative_eq!(
            calc_temperature(&engine, &properties),
            1.0,
            epsilon = 1e-12
        );

        // scaling toward 2.0 with delta 0.3 passes 1.3, 1.6, 1.9, 2.0
        let expected = [1.3, 1.6, 1.9, 2.0];
        let steps = ((2.0f64 - 1.0) / 0.3).ceil() as usize;
        assert_eq!(steps, expected.len());
        for value in expected {
            apply(&mut engine, &properties, 2.0, 0.3);
            assert_relative_eq!(
                calc_temperature(&engine, &properties),
                value,
                epsilon = 1e-12
            );
        }

        // one more application leaves the temperature in place
        apply(&mut engine, &properties, 2.0, 0.3);
        assert_relative_eq!(
            calc_temperature(&engine, &properties),
            2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_cooling_works_symmetrically() {
        let (mut engine, properties) = system([2, 2, 2]);
        let mut rng = StdRng::seed_from_u64(4);
        add_brownian_motion(&mut engine, &properties, false, &mut rng);
        apply(&mut engine, &properties, 2.0, f64::MAX);
        apply(&mut engine, &properties, 1.0, 0.5);
        assert_relative_eq!(
            calc_temperature(&engine, &properties),
            1.5,
            epsilon = 1e-12
        );
        apply(&mut engine, &properties, 1.0, 0.5);
        assert_relative_eq!(
            calc_temperature(&engine, &properties),
            1.0,
            epsilon = 1e-12
        );
    }
}
