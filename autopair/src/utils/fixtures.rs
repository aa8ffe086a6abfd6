//! Seeded particle generators used in testing the containers and traversals.

use crate::traits::particle::PointMass;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Uniformly random particles in the half-open box `[min, max)` per axis.
///
/// # Arguments
/// * `n` - The number of particles to sample.
/// * `min` - The minimum coordinate value along each axis.
/// * `max` - The maximum coordinate value along each axis (exclusive).
/// * `seed` - Seed of the deterministic generator.
pub fn particles_fixture(n: usize, min: f64, max: f64, seed: u64) -> Vec<PointMass> {
    let mut rng = StdRng::seed_from_u64(seed);
    let between = Uniform::from(min..max);
    (0..n)
        .map(|i| {
            PointMass::new(
                [
                    between.sample(&mut rng),
                    between.sample(&mut rng),
                    between.sample(&mut rng),
                ],
                [0.0, 0.0, 0.0],
                i as u64,
            )
        })
        .collect()
}

/// Particles on a regular grid with the given spacing, offset by half a
/// spacing from the origin.
///
/// Ids are assigned in x-fastest order starting at 0.
pub fn grid_fixture(particles_per_dim: [usize; 3], spacing: f64) -> Vec<PointMass> {
    let mut particles = Vec::with_capacity(particles_per_dim.iter().product());
    let mut id = 0u64;
    for z in 0..particles_per_dim[2] {
        for y in 0..particles_per_dim[1] {
            for x in 0..particles_per_dim[0] {
                particles.push(PointMass::new(
                    [
                        (x as f64 + 0.5) * spacing,
                        (y as f64 + 0.5) * spacing,
                        (z as f64 + 0.5) * spacing,
                    ],
                    [0.0, 0.0, 0.0],
                    id,
                ));
                id += 1;
            }
        }
    }
    particles
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::Particle;
    use crate::utils::math::in_box;

    #[test]
    fn test_fixture_is_deterministic_and_in_box() {
        let a = particles_fixture(100, 0.0, 10.0, 42);
        let b = particles_fixture(100, 0.0, 10.0, 42);
        for (p, q) in a.iter().zip(b.iter()) {
            assert_eq!(p.position(), q.position());
            assert!(in_box(p.position(), [0.0; 3], [10.0; 3]));
        }
    }

    #[test]
    fn test_grid_fixture_counts() {
        let g = grid_fixture([2, 3, 4], 1.0);
        assert_eq!(g.len(), 24);
        assert_eq!(g[0].position(), [0.5, 0.5, 0.5]);
    }
}
