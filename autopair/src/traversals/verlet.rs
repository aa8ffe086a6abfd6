//! Neighbor-list driven iteration.
//!
//! Whether a pair appears once (Newton-3) or twice (one entry per partner)
//! was decided when the lists were built; the traversal only reflects that
//! choice in the kernel calls it makes.

use crate::soa::{SoaBuffer, SoaForceRow, SoaReadView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use rayon::prelude::*;

/// Two distinct mutable elements of one slice.
///
/// # Panics
/// Panics if `i == j` or either index is out of bounds.
pub(crate) fn pair_mut<T>(slice: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j, "a particle cannot pair with itself");
    if i < j {
        let (head, tail) = slice.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = slice.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

/// Array-of-structures pass over the stored lists, single threaded.
pub fn traverse_aos<P, F>(
    particles: &mut [P],
    neighbor_lists: &[Vec<usize>],
    functor: &F,
    newton3: bool,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    for (i, neighbors) in neighbor_lists.iter().enumerate() {
        for &j in neighbors {
            let (pi, pj) = pair_mut(particles, i, j);
            functor.aos_pair(pi, pj, newton3);
        }
    }
}

/// Structure-of-arrays pass over the stored lists.
///
/// With Newton-3 a task writes its neighbors' rows as well, so the pass
/// stays on one thread over the whole buffer. Without Newton-3 the force
/// columns are split into per-row accumulators and the rows run in
/// parallel: every task holds the mutable force entries of its own row
/// only and reads neighbor positions through a shared view, so no two
/// tasks ever hold overlapping mutable state.
pub fn traverse_soa<P, F>(
    buf: &mut SoaBuffer,
    neighbor_lists: &[Vec<usize>],
    functor: &F,
    newton3: bool,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    if newton3 {
        for (i, neighbors) in neighbor_lists.iter().enumerate() {
            functor.soa_verlet(buf, i, neighbors, true);
        }
    } else {
        let x = &buf.x[..];
        let y = &buf.y[..];
        let z = &buf.z[..];
        let type_id = &buf.type_id[..];
        let ownership = &buf.ownership[..];
        buf.fx
            .par_iter_mut()
            .zip(buf.fy.par_iter_mut())
            .zip(buf.fz.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((fx, fy), fz))| {
                let read = SoaReadView {
                    x,
                    y,
                    z,
                    type_id,
                    ownership,
                };
                functor.soa_verlet_row(SoaForceRow { fx, fy, fz }, read, i, &neighbor_lists[i]);
            });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pair_mut_returns_requested_elements() {
        let mut v = vec![10, 20, 30, 40];
        let (a, b) = pair_mut(&mut v, 3, 1);
        assert_eq!((*a, *b), (40, 20));
        *a += 1;
        *b += 1;
        assert_eq!(v, vec![10, 21, 30, 41]);
    }

    #[test]
    #[should_panic]
    fn test_pair_mut_rejects_equal_indices() {
        let mut v = vec![1, 2];
        let _ = pair_mut(&mut v, 1, 1);
    }

    #[test]
    fn test_soa_passes_agree_across_newton3_modes() {
        use crate::functors::lj::LjFunctor;
        use crate::traits::particle::PointMass;
        use approx::assert_relative_eq;

        let particles: Vec<PointMass> =
            crate::utils::fixtures::particles_fixture(40, 0.0, 2.0, 21);
        let functor = LjFunctor::new(1.0, 1.0, 1.0);
        let needed = PairwiseFunctor::<PointMass>::needed_attributes(&functor);

        // Newton-3 lists: each unordered pair once
        let mut lists3: Vec<Vec<usize>> = vec![Vec::new(); particles.len()];
        // bidirectional lists: each ordered pair once
        let mut lists: Vec<Vec<usize>> = vec![Vec::new(); particles.len()];
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                if crate::utils::math::dist_sq(particles[i].position(), particles[j].position())
                    <= 1.44
                {
                    lists3[i].push(j);
                    lists[i].push(j);
                    lists[j].push(i);
                }
            }
        }

        let mut buf3 = SoaBuffer::default();
        buf3.load(&particles, needed);
        traverse_soa::<PointMass, _>(&mut buf3, &lists3, &functor, true);

        let mut buf = SoaBuffer::default();
        buf.load(&particles, needed);
        traverse_soa::<PointMass, _>(&mut buf, &lists, &functor, false);

        for i in 0..particles.len() {
            assert_relative_eq!(buf.fx[i], buf3.fx[i], epsilon = 1e-12);
            assert_relative_eq!(buf.fy[i], buf3.fy[i], epsilon = 1e-12);
            assert_relative_eq!(buf.fz[i], buf3.fz[i], epsilon = 1e-12);
        }
    }
}
