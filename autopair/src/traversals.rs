//! Traversal schedules over cell self- and pair-tasks.
//!
//! A traversal executes every required task exactly once, in an order that
//! keeps concurrently running tasks' write sets disjoint: colored schedules
//! ([`c08`], [`c18`]) by lattice coloring, [`sliced`] schedules by slab
//! ownership plus boundary-wall locks, list-driven schedules ([`verlet`],
//! [`cluster`]) by partitioning the index space.

pub mod c08;
pub mod c18;
pub mod cell_functor;
pub mod cluster;
pub mod direct;
pub mod sliced;
pub mod verlet;

use crate::cell::ParticleCell;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use rayon::prelude::*;

/// Bulk AoS→SoA conversion of every cell, in parallel.
pub fn load_all_soa<P, F>(cells: &mut [ParticleCell<P>], functor: &F)
where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    cells.par_iter_mut().for_each(|cell| cell.load_soa(functor));
}

/// Bulk SoA→AoS conversion of every cell, in parallel.
pub fn extract_all_soa<P, F>(cells: &mut [ParticleCell<P>], functor: &F)
where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    cells
        .par_iter_mut()
        .for_each(|cell| cell.extract_soa(functor));
}
