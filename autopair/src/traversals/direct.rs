//! The direct-sum traversal.

use crate::cell::ParticleCell;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traversals::cell_functor::CellFunctor;

/// Process the owned cell against itself and against the halo cell, on a
/// single thread.
pub fn traverse<P, F>(
    owned: &mut ParticleCell<P>,
    halo: &mut ParticleCell<P>,
    cell_functor: &CellFunctor<'_, P, F>,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    cell_functor.process_cell(owned);
    cell_functor.process_cell_pair(owned, halo);
}
