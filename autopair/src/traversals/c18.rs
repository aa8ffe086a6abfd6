//! The c18 base-step traversal.
//!
//! The base cell interacts with itself and its 13 forward neighbors, where
//! forward means greater in the (z, y, x)-lexicographic order. Every
//! unordered pair of adjacent cells is therefore scheduled exactly once, from
//! its lexicographically lesser cell. Used where the c08 block construction
//! is not available.
//!
//! Thread safety comes from an 18-coloring with periods (3, 3, 2): the write
//! set of a base step spans three cells in x and y but only two in z, so
//! same-color base steps never overlap.

use crate::cell::ParticleCell;
use crate::grid::CellBlock3d;
use crate::send_ptr::SendPtrMut;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traversals::cell_functor::CellFunctor;
use rayon::prelude::*;

/// The 13 forward-neighbor displacements of the base step.
pub fn forward_neighbors() -> [[i64; 3]; 13] {
    let mut out = [[0i64; 3]; 13];
    let mut i = 0;
    for dz in 0..=1i64 {
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let forward = dz > 0 || (dz == 0 && dy > 0) || (dz == 0 && dy == 0 && dx > 0);
                if forward {
                    out[i] = [dx, dy, dz];
                    i += 1;
                }
            }
        }
    }
    debug_assert_eq!(i, 13);
    out
}

/// Cell indices grouped by the 18 colors with periods (3, 3, 2).
pub(crate) fn colored_cells(block: &CellBlock3d) -> Vec<Vec<usize>> {
    let dims = block.cells_per_dim();
    let mut colors: Vec<Vec<usize>> = vec![Vec::new(); 18];
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                let color = (x % 3) + 3 * (y % 3) + 9 * (z % 2);
                colors[color].push(block.three_to_one([x, y, z]));
            }
        }
    }
    colors
}

/// Run the full c18 schedule.
pub fn traverse<P, F>(
    cells: &mut [ParticleCell<P>],
    block: &CellBlock3d,
    cell_functor: &CellFunctor<'_, P, F>,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    let dims = block.cells_per_dim();
    let neighbors = forward_neighbors();
    let cells_ptr = SendPtrMut::from_slice(cells);

    for base_cells in &colored_cells(block) {
        base_cells.par_iter().for_each(|&base| {
            let b3 = block.one_to_three(base);
            // SAFETY: same-color base cells are at least a full write-set
            // extent apart in every coordinate in which they differ, so
            // concurrently running base steps touch disjoint cells.
            unsafe {
                cell_functor.process_cell(cells_ptr.get_mut(base));
                for d in &neighbors {
                    let nx = b3[0] as i64 + d[0];
                    let ny = b3[1] as i64 + d[1];
                    let nz = b3[2] as i64 + d[2];
                    if nx < 0
                        || ny < 0
                        || nz < 0
                        || nx >= dims[0] as i64
                        || ny >= dims[1] as i64
                        || nz >= dims[2] as i64
                    {
                        continue;
                    }
                    let neighbor =
                        block.three_to_one([nx as usize, ny as usize, nz as usize]);
                    cell_functor
                        .process_cell_pair(cells_ptr.get_mut(base), cells_ptr.get_mut(neighbor));
                }
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_forward_relation_orders_every_adjacency_once() {
        let neighbors = forward_neighbors();
        assert_eq!(neighbors.len(), 13);
        // forward plus mirrored-forward plus identity is the full 3x3x3 stencil
        let mut seen = std::collections::HashSet::new();
        for d in &neighbors {
            seen.insert(*d);
            seen.insert([-d[0], -d[1], -d[2]]);
        }
        assert_eq!(seen.len(), 26);
        assert!(!seen.contains(&[0, 0, 0]));
    }
}
