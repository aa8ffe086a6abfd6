//! Sliced and balanced sliced traversals.
//!
//! The grid is cut along its longest dimension into one slab per worker.
//! Within a slab the c08 base step runs layer by layer. Base steps in the
//! last layer of a slab write into the first layer of the next slab, so each
//! boundary wall carries a lock: a slab holds the lock of its *preceding*
//! wall while processing its first layer and the lock of its *own* wall while
//! processing its last layer. Locks are acquired in increasing wall order,
//! which rules out deadlock; the slab interiors run fully in parallel.
//!
//! The balanced variant chooses slab boundaries so that every slab carries
//! approximately equal estimated load instead of an equal layer count.

use crate::cell::ParticleCell;
use crate::grid::CellBlock3d;
use crate::options::LoadEstimatorKind;
use crate::send_ptr::SendPtrMut;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traversals::c08;
use crate::traversals::cell_functor::CellFunctor;
use std::sync::Mutex;

/// Index of the longest dimension of the grid.
fn longest_dimension(block: &CellBlock3d) -> usize {
    let dims = block.cells_per_dim();
    (0..3).max_by_key(|&k| dims[k]).unwrap_or(0)
}

/// Estimated processing load of one base layer along `slice_dim`.
fn layer_load<P: Particle>(
    cells: &[ParticleCell<P>],
    block: &CellBlock3d,
    slice_dim: usize,
    layer: usize,
    estimator: LoadEstimatorKind,
) -> u64 {
    let dims = block.cells_per_dim();
    let (u_dim, v_dim) = match slice_dim {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let mut load = 0u64;
    for u in 0..dims[u_dim] {
        for v in 0..dims[v_dim] {
            let mut coords = [0usize; 3];
            coords[slice_dim] = layer;
            coords[u_dim] = u;
            coords[v_dim] = v;
            let cell = &cells[block.three_to_one(coords)];
            load += match estimator {
                LoadEstimatorKind::None => 1,
                LoadEstimatorKind::SquaredCellSize => {
                    let n = cell.len() as u64;
                    n * n
                }
            };
        }
    }
    load
}

/// Split `num_layers` base layers into at most `max_slices` contiguous slabs
/// with approximately equal cumulative load. Every slab spans at least two
/// layers so that no slab holds both of its wall locks over its whole
/// lifetime.
fn partition_layers(loads: &[u64], max_slices: usize) -> Vec<std::ops::Range<usize>> {
    let num_layers = loads.len();
    let num_slices = max_slices.min(num_layers / 2).max(1);
    if num_slices == 1 {
        return vec![0..num_layers];
    }
    let total: u64 = loads.iter().sum();
    let mut slabs = Vec::with_capacity(num_slices);
    let mut start = 0usize;
    let mut accumulated = 0u64;
    for layer in 0..num_layers {
        accumulated += loads[layer];
        let filled = slabs.len() as u64 + 1;
        let remaining_slabs = num_slices - slabs.len();
        let layers_left = num_layers - layer - 1;
        // close the slab once its share is reached, keeping enough layers
        // for the remaining slabs
        if slabs.len() < num_slices - 1
            && layer + 1 - start >= 2
            && layers_left >= 2 * (remaining_slabs - 1)
            && accumulated * num_slices as u64 >= total * filled
        {
            slabs.push(start..layer + 1);
            start = layer + 1;
        }
    }
    slabs.push(start..num_layers);
    slabs
}

/// Run the sliced schedule; `estimator` selects the balanced variant.
///
/// Falls back to a single serial slab when the grid is too flat to cut.
pub fn traverse<P, F>(
    cells: &mut [ParticleCell<P>],
    block: &CellBlock3d,
    cell_functor: &CellFunctor<'_, P, F>,
    estimator: LoadEstimatorKind,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    let dims = block.cells_per_dim();
    let slice_dim = longest_dimension(block);
    // base layers: c08 base cells exist for every layer but the last
    let num_layers = dims[slice_dim] - 1;

    let loads: Vec<u64> = (0..num_layers)
        .map(|layer| layer_load(cells, block, slice_dim, layer, estimator))
        .collect();
    let slabs = partition_layers(&loads, rayon::current_num_threads());
    let num_slices = slabs.len();
    tracing::trace!(slice_dim, num_slices, "sliced traversal layout");

    let walls: Vec<Mutex<()>> = (0..num_slices.saturating_sub(1))
        .map(|_| Mutex::new(()))
        .collect();

    let pair_offsets = c08::compute_pair_offsets(dims);
    let cells_ptr = SendPtrMut::from_slice(cells);

    let (u_dim, v_dim) = match slice_dim {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    rayon::scope(|scope| {
        for (slab_index, slab) in slabs.iter().cloned().enumerate() {
            let walls = &walls;
            let pair_offsets = &pair_offsets;
            scope.spawn(move |_| {
                let mut prev_wall_guard = if slab_index > 0 {
                    Some(walls[slab_index - 1].lock().unwrap())
                } else {
                    None
                };
                let mut own_wall_guard = None;
                for layer in slab.clone() {
                    if layer + 1 == slab.end && slab_index + 1 < num_slices {
                        own_wall_guard = Some(walls[slab_index].lock().unwrap());
                    }
                    for u in 0..dims[u_dim] - 1 {
                        for v in 0..dims[v_dim] - 1 {
                            let mut coords = [0usize; 3];
                            coords[slice_dim] = layer;
                            coords[u_dim] = u;
                            coords[v_dim] = v;
                            let base = block.three_to_one(coords);
                            for &(off_a, off_b) in pair_offsets {
                                let index_a = base + off_a;
                                let index_b = base + off_b;
                                // SAFETY: this task owns all cells of its
                                // slab layers; writes into the neighboring
                                // slab's first layer happen only under the
                                // corresponding wall lock.
                                unsafe {
                                    if index_a == index_b {
                                        cell_functor.process_cell(cells_ptr.get_mut(index_a));
                                    } else {
                                        cell_functor.process_cell_pair(
                                            cells_ptr.get_mut(index_a),
                                            cells_ptr.get_mut(index_b),
                                        );
                                    }
                                }
                            }
                        }
                    }
                    if layer == slab.start {
                        prev_wall_guard.take();
                    }
                }
                drop(own_wall_guard);
            });
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partition_covers_all_layers_contiguously() {
        let loads = vec![1u64; 12];
        let slabs = partition_layers(&loads, 4);
        assert_eq!(slabs.len(), 4);
        assert_eq!(slabs[0].start, 0);
        assert_eq!(slabs.last().unwrap().end, 12);
        for w in slabs.windows(2) {
            assert_eq!(w[0].end, w[1].start);
            assert!(w[0].len() >= 2);
        }
    }

    #[test]
    fn test_partition_balances_skewed_load() {
        // all load in the first four layers
        let mut loads = vec![0u64; 12];
        for l in loads.iter_mut().take(4) {
            *l = 100;
        }
        let slabs = partition_layers(&loads, 2);
        assert_eq!(slabs.len(), 2);
        // the heavy half must not swallow the whole range
        assert!(slabs[0].end <= 6);
    }

    #[test]
    fn test_flat_grid_degenerates_to_one_slab() {
        let loads = vec![1u64; 3];
        let slabs = partition_layers(&loads, 8);
        assert_eq!(slabs.len(), 1);
        assert_eq!(slabs[0].clone().count(), 3);
    }
}
