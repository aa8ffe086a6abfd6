//! Cluster-pair iteration over the cluster-thread partition.
//!
//! With Newton-3 the lists hold every unordered cluster pair once and both
//! clusters are written, so the pass runs on one thread. Without Newton-3
//! the lists are bidirectional and every cluster's forces depend only on
//! reads of its neighbors, which admits a parallel schedule in which no two
//! tasks ever hold overlapping mutable state: the partition may cut a tower
//! between two tasks, so tasks never take a tower-level mutable reference.
//! In the array-of-structures pass forces are first accumulated on local
//! copies under purely shared access and then written back row-disjointly;
//! in the structure-of-arrays pass every tower's buffer is split up front
//! into shared read columns and per-cluster force chunks, and each task
//! receives exactly the chunks of its own clusters.

use crate::containers::verlet_cluster_lists::{ClusterRange, ClusterTower, CLUSTER_SIZE};
use crate::send_ptr::SendPtrMut;
use crate::soa::{SoaReadView, SoaView};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::Particle;
use crate::traversals::verlet::pair_mut;
use itertools::izip;
use rayon::prelude::*;

/// The `(tower, cluster)` pairs of one partition slice, in traversal order.
fn clusters_of_range<P: Particle>(
    towers: &[ClusterTower<P>],
    range: &ClusterRange,
) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(range.num_clusters);
    let mut tower = range.start_tower;
    let mut cluster = range.start_cluster;
    for _ in 0..range.num_clusters {
        while cluster >= towers[tower].num_clusters() {
            tower += 1;
            cluster = 0;
        }
        out.push((tower, cluster));
        cluster += 1;
    }
    out
}

/// Mutable force columns of one cluster, carved out of a tower's buffer.
struct ClusterForces<'a> {
    fx: &'a mut [f64],
    fy: &'a mut [f64],
    fz: &'a mut [f64],
}

/// One cluster's Newton-3 interactions, single threaded.
fn process_cluster_aos<P, F>(
    towers_ptr: SendPtrMut<ClusterTower<P>>,
    tower_index: usize,
    cluster_index: usize,
    functor: &F,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    // SAFETY: the Newton-3 pass is single threaded; the references created
    // below are retired strictly one after another and alias only when the
    // indices coincide, which the branches rule out.
    let tower = unsafe { towers_ptr.get_mut(tower_index) };
    let my_range = tower.cluster_range(cluster_index);

    // intra-cluster pairs
    for i in my_range.clone() {
        for j in (i + 1)..my_range.end {
            let (pi, pj) = pair_mut(tower.particles_mut(), i, j);
            functor.aos_pair(pi, pj, true);
        }
    }

    // cluster-pair interactions via the stored neighbor list
    let neighbors: Vec<(usize, usize)> = tower.cluster_neighbors(cluster_index).to_vec();
    for (other_tower, other_cluster) in neighbors {
        if other_tower == tower_index {
            let tower = unsafe { towers_ptr.get_mut(tower_index) };
            let other_range = tower.cluster_range(other_cluster);
            for i in my_range.clone() {
                for j in other_range.clone() {
                    let (pi, pj) = pair_mut(tower.particles_mut(), i, j);
                    functor.aos_pair(pi, pj, true);
                }
            }
        } else {
            let tower = unsafe { towers_ptr.get_mut(tower_index) };
            let other = unsafe { towers_ptr.get_mut(other_tower) };
            let other_range = other.cluster_range(other_cluster);
            for i in my_range.clone() {
                for j in other_range.clone() {
                    functor.aos_pair(
                        &mut tower.particles_mut()[i],
                        &mut other.particles_mut()[j],
                        true,
                    );
                }
            }
        }
    }
}

/// One cluster's Newton-3 interactions on the loaded buffers, single
/// threaded.
fn process_cluster_soa<P, F>(
    towers_ptr: SendPtrMut<ClusterTower<P>>,
    tower_index: usize,
    cluster_index: usize,
    functor: &F,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    // SAFETY: as in process_cluster_aos.
    let tower = unsafe { towers_ptr.get_mut(tower_index) };
    let my_range = tower.cluster_range(cluster_index);

    functor.soa_pair_self(tower.soa_mut().range_view_mut(my_range.clone()), true);

    let neighbors: Vec<(usize, usize)> = tower.cluster_neighbors(cluster_index).to_vec();
    for (other_tower, other_cluster) in neighbors {
        if other_tower == tower_index {
            let tower = unsafe { towers_ptr.get_mut(tower_index) };
            let other_range = tower.cluster_range(other_cluster);
            let (first, second) = if my_range.start < other_range.start {
                let (a, b) = tower
                    .soa_mut()
                    .pair_views_mut(my_range.clone(), other_range.clone());
                (a, b)
            } else {
                let (b, a) = tower
                    .soa_mut()
                    .pair_views_mut(other_range.clone(), my_range.clone());
                (a, b)
            };
            functor.soa_pair_cross(first, second, true);
        } else {
            let tower = unsafe { towers_ptr.get_mut(tower_index) };
            let other = unsafe { towers_ptr.get_mut(other_tower) };
            let other_range = other.cluster_range(other_cluster);
            functor.soa_pair_cross(
                tower.soa_mut().range_view_mut(my_range.clone()),
                other.soa_mut().range_view_mut(other_range),
                true,
            );
        }
    }
}

/// Newton-3-off force computation for one cluster on local copies of its
/// particles, under purely shared access to the towers.
fn compute_cluster_forces_aos<P, F>(
    towers: &[ClusterTower<P>],
    tower_index: usize,
    cluster_index: usize,
    functor: &F,
) -> Vec<P>
where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    let tower = &towers[tower_index];
    let range = tower.cluster_range(cluster_index);
    let mut own: Vec<P> = tower.particles()[range].to_vec();
    let n = own.len();

    // intra-cluster pairs, each ordered direction once
    for i in 0..n {
        for j in (i + 1)..n {
            let (pi, pj) = pair_mut(&mut own, i, j);
            functor.aos_pair(pi, pj, false);
            functor.aos_pair(pj, pi, false);
        }
    }

    // neighbor clusters contribute to the copies only; the mirrored pairs
    // are produced by the tasks owning those clusters
    for &(other_tower, other_cluster) in tower.cluster_neighbors(cluster_index) {
        let other = &towers[other_tower];
        let other_range = other.cluster_range(other_cluster);
        for pi in own.iter_mut() {
            for j in other_range.clone() {
                let mut neighbor = other.particles()[j].clone();
                functor.aos_pair(pi, &mut neighbor, false);
            }
        }
    }
    own
}

/// Array-of-structures pass over the partition.
pub fn traverse_aos<P, F>(
    towers: &mut [ClusterTower<P>],
    partition: &[ClusterRange],
    functor: &F,
    newton3: bool,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    let tasks: Vec<Vec<(usize, usize)>> = partition
        .iter()
        .map(|range| clusters_of_range(towers, range))
        .collect();

    if newton3 {
        let towers_ptr = SendPtrMut::from_slice(towers);
        for task in &tasks {
            for &(tower, cluster) in task {
                process_cluster_aos(towers_ptr, tower, cluster, functor);
            }
        }
        return;
    }

    // phase 1: accumulate forces on local copies; the towers are only read,
    // so the tasks share them freely
    let towers_read: &[ClusterTower<P>] = towers;
    let updated: Vec<Vec<(usize, usize, Vec<P>)>> = tasks
        .par_iter()
        .map(|task| {
            task.iter()
                .map(|&(tower, cluster)| {
                    (
                        tower,
                        cluster,
                        compute_cluster_forces_aos(towers_read, tower, cluster, functor),
                    )
                })
                .collect()
        })
        .collect();

    // phase 2: write the accumulated forces back; every cluster belongs to
    // exactly one task, so the row references handed out concurrently are
    // disjoint
    let bases: Vec<SendPtrMut<P>> = towers
        .iter_mut()
        .map(|tower| SendPtrMut::from_slice(tower.particles_mut()))
        .collect();
    updated.par_iter().for_each(|task| {
        for (tower, cluster, particles) in task {
            for (k, updated_particle) in particles.iter().enumerate() {
                // SAFETY: rows of different clusters never overlap and each
                // cluster is written by its owning task only.
                let p = unsafe { bases[*tower].get_mut(cluster * CLUSTER_SIZE + k) };
                p.set_force(updated_particle.force());
            }
        }
    });
}

/// Structure-of-arrays pass over the partition. The towers' buffers must be
/// loaded beforehand.
pub fn traverse_soa<P, F>(
    towers: &mut [ClusterTower<P>],
    partition: &[ClusterRange],
    functor: &F,
    newton3: bool,
) where
    P: Particle,
    F: PairwiseFunctor<P>,
{
    let tasks: Vec<Vec<(usize, usize)>> = partition
        .iter()
        .map(|range| clusters_of_range(towers, range))
        .collect();

    if newton3 {
        let towers_ptr = SendPtrMut::from_slice(towers);
        for task in &tasks {
            for &(tower, cluster) in task {
                process_cluster_soa(towers_ptr, tower, cluster, functor);
            }
        }
        return;
    }

    // the buffer split below borrows every tower, take the lists out first
    let neighbor_lists: Vec<Vec<Vec<(usize, usize)>>> = towers
        .iter()
        .map(|tower| {
            (0..tower.num_clusters())
                .map(|c| tower.cluster_neighbors(c).to_vec())
                .collect()
        })
        .collect();

    // split every tower's buffer into shared read columns and disjoint
    // per-cluster force chunks
    let mut reads: Vec<SoaReadView<'_>> = Vec::with_capacity(towers.len());
    let mut force_chunks: Vec<ClusterForces<'_>> = Vec::new();
    let mut chunk_offsets: Vec<usize> = Vec::with_capacity(towers.len());
    for tower in towers.iter_mut() {
        chunk_offsets.push(force_chunks.len());
        let buf = tower.soa_mut();
        reads.push(SoaReadView {
            x: &buf.x,
            y: &buf.y,
            z: &buf.z,
            type_id: &buf.type_id,
            ownership: &buf.ownership,
        });
        force_chunks.extend(
            izip!(
                buf.fx.chunks_mut(CLUSTER_SIZE),
                buf.fy.chunks_mut(CLUSTER_SIZE),
                buf.fz.chunks_mut(CLUSTER_SIZE)
            )
            .map(|(fx, fy, fz)| ClusterForces { fx, fy, fz }),
        );
    }

    let chunks_ptr = SendPtrMut::from_slice(&mut force_chunks);
    let reads = &reads;
    let chunk_offsets = &chunk_offsets;
    let neighbor_lists = &neighbor_lists;

    tasks.par_iter().for_each(|task| {
        for &(tower, cluster) in task {
            let range = cluster * CLUSTER_SIZE..(cluster + 1) * CLUSTER_SIZE;
            // SAFETY: every cluster belongs to exactly one task, so the
            // force chunks handed out concurrently never overlap; the read
            // columns are shared and never written during the pass.
            let forces = unsafe { chunks_ptr.get_mut(chunk_offsets[tower] + cluster) };
            let read = &reads[tower];

            functor.soa_pair_self(
                SoaView {
                    x: &read.x[range.clone()],
                    y: &read.y[range.clone()],
                    z: &read.z[range.clone()],
                    fx: &mut *forces.fx,
                    fy: &mut *forces.fy,
                    fz: &mut *forces.fz,
                    type_id: &read.type_id[range.clone()],
                    ownership: &read.ownership[range.clone()],
                },
                false,
            );

            for &(other_tower, other_cluster) in &neighbor_lists[tower][cluster] {
                let other_range =
                    other_cluster * CLUSTER_SIZE..(other_cluster + 1) * CLUSTER_SIZE;
                let view_i = SoaView {
                    x: &read.x[range.clone()],
                    y: &read.y[range.clone()],
                    z: &read.z[range.clone()],
                    fx: &mut *forces.fx,
                    fy: &mut *forces.fy,
                    fz: &mut *forces.fz,
                    type_id: &read.type_id[range.clone()],
                    ownership: &read.ownership[range.clone()],
                };
                let view_j = reads[other_tower].slice(other_range);
                functor.soa_pair_one_way(view_i, view_j);
            }
        }
    });
}
