//! Linked cells over a central particle vector.
//!
//! Particles live in one [`ParticleVector`]; cells hold indices into it.
//! Whole-domain resorts then only touch the index lists. The vector carries a
//! dirty flag and the index lists are rebuilt in bulk whenever it is set.

use crate::containers::{
    halo_inside_box_msg, owned_outside_box_msg, unsupported_traversal_msg, DomainInfo,
    PairwiseSpec, ParticleContainer,
};
use crate::grid::CellBlock3d;
use crate::iterators::in_region;
use crate::options::{ContainerKind, DataLayout, IteratorBehavior, TraversalKind};
use crate::send_ptr::SendPtrMut;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Ownership, Particle};
use crate::traits::types::{AutoPairError, Result};
use crate::traversals::{c08, c18};
use crate::utils::math::in_box;
use rayon::prelude::*;

/// Central particle storage with a dirty flag.
///
/// Any structural change (push, removal) sets the flag; consumers holding
/// index lists into the vector must rebuild them before the next use.
#[derive(Debug, Default)]
pub struct ParticleVector<P> {
    particles: Vec<P>,
    dirty: bool,
}

impl<P: Particle> ParticleVector<P> {
    /// Append a particle and mark the vector dirty.
    pub fn push(&mut self, p: P) {
        self.particles.push(p);
        self.dirty = true;
    }

    /// Whether index lists into the vector are stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Declare index lists rebuilt.
    pub fn mark_as_clean(&mut self) {
        self.dirty = false;
    }

    /// Keep only particles satisfying the predicate; marks dirty if any
    /// particle was dropped.
    pub fn retain(&mut self, keep: impl FnMut(&P) -> bool) {
        let before = self.particles.len();
        self.particles.retain(keep);
        if self.particles.len() != before {
            self.dirty = true;
        }
    }

    /// All stored particles.
    pub fn particles(&self) -> &[P] {
        &self.particles
    }

    /// Mutable access. Position changes do not set the dirty flag; callers
    /// moving particles across cells are expected to trigger an update.
    pub fn particles_mut(&mut self) -> &mut [P] {
        &mut self.particles
    }

    fn drain_filter_outside(&mut self, lo: [f64; 3], hi: [f64; 3]) -> Vec<P> {
        let mut kept = Vec::with_capacity(self.particles.len());
        let mut leavers = Vec::new();
        for p in self.particles.drain(..) {
            if in_box(p.position(), lo, hi) {
                kept.push(p);
            } else {
                leavers.push(p);
            }
        }
        self.particles = kept;
        if !leavers.is_empty() {
            self.dirty = true;
        }
        leavers
    }
}

/// Linked cells whose cells reference a central vector instead of owning
/// their particles.
#[derive(Debug)]
pub struct ReferenceLinkedCells<P> {
    domain: DomainInfo,
    block: CellBlock3d,
    storage: ParticleVector<P>,
    index_cells: Vec<Vec<usize>>,
}

impl<P: Particle> ReferenceLinkedCells<P> {
    /// Fresh container.
    pub fn new(domain: DomainInfo, cell_size_factor: f64) -> Self {
        let block = CellBlock3d::new(
            domain.box_min,
            domain.box_max,
            domain.interaction_length(),
            cell_size_factor,
        );
        let index_cells = vec![Vec::new(); block.num_cells()];
        Self {
            domain,
            block,
            storage: ParticleVector::default(),
            index_cells,
        }
    }

    /// The central storage.
    pub fn storage(&self) -> &ParticleVector<P> {
        &self.storage
    }

    /// The grid geometry.
    pub fn cell_block(&self) -> &CellBlock3d {
        &self.block
    }

    /// Rebuild all index lists if the storage is dirty.
    pub fn update_dirty_references(&mut self) {
        if !self.storage.is_dirty() {
            return;
        }
        for cell in &mut self.index_cells {
            cell.clear();
        }
        for (index, p) in self.storage.particles().iter().enumerate() {
            let cell = self.block.index_of_position(p.position());
            self.index_cells[cell].push(index);
        }
        self.storage.mark_as_clean();
    }

    fn process_cell<F: PairwiseFunctor<P>>(
        ptr: SendPtrMut<P>,
        indices: &[usize],
        functor: &F,
        newton3: bool,
    ) {
        for (a, &i) in indices.iter().enumerate() {
            for &j in &indices[a + 1..] {
                // SAFETY: an index appears in exactly one cell once, so i and
                // j name distinct particles, and the caller's schedule owns
                // both cells.
                unsafe {
                    functor.aos_pair(ptr.get_mut(i), ptr.get_mut(j), newton3);
                    if !newton3 {
                        functor.aos_pair(ptr.get_mut(j), ptr.get_mut(i), false);
                    }
                }
            }
        }
    }

    fn process_cell_pair<F: PairwiseFunctor<P>>(
        ptr: SendPtrMut<P>,
        a: &[usize],
        b: &[usize],
        functor: &F,
        newton3: bool,
    ) {
        for &i in a {
            for &j in b {
                // SAFETY: as in process_cell; two different cells never share
                // an index.
                unsafe {
                    functor.aos_pair(ptr.get_mut(i), ptr.get_mut(j), newton3);
                    if !newton3 {
                        functor.aos_pair(ptr.get_mut(j), ptr.get_mut(i), false);
                    }
                }
            }
        }
    }
}

impl<P: Particle> ParticleContainer<P> for ReferenceLinkedCells<P> {
    fn domain(&self) -> &DomainInfo {
        &self.domain
    }

    fn add(&mut self, p: P) -> Result<()> {
        if !in_box(p.position(), self.domain.box_min, self.domain.box_max) {
            return Err(AutoPairError::InvariantViolation(owned_outside_box_msg(
                &p,
                &self.domain,
            )));
        }
        self.storage.push(p);
        Ok(())
    }

    fn add_halo(&mut self, p: P) -> Result<()> {
        if in_box(p.position(), self.domain.box_min, self.domain.box_max) {
            return Err(AutoPairError::InvariantViolation(halo_inside_box_msg(
                &p,
                &self.domain,
            )));
        }
        let mut p = p;
        p.set_ownership(Ownership::Halo);
        self.storage.push(p);
        Ok(())
    }

    fn update_halo(&mut self, p: P) -> bool {
        for stored in self.storage.particles_mut() {
            if stored.is_halo() && stored.id() == p.id() {
                stored.set_position(p.position());
                stored.set_velocity(p.velocity());
                stored.set_force(p.force());
                return true;
            }
        }
        false
    }

    fn delete_halo(&mut self) {
        self.storage.retain(|p| !p.is_halo());
    }

    fn update(&mut self) -> Vec<P> {
        self.delete_halo();
        let leavers = self
            .storage
            .drain_filter_outside(self.domain.box_min, self.domain.box_max);
        self.update_dirty_references();
        leavers
    }

    fn is_update_needed(&self) -> bool {
        if self.storage.is_dirty() {
            return true;
        }
        self.index_cells.iter().enumerate().any(|(cell, indices)| {
            let (lo, hi) = self.block.cell_bounding_box(cell);
            indices
                .iter()
                .any(|&i| !in_box(self.storage.particles()[i].position(), lo, hi))
        })
    }

    fn rebuild_neighbor_lists(&mut self, _newton3: bool) {
        self.update_dirty_references();
    }

    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P)) {
        for p in self.storage.particles() {
            if behavior.contains(p) {
                f(p);
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P)) {
        for p in self.storage.particles_mut() {
            if behavior.contains(p) {
                f(p);
            }
        }
    }

    fn for_each_in_region(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&P),
    ) {
        for p in self.storage.particles() {
            if in_region(p, lo, hi, behavior) {
                f(p);
            }
        }
    }

    fn for_each_in_region_mut(
        &mut self,
        lo: [f64; 3],
        hi: [f64; 3],
        behavior: IteratorBehavior,
        f: &mut dyn FnMut(&mut P),
    ) {
        for p in self.storage.particles_mut() {
            if in_region(p, lo, hi, behavior) {
                f(p);
            }
        }
    }

    fn iterate_pairwise<F: PairwiseFunctor<P>>(
        &mut self,
        spec: &PairwiseSpec,
        functor: &F,
    ) -> Result<()> {
        if spec.layout != DataLayout::Aos
            || !matches!(spec.traversal, TraversalKind::C08 | TraversalKind::C18)
        {
            return Err(AutoPairError::InvalidConfiguration(
                unsupported_traversal_msg(ContainerKind::ReferenceLinkedCells, spec),
            ));
        }
        self.update_dirty_references();
        let ptr = SendPtrMut::from_slice(self.storage.particles_mut());
        let index_cells = &self.index_cells;
        let block = &self.block;

        match spec.traversal {
            TraversalKind::C08 => {
                let offsets = c08::compute_pair_offsets(block.cells_per_dim());
                for base_cells in c08::colored_base_cells(block).iter() {
                    base_cells.par_iter().for_each(|&base| {
                        for &(off_a, off_b) in &offsets {
                            let cell_a = base + off_a;
                            let cell_b = base + off_b;
                            if cell_a == cell_b {
                                Self::process_cell(
                                    ptr,
                                    &index_cells[cell_a],
                                    functor,
                                    spec.newton3,
                                );
                            } else {
                                Self::process_cell_pair(
                                    ptr,
                                    &index_cells[cell_a],
                                    &index_cells[cell_b],
                                    functor,
                                    spec.newton3,
                                );
                            }
                        }
                    });
                }
            }
            TraversalKind::C18 => {
                let dims = block.cells_per_dim();
                let neighbors = c18::forward_neighbors();
                for base_cells in &c18::colored_cells(block) {
                    base_cells.par_iter().for_each(|&base| {
                        let b3 = block.one_to_three(base);
                        Self::process_cell(ptr, &index_cells[base], functor, spec.newton3);
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
                            Self::process_cell_pair(
                                ptr,
                                &index_cells[base],
                                &index_cells[neighbor],
                                functor,
                                spec.newton3,
                            );
                        }
                    });
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::particle::PointMass;
    use crate::utils::fixtures::particles_fixture;

    fn domain() -> DomainInfo {
        DomainInfo {
            box_min: [0.0; 3],
            box_max: [10.0; 3],
            cutoff: 1.0,
            skin: 0.2,
        }
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let mut rlc = ReferenceLinkedCells::new(domain(), 1.0);
        assert!(!rlc.storage().is_dirty());
        rlc.add(PointMass::new([1.0; 3], [0.0; 3], 0)).unwrap();
        assert!(rlc.storage().is_dirty());
        rlc.update_dirty_references();
        assert!(!rlc.storage().is_dirty());
        rlc.delete_halo();
        // nothing removed, still clean
        assert!(!rlc.storage().is_dirty());
    }

    #[test]
    fn test_references_follow_bulk_rebuild() {
        let mut rlc = ReferenceLinkedCells::new(domain(), 1.0);
        for p in particles_fixture(64, 0.0, 10.0, 3) {
            rlc.add(p).unwrap();
        }
        rlc.update_dirty_references();
        let total: usize = rlc.index_cells.iter().map(|c| c.len()).sum();
        assert_eq!(total, 64);
        for (cell, indices) in rlc.index_cells.iter().enumerate() {
            let (lo, hi) = rlc.block.cell_bounding_box(cell);
            for &i in indices {
                assert!(in_box(rlc.storage.particles()[i].position(), lo, hi));
            }
        }
    }

    #[test]
    fn test_update_returns_leavers() {
        let mut rlc = ReferenceLinkedCells::new(domain(), 1.0);
        for p in particles_fixture(16, 0.0, 10.0, 4) {
            rlc.add(p).unwrap();
        }
        rlc.for_each_mut(IteratorBehavior::Owned, &mut |p| {
            if p.id() == 2 {
                p.set_position([-1.0, 5.0, 5.0]);
            }
        });
        let leavers = rlc.update();
        assert_eq!(leavers.len(), 1);
        assert_eq!(leavers[0].id(), 2);
        assert_eq!(rlc.num_particles(IteratorBehavior::Owned), 15);
    }
}
