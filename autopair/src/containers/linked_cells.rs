//! The linked-cells container.

use crate::cell::ParticleCell;
use crate::containers::{
    halo_inside_box_msg, owned_outside_box_msg, unsupported_traversal_msg, DomainInfo,
    PairwiseSpec, ParticleContainer,
};
use crate::grid::CellBlock3d;
use crate::iterators::in_region;
use crate::options::{ContainerKind, DataLayout, IteratorBehavior, TraversalKind};
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Ownership, Particle};
use crate::traits::types::{AutoPairError, Result};
use crate::traversals::cell_functor::CellFunctor;
use crate::traversals::{c08, c18, extract_all_soa, load_all_soa, sliced};
use crate::utils::math::in_box;
use rayon::prelude::*;

/// Particles are stored directly inside the cell of their coordinate; cell
/// sides are at least one interaction length, so interactions only reach into
/// neighboring cells.
#[derive(Debug)]
pub struct LinkedCells<P> {
    domain: DomainInfo,
    block: CellBlock3d,
    cells: Vec<ParticleCell<P>>,
}

impl<P: Particle> LinkedCells<P> {
    /// Fresh container.
    ///
    /// # Arguments
    /// * `domain` - Box corners, cutoff and skin.
    /// * `cell_size_factor` - Scales the minimum cell side.
    pub fn new(domain: DomainInfo, cell_size_factor: f64) -> Self {
        let block = CellBlock3d::new(
            domain.box_min,
            domain.box_max,
            domain.interaction_length(),
            cell_size_factor,
        );
        let cells = (0..block.num_cells()).map(|_| ParticleCell::new()).collect();
        Self {
            domain,
            block,
            cells,
        }
    }

    /// The grid geometry.
    pub fn cell_block(&self) -> &CellBlock3d {
        &self.block
    }

    /// The cells, halo included.
    pub fn cells(&self) -> &[ParticleCell<P>] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [ParticleCell<P>] {
        &mut self.cells
    }

    fn insert(&mut self, p: P) {
        let index = self.block.index_of_position(p.position());
        self.cells[index].add(p);
    }

    /// Cells overlapping the closed region `[lo, hi]`, expanded by the skin
    /// because particles may drift over cell borders between updates.
    fn region_cells(&self, lo: [f64; 3], hi: [f64; 3]) -> Vec<usize> {
        let skin = self.domain.skin;
        let lo3 = self
            .block
            .index_3d_of_position([lo[0] - skin, lo[1] - skin, lo[2] - skin]);
        let hi3 = self
            .block
            .index_3d_of_position([hi[0] + skin, hi[1] + skin, hi[2] + skin]);
        let mut cells = Vec::new();
        for z in lo3[2]..=hi3[2] {
            for y in lo3[1]..=hi3[1] {
                for x in lo3[0]..=hi3[0] {
                    cells.push(self.block.three_to_one([x, y, z]));
                }
            }
        }
        cells
    }
}

impl<P: Particle> ParticleContainer<P> for LinkedCells<P> {
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
        self.insert(p);
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
        self.insert(p);
        Ok(())
    }

    fn update_halo(&mut self, p: P) -> bool {
        let candidates = self.block.nearby_halo_cells(p.position(), self.domain.skin);
        for cell_index in candidates {
            for stored in self.cells[cell_index].iter_mut() {
                if stored.is_halo() && stored.id() == p.id() {
                    stored.set_position(p.position());
                    stored.set_velocity(p.velocity());
                    stored.set_force(p.force());
                    return true;
                }
            }
        }
        tracing::trace!(id = p.id(), "no halo particle found to update");
        false
    }

    fn delete_halo(&mut self) {
        for cell in &mut self.cells {
            cell.particles_mut()
                .iter_mut()
                .for_each(|p| {
                    if p.is_halo() {
                        p.set_ownership(Ownership::Dummy);
                    }
                });
            cell.purge_dummies();
        }
    }

    fn update(&mut self) -> Vec<P> {
        self.delete_halo();
        // phase 1: every thread collects the particles that left their cell
        let block = &self.block;
        let displaced: Vec<Vec<P>> = self
            .cells
            .par_iter_mut()
            .enumerate()
            .map(|(index, cell)| {
                let (lo, hi) = block.cell_bounding_box(index);
                cell.take_leavers(lo, hi)
            })
            .collect();
        // phase 2: serial re-insertion; particles outside the box are
        // returned to the caller
        let mut leavers = Vec::new();
        for p in displaced.into_iter().flatten() {
            if in_box(p.position(), self.domain.box_min, self.domain.box_max) {
                self.insert(p);
            } else {
                leavers.push(p);
            }
        }
        leavers
    }

    fn is_update_needed(&self) -> bool {
        self.cells.iter().enumerate().any(|(index, cell)| {
            let (lo, hi) = self.block.cell_bounding_box(index);
            cell.iter().any(|p| !in_box(p.position(), lo, hi))
        })
    }

    fn rebuild_neighbor_lists(&mut self, _newton3: bool) {}

    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P)) {
        for cell in &self.cells {
            for p in cell.particles() {
                if behavior.contains(p) {
                    f(p);
                }
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P)) {
        for cell in &mut self.cells {
            for p in cell.particles_mut() {
                if behavior.contains(p) {
                    f(p);
                }
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
        for cell_index in self.region_cells(lo, hi) {
            for p in self.cells[cell_index].particles() {
                if in_region(p, lo, hi, behavior) {
                    f(p);
                }
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
        for cell_index in self.region_cells(lo, hi) {
            for p in self.cells[cell_index].particles_mut() {
                if in_region(p, lo, hi, behavior) {
                    f(p);
                }
            }
        }
    }

    fn iterate_pairwise<F: PairwiseFunctor<P>>(
        &mut self,
        spec: &PairwiseSpec,
        functor: &F,
    ) -> Result<()> {
        if spec.layout == DataLayout::Soa {
            load_all_soa(&mut self.cells, functor);
        }
        let cell_functor = CellFunctor::new(functor, spec.layout, spec.newton3);
        match spec.traversal {
            TraversalKind::C08 => c08::traverse(&mut self.cells, &self.block, &cell_functor),
            TraversalKind::C18 => c18::traverse(&mut self.cells, &self.block, &cell_functor),
            TraversalKind::Sliced => sliced::traverse(
                &mut self.cells,
                &self.block,
                &cell_functor,
                crate::options::LoadEstimatorKind::None,
            ),
            TraversalKind::BalancedSliced => sliced::traverse(
                &mut self.cells,
                &self.block,
                &cell_functor,
                spec.load_estimator,
            ),
            _ => {
                return Err(AutoPairError::InvalidConfiguration(
                    unsupported_traversal_msg(ContainerKind::LinkedCells, spec),
                ))
            }
        }
        if spec.layout == DataLayout::Soa {
            extract_all_soa(&mut self.cells, functor);
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

    fn filled(n: usize) -> LinkedCells<PointMass> {
        let mut lc = LinkedCells::new(domain(), 1.0);
        for p in particles_fixture(n, 0.0, 10.0, 1) {
            lc.add(p).unwrap();
        }
        lc
    }

    #[test]
    fn test_particles_land_in_their_cell() {
        let lc = filled(200);
        for (index, cell) in lc.cells().iter().enumerate() {
            let (lo, hi) = lc.cell_block().cell_bounding_box(index);
            for p in cell.particles() {
                assert!(in_box(p.position(), lo, hi));
            }
        }
        assert_eq!(lc.num_particles(IteratorBehavior::Owned), 200);
    }

    #[test]
    fn test_update_moves_drifters_and_returns_leavers() {
        let mut lc = filled(100);
        // drift one particle to another cell, another out of the box
        lc.for_each_mut(IteratorBehavior::Owned, &mut |p| {
            if p.id() == 0 {
                p.set_position([5.0, 5.0, 5.0]);
            } else if p.id() == 1 {
                p.set_position([12.0, 5.0, 5.0]);
            }
        });
        assert!(lc.is_update_needed());
        let leavers = lc.update();
        assert_eq!(leavers.len(), 1);
        assert_eq!(leavers[0].id(), 1);
        assert_eq!(lc.num_particles(IteratorBehavior::Owned), 99);
        assert!(!lc.is_update_needed());
        // every retained particle sits in its cell again
        for (index, cell) in lc.cells().iter().enumerate() {
            let (lo, hi) = lc.cell_block().cell_bounding_box(index);
            for p in cell.particles() {
                assert!(in_box(p.position(), lo, hi));
            }
        }
    }

    #[test]
    fn test_halo_lifecycle() {
        let mut lc = LinkedCells::new(domain(), 1.0);
        lc.add_halo(PointMass::new([-0.3, 4.0, 4.0], [0.0; 3], 50))
            .unwrap();
        lc.add_halo(PointMass::new([10.4, 4.0, 4.0], [0.0; 3], 51))
            .unwrap();
        assert_eq!(lc.num_particles(IteratorBehavior::Halo), 2);
        let mut moved = PointMass::new([-0.25, 4.0, 4.0], [0.0; 3], 50);
        moved.set_ownership(Ownership::Halo);
        assert!(lc.update_halo(moved));
        lc.delete_halo();
        assert_eq!(lc.num_particles(IteratorBehavior::Halo), 0);
    }

    #[test]
    fn test_region_iteration_matches_brute_force() {
        let lc = filled(500);
        let lo = [2.0, 2.0, 2.0];
        let hi = [4.5, 4.5, 4.5];
        let mut via_region = Vec::new();
        lc.for_each_in_region(lo, hi, IteratorBehavior::Owned, &mut |p| {
            via_region.push(p.id())
        });
        let mut brute = Vec::new();
        lc.for_each(IteratorBehavior::Owned, &mut |p| {
            if crate::utils::math::in_box_closed(p.position(), lo, hi) {
                brute.push(p.id());
            }
        });
        via_region.sort_unstable();
        brute.sort_unstable();
        assert_eq!(via_region, brute);
        assert!(!brute.is_empty());
    }
}
