//! The Verlet-list container.

use crate::containers::{
    halo_inside_box_msg, owned_outside_box_msg, unsupported_traversal_msg, DomainInfo,
    PairwiseSpec, ParticleContainer,
};
use crate::grid::CellBlock3d;
use crate::iterators::in_region;
use crate::options::{ContainerKind, DataLayout, IteratorBehavior, TraversalKind};
use crate::soa::SoaBuffer;
use crate::traits::functor::PairwiseFunctor;
use crate::traits::particle::{Ownership, Particle};
use crate::traits::types::{AutoPairError, Result};
use crate::traversals::verlet;
use crate::utils::math::{dist_sq, in_box};

/// Per-particle neighbor lists built over a linked-cells binning.
///
/// A list built with skin `s` stays valid while no particle drifts farther
/// than `s/2` from its build-time position; the container tracks those
/// positions and reports staleness through
/// [`is_update_needed`](ParticleContainer::is_update_needed). Between
/// rebuilds the particles are not repartitioned; interactions use the stored
/// lists.
#[derive(Debug)]
pub struct VerletLists<P> {
    domain: DomainInfo,
    /// Owned and halo particles, flat; neighbor lists index into this.
    particles: Vec<P>,
    neighbor_lists: Vec<Vec<usize>>,
    rebuild_positions: Vec<[f64; 3]>,
    lists_newton3: bool,
    lists_valid: bool,
    soa: SoaBuffer,
}

impl<P: Particle> VerletLists<P> {
    /// Fresh container over the given domain.
    pub fn new(domain: DomainInfo) -> Self {
        Self {
            domain,
            particles: Vec::new(),
            neighbor_lists: Vec::new(),
            rebuild_positions: Vec::new(),
            lists_newton3: false,
            lists_valid: false,
            soa: SoaBuffer::default(),
        }
    }

    /// Whether the stored lists were built for Newton-3 interaction.
    pub fn lists_are_newton3(&self) -> bool {
        self.lists_newton3
    }

    /// Whether the stored lists are valid for the current particle set.
    pub fn lists_are_valid(&self) -> bool {
        self.lists_valid
    }

    /// The stored neighbor lists, indexed like the flat particle storage.
    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        &self.neighbor_lists
    }

    /// Largest drift of any particle since the last rebuild.
    fn max_drift_sq(&self) -> f64 {
        self.particles
            .iter()
            .zip(self.rebuild_positions.iter())
            .map(|(p, r)| dist_sq(p.position(), *r))
            .fold(0.0, f64::max)
    }

    fn build_lists(&mut self, newton3: bool) {
        let interaction_sq = self.domain.interaction_length() * self.domain.interaction_length();
        let n = self.particles.len();
        self.neighbor_lists = vec![Vec::new(); n];
        self.rebuild_positions = self.particles.iter().map(|p| p.position()).collect();

        // bin indices into a linked-cells grid, then only neighboring bins
        // need pair checks
        let block = CellBlock3d::new(
            self.domain.box_min,
            self.domain.box_max,
            self.domain.interaction_length(),
            1.0,
        );
        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); block.num_cells()];
        for (index, p) in self.particles.iter().enumerate() {
            bins[block.index_of_position(p.position())].push(index);
        }

        let dims = block.cells_per_dim();
        let mut record = |i: usize, j: usize| {
            let too_far = dist_sq(
                self.rebuild_positions[i],
                self.rebuild_positions[j],
            ) > interaction_sq;
            if too_far {
                return;
            }
            if newton3 {
                self.neighbor_lists[i].push(j);
            } else {
                self.neighbor_lists[i].push(j);
                self.neighbor_lists[j].push(i);
            }
        };

        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let cell = block.three_to_one([x, y, z]);
                    // pairs within the bin
                    for (a, &i) in bins[cell].iter().enumerate() {
                        for &j in &bins[cell][a + 1..] {
                            record(i, j);
                        }
                    }
                    // pairs against forward-neighbor bins
                    for d in crate::traversals::c18::forward_neighbors() {
                        let nx = x as i64 + d[0];
                        let ny = y as i64 + d[1];
                        let nz = z as i64 + d[2];
                        if nx < 0
                            || ny < 0
                            || nz < 0
                            || nx >= dims[0] as i64
                            || ny >= dims[1] as i64
                            || nz >= dims[2] as i64
                        {
                            continue;
                        }
                        let neighbor = block.three_to_one([nx as usize, ny as usize, nz as usize]);
                        for &i in &bins[cell] {
                            for &j in &bins[neighbor] {
                                record(i, j);
                            }
                        }
                    }
                }
            }
        }

        self.lists_newton3 = newton3;
        self.lists_valid = true;
        tracing::debug!(
            particles = n,
            pairs = self.neighbor_lists.iter().map(Vec::len).sum::<usize>(),
            newton3,
            "rebuilt neighbor lists"
        );
    }
}

impl<P: Particle> ParticleContainer<P> for VerletLists<P> {
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
        self.particles.push(p);
        self.lists_valid = false;
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
        self.particles.push(p);
        self.lists_valid = false;
        Ok(())
    }

    fn update_halo(&mut self, p: P) -> bool {
        for stored in &mut self.particles {
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
        let before = self.particles.len();
        self.particles.retain(|p| !p.is_halo());
        if self.particles.len() != before {
            self.lists_valid = false;
        }
    }

    fn update(&mut self) -> Vec<P> {
        self.delete_halo();
        let mut kept = Vec::with_capacity(self.particles.len());
        let mut leavers = Vec::new();
        for p in self.particles.drain(..) {
            if p.is_dummy() {
                continue;
            }
            if in_box(p.position(), self.domain.box_min, self.domain.box_max) {
                kept.push(p);
            } else {
                leavers.push(p);
            }
        }
        self.particles = kept;
        self.lists_valid = false;
        leavers
    }

    fn is_update_needed(&self) -> bool {
        if !self.lists_valid || self.particles.len() != self.rebuild_positions.len() {
            return true;
        }
        let half_skin = self.domain.skin / 2.0;
        self.max_drift_sq() > half_skin * half_skin
    }

    fn rebuild_neighbor_lists(&mut self, newton3: bool) {
        // idempotent when nothing moved
        self.build_lists(newton3);
    }

    fn for_each(&self, behavior: IteratorBehavior, f: &mut dyn FnMut(&P)) {
        for p in &self.particles {
            if behavior.contains(p) {
                f(p);
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, f: &mut dyn FnMut(&mut P)) {
        for p in &mut self.particles {
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
        for p in &self.particles {
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
        for p in &mut self.particles {
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
        if spec.traversal != TraversalKind::VerletTraversal {
            return Err(AutoPairError::InvalidConfiguration(
                unsupported_traversal_msg(ContainerKind::VerletLists, spec),
            ));
        }
        // lazy rebuild: on stale lists or a Newton-3 mode the lists were not
        // built for
        if !self.lists_valid || self.lists_newton3 != spec.newton3 {
            self.build_lists(spec.newton3);
        }
        match spec.layout {
            DataLayout::Aos => verlet::traverse_aos(
                &mut self.particles,
                &self.neighbor_lists,
                functor,
                spec.newton3,
            ),
            DataLayout::Soa => {
                self.soa.load(&self.particles, functor.needed_attributes());
                verlet::traverse_soa(&mut self.soa, &self.neighbor_lists, functor, spec.newton3);
                self.soa
                    .extract(&mut self.particles, functor.computed_attributes());
            }
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

    fn filled(n: usize, seed: u64) -> VerletLists<PointMass> {
        let mut vl = VerletLists::new(domain());
        for p in particles_fixture(n, 0.0, 10.0, seed) {
            vl.add(p).unwrap();
        }
        vl
    }

    #[test]
    fn test_lists_cover_every_close_pair() {
        let mut vl = filled(300, 7);
        vl.rebuild_neighbor_lists(true);
        let il_sq = domain().interaction_length().powi(2);
        // brute force reference
        let mut expected = 0usize;
        for i in 0..vl.particles.len() {
            for j in (i + 1)..vl.particles.len() {
                if dist_sq(vl.particles[i].position(), vl.particles[j].position()) <= il_sq {
                    expected += 1;
                }
            }
        }
        let stored: usize = vl.neighbor_lists().iter().map(Vec::len).sum();
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_non_newton3_lists_store_both_directions() {
        let mut vl = filled(100, 8);
        vl.rebuild_neighbor_lists(true);
        let once: usize = vl.neighbor_lists().iter().map(Vec::len).sum();
        vl.rebuild_neighbor_lists(false);
        let twice: usize = vl.neighbor_lists().iter().map(Vec::len).sum();
        assert_eq!(twice, 2 * once);
    }

    #[test]
    fn test_rebuild_is_idempotent_without_motion() {
        let mut vl = filled(100, 9);
        vl.rebuild_neighbor_lists(true);
        let first = vl.neighbor_lists().to_vec();
        vl.rebuild_neighbor_lists(true);
        assert_eq!(first, vl.neighbor_lists());
    }

    #[test]
    fn test_drift_gates_staleness_at_half_skin() {
        let mut vl = filled(50, 10);
        vl.rebuild_neighbor_lists(true);
        assert!(!vl.is_update_needed());
        // drift below skin/2 keeps the lists valid
        vl.particles[0].r[0] += 0.09;
        assert!(!vl.is_update_needed());
        // crossing skin/2 invalidates
        vl.particles[0].r[0] += 0.02;
        assert!(vl.is_update_needed());
    }
}
