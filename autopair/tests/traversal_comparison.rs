//! Compares the forces of every (container, traversal, layout, newton3)
//! combination against the direct-sum reference.

use autopair::containers::compatible::compatible_traversals;
use autopair::containers::selector::AnyContainer;
use autopair::containers::{DomainInfo, PairwiseSpec, ParticleContainer};
use autopair::functors::lj::LjFunctor;
use autopair::options::{ContainerKind, DataLayout, IteratorBehavior, Newton3Kind, TraversalKind};
use autopair::traits::particle::{Particle, PointMass};
use autopair::utils::fixtures::particles_fixture;
use std::collections::HashMap;

const CUTOFF: f64 = 1.0;
const SKIN: f64 = 0.2;

fn domain() -> DomainInfo {
    DomainInfo {
        box_min: [0.0; 3],
        box_max: [10.0; 3],
        cutoff: CUTOFF,
        skin: SKIN,
    }
}

/// Forces per particle id after one pairwise iteration with the given setup.
fn forces_of(
    kind: ContainerKind,
    traversal: TraversalKind,
    layout: DataLayout,
    newton3: bool,
    particles: &[PointMass],
) -> HashMap<u64, [f64; 3]> {
    let mut container = AnyContainer::build(kind, domain(), 1.0);
    for p in particles {
        container.add(p.clone()).unwrap();
    }
    container.rebuild_neighbor_lists(newton3);
    let functor = LjFunctor::new(CUTOFF, 1.0, 1.0);
    container
        .iterate_pairwise(&PairwiseSpec::new(traversal, layout, newton3), &functor)
        .unwrap();

    let mut forces = HashMap::new();
    container.for_each(IteratorBehavior::Owned, &mut |p: &PointMass| {
        forces.insert(p.id(), p.force());
    });
    forces
}

fn max_relative_error(
    reference: &HashMap<u64, [f64; 3]>,
    candidate: &HashMap<u64, [f64; 3]>,
) -> f64 {
    assert_eq!(reference.len(), candidate.len());
    let mut worst: f64 = 0.0;
    for (id, expected) in reference {
        let got = candidate[id];
        for k in 0..3 {
            let scale = expected[k].abs().max(1.0);
            worst = worst.max((expected[k] - got[k]).abs() / scale);
        }
    }
    worst
}

#[test]
fn test_all_combinations_match_direct_sum() {
    let particles = particles_fixture(1000, 0.0, 10.0, 42);
    let reference = forces_of(
        ContainerKind::DirectSum,
        TraversalKind::DirectSumTraversal,
        DataLayout::Aos,
        true,
        &particles,
    );

    for kind in ContainerKind::ALL {
        for &traversal in compatible_traversals(kind) {
            for layout in [DataLayout::Aos, DataLayout::Soa] {
                if !autopair::containers::compatible::supports_layout(kind, layout) {
                    continue;
                }
                for newton3 in [true, false] {
                    let candidate = forces_of(kind, traversal, layout, newton3, &particles);
                    let error = max_relative_error(&reference, &candidate);
                    assert!(
                        error <= 1.5e-12,
                        "forces diverge for ({kind}, {traversal}, {layout}, newton3 {newton3}): \
                         max relative error {error:e}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_cluster_lists_match_direct_sum_small_system() {
    let particles = particles_fixture(500, 0.0, 10.0, 7);
    let reference = forces_of(
        ContainerKind::DirectSum,
        TraversalKind::DirectSumTraversal,
        DataLayout::Aos,
        true,
        &particles,
    );
    let candidate = forces_of(
        ContainerKind::VerletClusterLists,
        TraversalKind::ClusterTraversal,
        DataLayout::Aos,
        true,
        &particles,
    );
    assert!(max_relative_error(&reference, &candidate) <= 1e-12);
}

#[test]
fn test_newton3_force_sum_is_zero() {
    // without halo particles every interaction is internal, so the total
    // force cancels to machine precision under Newton-3
    let particles = particles_fixture(800, 0.0, 10.0, 3);
    for (kind, traversal) in [
        (ContainerKind::LinkedCells, TraversalKind::C08),
        (ContainerKind::LinkedCells, TraversalKind::Sliced),
        (ContainerKind::VerletLists, TraversalKind::VerletTraversal),
        (
            ContainerKind::VerletClusterLists,
            TraversalKind::ClusterTraversal,
        ),
    ] {
        let forces = forces_of(kind, traversal, DataLayout::Aos, true, &particles);
        let mut total = [0.0f64; 3];
        for f in forces.values() {
            for k in 0..3 {
                total[k] += f[k];
            }
        }
        for component in total {
            assert!(
                component.abs() < 1e-9,
                "net force {component:e} under ({kind}, {traversal})"
            );
        }
    }
}

#[test]
fn test_halo_particles_contribute_to_owned_forces() {
    // one owned particle near the face, one halo particle just outside
    let owned = PointMass::new([9.8, 5.0, 5.0], [0.0; 3], 0);
    let halo = PointMass::new([10.3, 5.0, 5.0], [0.0; 3], 1);

    for kind in [
        ContainerKind::DirectSum,
        ContainerKind::LinkedCells,
        ContainerKind::VerletLists,
    ] {
        let mut container = AnyContainer::build(kind, domain(), 1.0);
        container.add(owned.clone()).unwrap();
        container.add_halo(halo.clone()).unwrap();
        container.rebuild_neighbor_lists(true);
        let functor = LjFunctor::new(CUTOFF, 1.0, 1.0);
        let traversal = compatible_traversals(kind)[0];
        container
            .iterate_pairwise(&PairwiseSpec::new(traversal, DataLayout::Aos, true), &functor)
            .unwrap();
        let mut force_on_owned = [0.0; 3];
        container.for_each(IteratorBehavior::Owned, &mut |p: &PointMass| {
            force_on_owned = p.force();
        });
        assert!(
            force_on_owned[0] != 0.0,
            "halo neighbor exerted no force under {kind}"
        );
    }
}
