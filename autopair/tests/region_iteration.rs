//! Region iteration around a domain corner, checked against a brute-force
//! filter over all particles.

use autopair::containers::selector::AnyContainer;
use autopair::containers::{DomainInfo, ParticleContainer};
use autopair::options::{ContainerKind, IteratorBehavior};
use autopair::traits::particle::{Particle, PointMass};
use autopair::utils::math::in_box_closed;

fn domain() -> DomainInfo {
    DomainInfo {
        box_min: [0.0; 3],
        box_max: [10.0; 3],
        cutoff: 1.0,
        skin: 0.2,
    }
}

/// Particles straddling the lower domain corner: owned just inside every
/// face, halo just outside, both inside and outside the search box.
fn fill_around_corner(container: &mut AnyContainer<PointMass>) -> Vec<PointMass> {
    let mut all = Vec::new();
    let mut id = 0u64;
    let offsets = [-2.5, -0.4, -0.05, 0.05, 0.4, 2.5, 5.0];
    for &x in &offsets {
        for &y in &offsets {
            for &z in &offsets {
                let r = [x, y, z];
                let p = PointMass::new(r, [0.0; 3], id);
                id += 1;
                if autopair::utils::math::in_box(r, domain().box_min, domain().box_max) {
                    container.add(p.clone()).unwrap();
                } else {
                    // keep the halo shell within one interaction length
                    if r.iter().any(|&c| c < -1.2 || c > 11.2) {
                        continue;
                    }
                    container.add_halo(p.clone()).unwrap();
                }
                all.push(p);
            }
        }
    }
    all
}

fn region_ids(
    container: &AnyContainer<PointMass>,
    lo: [f64; 3],
    hi: [f64; 3],
    behavior: IteratorBehavior,
) -> Vec<u64> {
    let mut ids = Vec::new();
    container.for_each_in_region(lo, hi, behavior, &mut |p: &PointMass| ids.push(p.id()));
    ids.sort_unstable();
    ids
}

#[test]
fn test_region_around_corner_matches_brute_force() {
    // a search box straddling the lower corner of the domain
    let lo = [-3.0, -3.0, -3.0];
    let hi = [3.0, 3.0, 3.0];

    for kind in [
        ContainerKind::DirectSum,
        ContainerKind::LinkedCells,
        ContainerKind::ReferenceLinkedCells,
        ContainerKind::VerletLists,
        ContainerKind::VerletClusterLists,
    ] {
        let mut container = AnyContainer::build(kind, domain(), 1.0);
        let all = fill_around_corner(&mut container);

        for behavior in [
            IteratorBehavior::Owned,
            IteratorBehavior::Halo,
            IteratorBehavior::OwnedOrHalo,
        ] {
            let mut expected: Vec<u64> = all
                .iter()
                .filter(|p| {
                    let inside_domain =
                        autopair::utils::math::in_box(p.position(), domain().box_min, domain().box_max);
                    let halo_kept = !inside_domain
                        && p.position().iter().all(|&c| (-1.2..=11.2).contains(&c));
                    let present = inside_domain || halo_kept;
                    let matches_behavior = match behavior {
                        IteratorBehavior::Owned => inside_domain,
                        IteratorBehavior::Halo => !inside_domain,
                        _ => true,
                    };
                    present && matches_behavior && in_box_closed(p.position(), lo, hi)
                })
                .map(|p| p.id())
                .collect();
            expected.sort_unstable();

            let got = region_ids(&container, lo, hi, behavior);
            assert_eq!(
                got, expected,
                "region census diverges for {kind} with behavior {behavior}"
            );
            if behavior == IteratorBehavior::OwnedOrHalo {
                assert!(!expected.is_empty());
            }
        }
    }
}

#[test]
fn test_full_census_counts() {
    for kind in ContainerKind::ALL {
        let mut container = AnyContainer::build(kind, domain(), 1.0);
        let all = fill_around_corner(&mut container);
        let owned = all
            .iter()
            .filter(|p| autopair::utils::math::in_box(p.position(), domain().box_min, domain().box_max))
            .count();
        let halo = all.len() - owned;
        assert_eq!(container.num_particles(IteratorBehavior::Owned), owned);
        assert_eq!(container.num_particles(IteratorBehavior::Halo), halo);
        assert_eq!(
            container.num_particles(IteratorBehavior::OwnedOrHalo),
            all.len()
        );
    }
}
