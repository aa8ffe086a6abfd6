//! Demonstrates the rank-partitioned full search.
//!
//! Run with e.g. `mpirun -n 2 cargo run --features mpi --example mpi_full_search`.
//! Every rank measures its block of a four-element search space; after the
//! non-blocking barrier completes, the globally fastest configuration is
//! elected and broadcast, and all ranks print the identical tuple.

use autopair::functors::lj::LjFunctor;
use autopair::options::{ContainerKind, DataLayout, Newton3Kind, TraversalKind};
use autopair::traits::particle::PointMass;
use autopair::tuning::configuration::enumerate_search_space;
use autopair::tuning::full_search_mpi::FullSearchMpi;
use autopair::AutoPair;
use mpi::traits::Communicator;

fn main() {
    let universe = mpi::initialize().expect("failed to initialize MPI");
    let world = universe.world();
    let rank = world.rank();

    // a four-element space: {c08, c18} x {AoS, SoA}, Newton-3 on
    let space = enumerate_search_space(
        &[ContainerKind::LinkedCells],
        &[1.0],
        &[TraversalKind::C08, TraversalKind::C18],
        &[DataLayout::Aos, DataLayout::Soa],
        &[Newton3Kind::Enabled],
    );
    assert_eq!(space.len(), 4);

    let strategy = FullSearchMpi::new(world, space).expect("non-empty search space");

    let mut engine: AutoPair<PointMass> = AutoPair::builder()
        .box_min([0.0; 3])
        .box_max([10.0; 3])
        .cutoff(1.0)
        .verlet_skin(0.2)
        .num_samples(2)
        .with_strategy(Box::new(strategy))
        .build()
        .expect("engine construction");

    for p in autopair::utils::fixtures::particles_fixture(2000, 0.0, 10.0, 1) {
        engine.add_particle(p).expect("particle inside the box");
    }

    let functor = LjFunctor::new(1.0, 1.0, 1.0);
    let mut iterations = 0usize;
    while engine.iterate_pairwise(&functor).expect("pairwise iteration") {
        iterations += 1;
        assert!(iterations < 10_000, "tuning must converge");
    }

    println!(
        "rank {}: committed configuration {} after {} tuning iterations",
        rank,
        engine.current_configuration(),
        iterations
    );
}
