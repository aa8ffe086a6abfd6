//! # autopair
//!
//! A node-level library for short-range pairwise particle interactions
//! (molecular dynamics, SPH, gravity). Given particles in a 3D box, a cutoff
//! radius and a user supplied pair kernel, `autopair` delivers every particle
//! pair closer than the cutoff to the kernel, efficiently, on shared-memory
//! hardware.
//!
//! Notable features of this library are:
//! * Interchangeable spatial containers (direct sum, linked cells, Verlet
//!   lists, Verlet cluster lists) behind one contract.
//! * Interchangeable cell traversals (c08, c18, sliced, balanced sliced,
//!   cluster, direct) that are safe with and without Newton's third law.
//! * Array-of-structures and structure-of-arrays data layouts with
//!   functor-driven conversion.
//! * A runtime auto-tuner that explores the configuration product and commits
//!   to a fast configuration, with exhaustive, predictive, Bayesian and
//!   (optionally, behind the `mpi` feature) rank-partitioned search
//!   strategies.
//!
//! The crate does not know what a force is. It orchestrates the delivery of
//! candidate pairs to a [`PairwiseFunctor`](traits::functor::PairwiseFunctor)
//! implemented by the user; a reference Lennard-Jones functor ships in
//! [`functors::lj`].
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod auto_pair;
pub mod cell;
pub mod containers;
pub mod functors;
pub mod grid;
pub mod iterators;
pub mod md;
pub mod options;
pub mod send_ptr;
pub mod soa;
pub mod traits;
pub mod traversals;
pub mod tuning;
pub mod utils;

// Public API
#[doc(inline)]
pub use auto_pair::{AutoPair, AutoPairBuilder};
#[doc(inline)]
pub use options::{ContainerKind, DataLayout, IteratorBehavior, Newton3Kind, TraversalKind};
#[doc(inline)]
pub use traits::functor::PairwiseFunctor;
#[doc(inline)]
pub use traits::particle::{Ownership, Particle, PointMass};
#[doc(inline)]
pub use traits::types::{AutoPairError, Result};
#[doc(inline)]
pub use tuning::configuration::Configuration;
