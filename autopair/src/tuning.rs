//! Runtime configuration search.

pub mod bayesian;
pub mod configuration;
pub mod full_search;
#[cfg(feature = "mpi")]
pub mod full_search_mpi;
pub mod gaussian_process;
pub mod predictive;
