//! Reference pair kernels and kernel helpers.

pub mod counting;
pub mod empty;
pub mod flop_counter;
pub mod lj;
pub mod properties;
