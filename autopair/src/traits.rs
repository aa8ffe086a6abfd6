//! Capability contracts consumed and exposed by the engine.

pub mod functor;
pub mod particle;
pub mod tuning;
pub mod types;
