//! The tuning strategy interface.

use crate::options::Newton3Kind;
use crate::traits::types::Result;
use crate::tuning::configuration::Configuration;

/// Interface of a runtime tuning strategy.
///
/// The façade drives a strategy through one tuning phase: it measures the
/// strategy's current configuration, feeds the reduced sample back through
/// [`add_evidence`](TuningStrategy::add_evidence), and advances with
/// [`tune`](TuningStrategy::tune) until the strategy reports that nothing is
/// left to try, at which point the current configuration is the committed
/// optimum.
pub trait TuningStrategy {
    /// The configuration to measure next, or the committed optimum once
    /// tuning finished.
    fn current_configuration(&self) -> Configuration;

    /// Advance to the next configuration to test.
    ///
    /// `last_was_invalid` marks the previous configuration as not runnable
    /// (e.g. the traversal turned out inapplicable at current geometry); the
    /// strategy skips its sample.
    ///
    /// Returns `true` while more configurations are to be measured, `false`
    /// once the optimum has been selected.
    fn tune(&mut self, last_was_invalid: bool) -> Result<bool>;

    /// Record the reduced measurement for the current configuration.
    fn add_evidence(&mut self, time_ns: u64, iteration: usize);

    /// Drop every configuration with the given Newton-3 option, e.g. after a
    /// functor refused it.
    ///
    /// # Errors
    /// Fails if the removal empties the search space.
    fn remove_newton3_option(&mut self, option: Newton3Kind) -> Result<()>;

    /// Start a new tuning phase at the given iteration.
    fn reset(&mut self, iteration: usize) -> Result<()>;

    /// Whether only one configuration exists.
    fn search_space_is_trivial(&self) -> bool;

    /// Whether no configuration exists.
    fn search_space_is_empty(&self) -> bool;
}
