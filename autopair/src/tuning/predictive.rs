//! Prediction-guided tuning.
//!
//! The strategy retains the measurement history of every configuration
//! across tuning phases. At the start of a phase it extrapolates each
//! configuration's next time by placing a line through its two most recent
//! samples and only tests the configurations predicted to be within a
//! relative range of the best prediction, plus any configuration that has
//! not been tested for too many phases.

use crate::options::Newton3Kind;
use crate::traits::tuning::TuningStrategy;
use crate::traits::types::{AutoPairError, Result};
use crate::tuning::configuration::Configuration;
use std::collections::HashMap;

/// Tuning strategy with line-extrapolated runtime predictions.
#[derive(Debug)]
pub struct PredictiveTuning {
    search_space: Vec<Configuration>,
    /// Samples per configuration as (iteration, time) pairs, kept across
    /// phases.
    traversal_times: HashMap<Configuration, Vec<(usize, u64)>>,
    predictions: HashMap<Configuration, u64>,
    /// Last tuning phase each configuration was tested in.
    last_test: HashMap<Configuration, usize>,
    /// Configurations to test this phase, optimal candidates first, then the
    /// too-long-untested ones.
    test_queue: Vec<Configuration>,
    /// Number of entries at the head of `test_queue` that stem from the
    /// optimal candidate set.
    num_optimal_candidates: usize,
    queue_position: usize,
    valid_configuration_found: bool,
    committed: Option<Configuration>,
    tuning_phase_counter: usize,
    iteration_begin_phase: usize,
    relative_optimum_range: f64,
    max_tuning_phases_without_test: usize,
}

impl PredictiveTuning {
    /// Strategy over an already-enumerated search space.
    ///
    /// # Arguments
    /// * `search_space` - The configurations to choose from.
    /// * `relative_optimum_range` - Configurations whose prediction lies
    ///   within this factor of the best prediction are tested.
    /// * `max_tuning_phases_without_test` - A configuration untested for
    ///   more than this many phases is re-tested.
    pub fn new(
        search_space: Vec<Configuration>,
        relative_optimum_range: f64,
        max_tuning_phases_without_test: usize,
    ) -> Result<Self> {
        if search_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(
                "predictive tuning over an empty configuration space".into(),
            ));
        }
        let traversal_times = search_space.iter().map(|c| (*c, Vec::new())).collect();
        Ok(Self {
            search_space,
            traversal_times,
            predictions: HashMap::new(),
            last_test: HashMap::new(),
            test_queue: Vec::new(),
            num_optimal_candidates: 0,
            queue_position: 0,
            valid_configuration_found: false,
            committed: None,
            tuning_phase_counter: 0,
            iteration_begin_phase: 0,
            relative_optimum_range,
            max_tuning_phases_without_test,
        })
    }

    /// The configurations queued for testing in the current phase.
    pub fn candidate_set(&self) -> &[Configuration] {
        &self.test_queue
    }

    /// Completed tuning phases.
    pub fn tuning_phase(&self) -> usize {
        self.tuning_phase_counter
    }

    /// Predict each configuration's next time by a line through its last two
    /// samples.
    fn calculate_predictions(&mut self) {
        self.predictions.clear();
        for config in &self.search_space {
            let samples = &self.traversal_times[config];
            if samples.len() < 2 {
                continue;
            }
            let (i1, t1) = samples[samples.len() - 1];
            let (i2, t2) = samples[samples.len() - 2];
            let gradient = (t1 as i64 - t2 as i64) / (i1 as i64 - i2 as i64).max(1);
            let delta = self.iteration_begin_phase as i64 - i1 as i64;
            let prediction = (t1 as i64 + gradient * delta).max(0) as u64;
            self.predictions.insert(*config, prediction);
        }
    }

    /// Build the test queue for a new phase.
    fn select_optimal_search_space(&mut self) -> Result<()> {
        self.test_queue.clear();
        self.num_optimal_candidates = 0;
        self.queue_position = 0;

        if self.search_space.len() == 1 || self.tuning_phase_counter < 2 {
            self.test_queue = self.search_space.clone();
            self.num_optimal_candidates = self.test_queue.len();
            return Ok(());
        }

        self.calculate_predictions();

        let best = self
            .predictions
            .iter()
            .min_by_key(|&(config, &pred)| (pred, *config))
            .map(|(_, &pred)| pred)
            .ok_or_else(|| {
                AutoPairError::Tuning("no configuration prediction could be made".into())
            })?;

        let mut optimal = Vec::new();
        let mut too_long = Vec::new();
        for config in &self.search_space {
            match self.predictions.get(config) {
                Some(&pred) if pred as f64 / best.max(1) as f64 <= self.relative_optimum_range => {
                    optimal.push(*config);
                }
                Some(_) => {
                    let last = self.last_test.get(config).copied().unwrap_or(0);
                    if self.tuning_phase_counter - last > self.max_tuning_phases_without_test {
                        too_long.push(*config);
                    }
                }
                // never measured twice yet, needs testing
                None => optimal.push(*config),
            }
        }

        if optimal.is_empty() {
            return Err(AutoPairError::Tuning(
                "no possible configuration prediction found".into(),
            ));
        }
        self.num_optimal_candidates = optimal.len();
        self.test_queue = optimal;
        self.test_queue.extend(too_long);
        Ok(())
    }

    /// Rebuild the queue from configurations not yet found invalid after the
    /// whole candidate set failed to run.
    fn reselect_optimal_search_space(&mut self) -> Result<()> {
        let invalid: Vec<Configuration> = self.test_queue[..self.num_optimal_candidates].to_vec();
        for config in &invalid {
            self.predictions.remove(config);
        }
        let valid: Vec<Configuration> = self
            .search_space
            .iter()
            .filter(|c| !invalid.contains(c))
            .copied()
            .collect();

        if valid.is_empty() || self.predictions.is_empty() {
            return Err(AutoPairError::Tuning(
                "no valid configuration could be found".into(),
            ));
        }

        let best = self
            .predictions
            .iter()
            .filter(|&(config, _)| valid.contains(config))
            .min_by_key(|&(config, &pred)| (pred, *config))
            .map(|(_, &pred)| pred)
            .ok_or_else(|| {
                AutoPairError::Tuning("no valid optimal configuration could be found".into())
            })?;

        let optimal: Vec<Configuration> = valid
            .iter()
            .filter(|config| match self.predictions.get(config) {
                Some(&pred) => pred as f64 / best.max(1) as f64 <= self.relative_optimum_range,
                None => false,
            })
            .copied()
            .collect();

        if optimal.is_empty() {
            return Err(AutoPairError::Tuning(
                "no possible configuration prediction found".into(),
            ));
        }
        self.num_optimal_candidates = optimal.len();
        self.test_queue = optimal;
        self.queue_position = 0;
        Ok(())
    }

    /// Commit the fastest configuration measured in this phase.
    fn select_optimal_configuration(&mut self) -> Result<()> {
        let mut measured: Vec<(Configuration, u64)> = Vec::new();
        for config in &self.test_queue {
            if let Some(&(iteration, time)) =
                self.traversal_times.get(config).and_then(|v| v.last())
            {
                if iteration >= self.iteration_begin_phase {
                    measured.push((*config, time));
                }
            }
        }
        if measured.is_empty() {
            return Err(AutoPairError::Tuning(
                "trying to determine the fastest configuration without any measurements; \
                 either the selection ran too early or no applicable configuration was found"
                    .into(),
            ));
        }
        let best = measured
            .iter()
            .min_by_key(|(config, time)| (*time, *config))
            .map(|(config, _)| *config);
        self.committed = best;
        if let Some(config) = best {
            tracing::debug!(%config, "selected configuration");
        }
        Ok(())
    }
}

impl TuningStrategy for PredictiveTuning {
    fn current_configuration(&self) -> Configuration {
        if let Some(config) = self.committed {
            return config;
        }
        self.test_queue
            .get(self.queue_position)
            .copied()
            .unwrap_or(self.search_space[0])
    }

    fn tune(&mut self, last_was_invalid: bool) -> Result<bool> {
        if !last_was_invalid {
            self.valid_configuration_found = true;
        }
        self.queue_position += 1;
        if self.queue_position < self.test_queue.len() {
            return Ok(true);
        }
        if self.valid_configuration_found {
            self.select_optimal_configuration()?;
            self.tuning_phase_counter += 1;
            Ok(false)
        } else {
            self.reselect_optimal_search_space()?;
            Ok(true)
        }
    }

    fn add_evidence(&mut self, time_ns: u64, iteration: usize) {
        let config = self.current_configuration();
        self.traversal_times
            .entry(config)
            .or_default()
            .push((iteration, time_ns));
        self.last_test.insert(config, self.tuning_phase_counter);
    }

    fn remove_newton3_option(&mut self, option: Newton3Kind) -> Result<()> {
        self.search_space.retain(|c| c.newton3 != option);
        if self.search_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "removing every configuration with newton3 {option} emptied the search space"
            )));
        }
        if self
            .committed
            .map(|c| c.newton3 == option)
            .unwrap_or(false)
        {
            self.committed = None;
        }
        let current = self.current_configuration();
        self.test_queue.retain(|c| c.newton3 != option);
        self.num_optimal_candidates = self.num_optimal_candidates.min(self.test_queue.len());
        self.queue_position = self
            .test_queue
            .iter()
            .position(|c| *c >= current)
            .unwrap_or(self.test_queue.len().saturating_sub(1));
        Ok(())
    }

    fn reset(&mut self, iteration: usize) -> Result<()> {
        self.predictions.clear();
        self.committed = None;
        self.valid_configuration_found = false;
        self.iteration_begin_phase = iteration;
        self.select_optimal_search_space()
    }

    fn search_space_is_trivial(&self) -> bool {
        self.search_space.len() == 1
    }

    fn search_space_is_empty(&self) -> bool {
        self.search_space.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::{ContainerKind, DataLayout, TraversalKind};
    use crate::tuning::configuration::enumerate_search_space;

    fn space() -> Vec<Configuration> {
        enumerate_search_space(
            &[ContainerKind::LinkedCells],
            &[1.0],
            &[
                TraversalKind::C08,
                TraversalKind::C18,
                TraversalKind::Sliced,
                TraversalKind::BalancedSliced,
            ],
            &[DataLayout::Aos],
            &[Newton3Kind::Enabled],
        )
    }

    /// Run one full phase where `time_of` assigns each configuration its
    /// measurement.
    fn run_phase(pt: &mut PredictiveTuning, iteration: &mut usize, time_of: impl Fn(&Configuration) -> u64) {
        pt.reset(*iteration).unwrap();
        loop {
            let config = pt.current_configuration();
            pt.add_evidence(time_of(&config), *iteration);
            *iteration += 1;
            if !pt.tune(false).unwrap() {
                break;
            }
        }
    }

    #[test]
    fn test_early_phases_test_everything() {
        let space = space();
        let mut pt = PredictiveTuning::new(space.clone(), 1.2, 5).unwrap();
        let mut iteration = 0;
        run_phase(&mut pt, &mut iteration, |_| 100);
        assert_eq!(pt.tuning_phase(), 1);
        run_phase(&mut pt, &mut iteration, |_| 100);
        // first two phases enqueue the whole space
        assert_eq!(pt.candidate_set().len(), space.len());
    }

    #[test]
    fn test_candidate_set_is_prediction_range_union_untested() {
        let space = space();
        let mut pt = PredictiveTuning::new(space.clone(), 1.2, 5).unwrap();
        let mut iteration = 0;
        // flat histories: space[0] stays fast, space[1] just inside the
        // relative range, the rest far outside
        let time_of = |c: &Configuration| {
            if *c == space[0] {
                1000
            } else if *c == space[1] {
                1100
            } else {
                5000
            }
        };
        run_phase(&mut pt, &mut iteration, time_of);
        run_phase(&mut pt, &mut iteration, time_of);
        // predictions now exist; phase 3 only tests the near-optimal set
        pt.reset(iteration).unwrap();
        let candidates = pt.candidate_set().to_vec();
        assert!(candidates.contains(&space[0]));
        assert!(candidates.contains(&space[1]));
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_long_untested_configuration_returns() {
        let space = space();
        let max_phases = 2;
        let mut pt = PredictiveTuning::new(space.clone(), 1.1, max_phases).unwrap();
        let mut iteration = 0;
        let time_of = |c: &Configuration| if *c == space[0] { 1000 } else { 5000 };
        run_phase(&mut pt, &mut iteration, time_of);
        run_phase(&mut pt, &mut iteration, time_of);
        // slow configurations now drop out of the tested set
        for _ in 0..max_phases {
            run_phase(&mut pt, &mut iteration, time_of);
            assert_eq!(pt.candidate_set().len(), 1);
        }
        // one more phase pushes the slow configurations past the limit
        pt.reset(iteration).unwrap();
        assert!(pt.candidate_set().len() > 1, "stale configurations must re-enter");
    }

    #[test]
    fn test_all_invalid_triggers_reselection() {
        let space = space();
        let mut pt = PredictiveTuning::new(space.clone(), 1.1, 5).unwrap();
        let mut iteration = 0;
        let time_of = |c: &Configuration| if *c == space[0] { 1000 } else { 2000 };
        run_phase(&mut pt, &mut iteration, time_of);
        run_phase(&mut pt, &mut iteration, time_of);
        pt.reset(iteration).unwrap();
        let first_queue = pt.candidate_set().to_vec();
        assert_eq!(first_queue.len(), 1);
        // the sole candidate turns out invalid; the strategy re-derives a
        // candidate set from the remaining valid configurations
        let more = pt.tune(true).unwrap();
        assert!(more);
        assert!(!pt.candidate_set().contains(&first_queue[0]));
    }
}
