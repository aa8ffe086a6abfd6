//! Exhaustive search over the filtered configuration product.

use crate::options::Newton3Kind;
use crate::traits::tuning::TuningStrategy;
use crate::traits::types::{AutoPairError, Result};
use crate::tuning::configuration::Configuration;
use std::collections::HashMap;

/// Tests every configuration of the search space and selects the one with
/// the minimal reduced measurement.
#[derive(Debug)]
pub struct FullSearch {
    search_space: Vec<Configuration>,
    current: usize,
    traversal_times: HashMap<Configuration, u64>,
    optimum: Option<Configuration>,
}

impl FullSearch {
    /// Strategy over an already-enumerated search space.
    ///
    /// # Errors
    /// Fails if the space is empty.
    pub fn new(search_space: Vec<Configuration>) -> Result<Self> {
        if search_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(
                "full search over an empty configuration space".into(),
            ));
        }
        Ok(Self {
            search_space,
            current: 0,
            traversal_times: HashMap::new(),
            optimum: None,
        })
    }

    fn select_optimum(&mut self) -> Result<()> {
        if self.traversal_times.is_empty() {
            return Err(AutoPairError::Tuning(
                "trying to determine the fastest configuration without any measurements; \
                 either the selection ran too early or no applicable configuration was found"
                    .into(),
            ));
        }
        let best = self
            .traversal_times
            .iter()
            .min_by_key(|&(config, &time)| (time, *config))
            .map(|(config, _)| *config);
        self.optimum = best;
        if let Some(config) = best {
            tracing::debug!(%config, "selected configuration");
        }
        Ok(())
    }
}

impl TuningStrategy for FullSearch {
    fn current_configuration(&self) -> Configuration {
        self.optimum
            .unwrap_or(self.search_space[self.current.min(self.search_space.len() - 1)])
    }

    fn tune(&mut self, _last_was_invalid: bool) -> Result<bool> {
        self.current += 1;
        if self.current >= self.search_space.len() {
            self.select_optimum()?;
            return Ok(false);
        }
        Ok(true)
    }

    fn add_evidence(&mut self, time_ns: u64, _iteration: usize) {
        let config = self.search_space[self.current.min(self.search_space.len() - 1)];
        self.traversal_times.insert(config, time_ns);
    }

    fn remove_newton3_option(&mut self, option: Newton3Kind) -> Result<()> {
        let current_config = self.current_configuration();
        self.search_space.retain(|c| c.newton3 != option);
        if self.search_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "removing every configuration with newton3 {option} emptied the search space"
            )));
        }
        self.traversal_times.retain(|c, _| c.newton3 != option);
        if self.optimum.map(|c| c.newton3 == option).unwrap_or(false) {
            self.optimum = None;
        }
        // continue from the same position if possible
        self.current = self
            .search_space
            .iter()
            .position(|c| *c >= current_config)
            .unwrap_or(0);
        Ok(())
    }

    fn reset(&mut self, _iteration: usize) -> Result<()> {
        self.traversal_times.clear();
        self.optimum = None;
        self.current = 0;
        Ok(())
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
            &[TraversalKind::C08, TraversalKind::C18],
            &[DataLayout::Aos, DataLayout::Soa],
            &Newton3Kind::ALL,
        )
    }

    #[test]
    fn test_full_pass_selects_minimum() {
        let space = space();
        let mut fs = FullSearch::new(space.clone()).unwrap();
        fs.reset(0).unwrap();
        let mut more = true;
        let mut step = 0u64;
        while more {
            // make the third tested configuration the fastest
            let time = if step == 2 { 10 } else { 100 + step };
            fs.add_evidence(time, step as usize);
            more = fs.tune(false).unwrap();
            step += 1;
        }
        assert_eq!(fs.current_configuration(), space[2]);
    }

    #[test]
    fn test_empty_space_is_rejected() {
        assert!(FullSearch::new(Vec::new()).is_err());
    }

    #[test]
    fn test_optimum_without_measurements_fails() {
        let mut fs = FullSearch::new(space()).unwrap();
        let mut result = Ok(true);
        for _ in 0..space().len() {
            result = fs.tune(true);
        }
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_newton3_option() {
        let mut fs = FullSearch::new(space()).unwrap();
        fs.remove_newton3_option(Newton3Kind::Enabled).unwrap();
        assert!(fs
            .search_space
            .iter()
            .all(|c| c.newton3 == Newton3Kind::Disabled));
        // removing the remaining option empties the space
        assert!(fs.remove_newton3_option(Newton3Kind::Disabled).is_err());
    }
}
