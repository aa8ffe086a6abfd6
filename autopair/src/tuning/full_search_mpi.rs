//! Full search with the configuration space partitioned across MPI ranks.
//!
//! Every rank measures a contiguous block of the enumerated space. Once a
//! rank has tested its block it posts a non-blocking barrier and keeps
//! re-measuring until everyone has joined; then the globally fastest
//! measurement is elected and the winning rank broadcasts its configuration,
//! so all ranks leave the tuning phase with the identical tuple.

use crate::options::{ContainerKind, DataLayout, Newton3Kind, TraversalKind};
use crate::traits::tuning::TuningStrategy;
use crate::traits::types::{AutoPairError, Result};
use crate::tuning::configuration::Configuration;
use mpi::collective::SystemOperation;
use mpi::request::{Request, StaticScope};
use mpi::traits::{Communicator, CommunicatorCollectives, Equivalence, Root};
use std::collections::HashMap;

/// Wire form of a configuration for the winner broadcast.
#[derive(Equivalence, Clone, Copy, Default)]
struct ConfigMessage {
    container: i32,
    cell_size_factor: f64,
    traversal: i32,
    layout: i32,
    newton3: i32,
}

impl From<Configuration> for ConfigMessage {
    fn from(config: Configuration) -> Self {
        Self {
            container: ContainerKind::ALL
                .iter()
                .position(|&c| c == config.container)
                .unwrap_or(0) as i32,
            cell_size_factor: config.cell_size_factor,
            traversal: TraversalKind::ALL
                .iter()
                .position(|&t| t == config.traversal)
                .unwrap_or(0) as i32,
            layout: match config.layout {
                DataLayout::Aos => 0,
                DataLayout::Soa => 1,
            },
            newton3: match config.newton3 {
                Newton3Kind::Enabled => 0,
                Newton3Kind::Disabled => 1,
            },
        }
    }
}

impl From<ConfigMessage> for Configuration {
    fn from(msg: ConfigMessage) -> Self {
        Self {
            container: ContainerKind::ALL[msg.container as usize % ContainerKind::ALL.len()],
            cell_size_factor: msg.cell_size_factor,
            traversal: TraversalKind::ALL[msg.traversal as usize % TraversalKind::ALL.len()],
            layout: if msg.layout == 0 {
                DataLayout::Aos
            } else {
                DataLayout::Soa
            },
            newton3: if msg.newton3 == 0 {
                Newton3Kind::Enabled
            } else {
                Newton3Kind::Disabled
            },
        }
    }
}

/// This rank's contiguous block of `total` indices, remainder spread over
/// the low ranks.
pub fn rank_block(total: usize, world_size: usize, rank: usize) -> std::ops::Range<usize> {
    let block = total / world_size;
    let remainder = total % world_size;
    let mut start = block * rank;
    let mut end = block * (rank + 1);
    if rank < remainder {
        start += rank;
        end += rank + 1;
    } else {
        start += remainder;
        end += remainder;
    }
    start..end
}

/// Rank-partitioned exhaustive search.
pub struct FullSearchMpi<C: Communicator> {
    communicator: C,
    /// This rank's portion of the search space.
    search_space: Vec<Configuration>,
    current: usize,
    traversal_times: HashMap<Configuration, u64>,
    optimum: Option<Configuration>,
    all_configs_tested: bool,
    tuning_request: Option<Request<'static, StaticScope>>,
}

impl<C: Communicator> FullSearchMpi<C> {
    /// Strategy over the rank's block of an already-enumerated space.
    ///
    /// `full_space` must be identical on every rank.
    ///
    /// # Errors
    /// Fails if the space is empty.
    pub fn new(communicator: C, full_space: Vec<Configuration>) -> Result<Self> {
        if full_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(
                "full search over an empty configuration space".into(),
            ));
        }
        let world_size = communicator.size() as usize;
        let rank = communicator.rank() as usize;
        let block = rank_block(full_space.len(), world_size, rank);
        // ranks beyond the space measure the whole space instead of nothing
        let search_space = if block.is_empty() {
            full_space.clone()
        } else {
            full_space[block].to_vec()
        };
        tracing::debug!(
            rank,
            world_size,
            local_configs = search_space.len(),
            total_configs = full_space.len(),
            "partitioned search space"
        );
        Ok(Self {
            communicator,
            search_space,
            current: 0,
            traversal_times: HashMap::new(),
            optimum: None,
            all_configs_tested: false,
            tuning_request: None,
        })
    }

    /// Elect the global optimum and distribute the winning configuration.
    fn select_optimal_configuration(&mut self) -> Result<()> {
        if self.traversal_times.is_empty() {
            return Err(AutoPairError::Tuning(
                "trying to determine the fastest configuration without any measurements; \
                 either the selection ran too early or no applicable configuration was found"
                    .into(),
            ));
        }
        let (local_best_config, local_best_time) = self
            .traversal_times
            .iter()
            .min_by_key(|&(config, &time)| (time, *config))
            .map(|(config, &time)| (*config, time))
            .expect("non-empty checked above");

        // global minimum of the measured times
        let mut global_best_time = 0u64;
        self.communicator.all_reduce_into(
            &local_best_time,
            &mut global_best_time,
            SystemOperation::min(),
        );

        // the lowest rank holding the global minimum wins
        let my_rank = self.communicator.rank();
        let candidate_rank = if local_best_time == global_best_time {
            my_rank
        } else {
            i32::MAX
        };
        let mut winner_rank = 0i32;
        self.communicator.all_reduce_into(
            &candidate_rank,
            &mut winner_rank,
            SystemOperation::min(),
        );

        let mut message = ConfigMessage::from(local_best_config);
        self.communicator
            .process_at_rank(winner_rank)
            .broadcast_into(&mut message);
        self.optimum = Some(Configuration::from(message));

        self.traversal_times.clear();
        tracing::debug!(config = %self.optimum.unwrap(), winner_rank, "selected configuration");
        Ok(())
    }
}

impl<C: Communicator> TuningStrategy for FullSearchMpi<C> {
    fn current_configuration(&self) -> Configuration {
        self.optimum
            .unwrap_or(self.search_space[self.current.min(self.search_space.len() - 1)])
    }

    fn tune(&mut self, last_was_invalid: bool) -> Result<bool> {
        self.current += 1;
        if self.current >= self.search_space.len() {
            self.all_configs_tested = true;
            // keep re-measuring until every rank is ready to select
            self.current = 0;
        }
        if last_was_invalid {
            return Ok(true);
        }
        if let Some(request) = self.tuning_request.take() {
            match request.test() {
                Ok(_) => {
                    self.select_optimal_configuration()?;
                    return Ok(false);
                }
                Err(request) => {
                    self.tuning_request = Some(request);
                }
            }
        } else if self.all_configs_tested {
            self.tuning_request = Some(self.communicator.immediate_barrier());
            tracing::debug!("requested global tuning");
        }
        Ok(true)
    }

    fn add_evidence(&mut self, time_ns: u64, _iteration: usize) {
        let config = self.search_space[self.current.min(self.search_space.len() - 1)];
        self.traversal_times.insert(config, time_ns);
    }

    fn remove_newton3_option(&mut self, option: Newton3Kind) -> Result<()> {
        self.search_space.retain(|c| c.newton3 != option);
        if self.search_space.is_empty() {
            return Err(AutoPairError::InvalidConfiguration(format!(
                "removing every configuration with newton3 {option} emptied the search space"
            )));
        }
        self.traversal_times.retain(|c, _| c.newton3 != option);
        self.current = self.current.min(self.search_space.len() - 1);
        Ok(())
    }

    fn reset(&mut self, _iteration: usize) -> Result<()> {
        self.traversal_times.clear();
        self.optimum = None;
        self.all_configs_tested = false;
        self.tuning_request = None;
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

    #[test]
    fn test_rank_block_partition_is_exact() {
        for (total, world) in [(4, 2), (7, 3), (3, 5), (10, 4)] {
            let mut covered = Vec::new();
            for rank in 0..world {
                covered.extend(rank_block(total, world, rank));
            }
            covered.sort_unstable();
            covered.dedup();
            assert_eq!(covered, (0..total).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_rank_block_remainder_goes_to_low_ranks() {
        // 7 configs over 3 ranks: 3, 2, 2
        assert_eq!(rank_block(7, 3, 0), 0..3);
        assert_eq!(rank_block(7, 3, 1), 3..5);
        assert_eq!(rank_block(7, 3, 2), 5..7);
        // 4 configs over 2 ranks: ranks receive {0, 1} and {2, 3}
        assert_eq!(rank_block(4, 2, 0), 0..2);
        assert_eq!(rank_block(4, 2, 1), 2..4);
    }

    #[test]
    fn test_config_message_round_trip() {
        let config = Configuration {
            container: ContainerKind::VerletLists,
            cell_size_factor: 1.5,
            traversal: TraversalKind::VerletTraversal,
            layout: DataLayout::Soa,
            newton3: Newton3Kind::Disabled,
        };
        let message = ConfigMessage::from(config);
        assert_eq!(Configuration::from(message), config);
    }
}
