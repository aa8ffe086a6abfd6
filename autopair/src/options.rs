//! Discrete option enumerations spanned by the tuner's search space.

use std::fmt;

/// Spatial container choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerKind {
    /// A single owned cell plus a single halo cell, O(N²) interaction.
    DirectSum,
    /// Particles stored directly inside the cell of their coordinate.
    LinkedCells,
    /// Linked cells over a central particle vector, cells hold references.
    ReferenceLinkedCells,
    /// Per-particle neighbor lists over a linked-cells substrate.
    VerletLists,
    /// Fixed-width particle clusters stacked in xy-towers.
    VerletClusterLists,
}

impl ContainerKind {
    /// All container kinds, in enumeration order.
    pub const ALL: [ContainerKind; 5] = [
        ContainerKind::DirectSum,
        ContainerKind::LinkedCells,
        ContainerKind::ReferenceLinkedCells,
        ContainerKind::VerletLists,
        ContainerKind::VerletClusterLists,
    ];
}

/// Orderings over cell pair tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraversalKind {
    /// Single-threaded owned-cell self pair plus owned×halo cross pair.
    DirectSumTraversal,
    /// 14 forward pair tasks per base cell, 8-color period-2 schedule.
    C08,
    /// Self plus 13 forward neighbors per base cell, 18-color schedule.
    C18,
    /// One slab per thread along the longest dimension, wall locks between
    /// consecutive slabs.
    Sliced,
    /// Sliced with slab boundaries chosen by a load estimator.
    BalancedSliced,
    /// Iteration over per-particle neighbor lists.
    VerletTraversal,
    /// Iteration over the precomputed cluster-thread partition.
    ClusterTraversal,
}

impl TraversalKind {
    /// All traversal kinds, in enumeration order.
    pub const ALL: [TraversalKind; 7] = [
        TraversalKind::DirectSumTraversal,
        TraversalKind::C08,
        TraversalKind::C18,
        TraversalKind::Sliced,
        TraversalKind::BalancedSliced,
        TraversalKind::VerletTraversal,
        TraversalKind::ClusterTraversal,
    ];
}

/// Memory layout the functor is driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataLayout {
    /// Array of structures, the particles themselves.
    Aos,
    /// Structure of arrays, columnar buffers attached to cells.
    Soa,
}

/// Whether a traversal exploits Newton's third law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Newton3Kind {
    /// Each unordered pair is delivered once, the kernel writes both partners.
    Enabled,
    /// Each ordered pair is delivered once, the kernel writes the first
    /// partner only.
    Disabled,
}

impl Newton3Kind {
    /// Both Newton-3 modes, in enumeration order.
    pub const ALL: [Newton3Kind; 2] = [Newton3Kind::Enabled, Newton3Kind::Disabled];

    /// `true` for [`Newton3Kind::Enabled`].
    pub fn as_bool(self) -> bool {
        matches!(self, Newton3Kind::Enabled)
    }
}

/// Load estimators for the balanced sliced traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadEstimatorKind {
    /// Every cell counts the same; slabs get equal cell counts.
    None,
    /// A cell weighs the square of its particle count, a proxy for its pair
    /// count.
    SquaredCellSize,
}

/// Acquisition functions for the Bayesian search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionKind {
    /// Upper confidence bound, mean plus predicted standard deviation.
    UpperConfidenceBound,
    /// Lower confidence bound, mean minus predicted standard deviation.
    LowerConfidenceBound,
    /// Predicted mean only.
    Mean,
}

/// How the façade reduces the samples of one configuration to evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorStrategy {
    /// The fastest single sample.
    FastestAbs,
    /// The mean over all samples.
    FastestMean,
}

/// Tuning strategies selectable through the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuningStrategyKind {
    /// Exhaustive search over the filtered configuration product.
    FullSearch,
    /// Extrapolation over past samples narrows the tested set.
    Predictive,
    /// Gaussian-process model over a continuous cell-size factor.
    Bayesian,
    /// Full search with the space partitioned across MPI ranks. Requires the
    /// `mpi` feature; without it the façade falls back to
    /// [`TuningStrategyKind::FullSearch`].
    FullSearchMpi,
}

/// Ownership filter for particle iteration.
///
/// The variants form sets: [`IteratorBehavior::OwnedOrHalo`] contains both
/// owned and halo particles, and so on. Dummies are only surfaced when
/// explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorBehavior {
    /// Only particles owned by this domain.
    Owned,
    /// Only halo particles.
    Halo,
    /// Owned and halo particles.
    OwnedOrHalo,
    /// Everything, including dummy padding particles.
    OwnedOrHaloOrDummy,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::DirectSum => write!(f, "DirectSum"),
            ContainerKind::LinkedCells => write!(f, "LinkedCells"),
            ContainerKind::ReferenceLinkedCells => write!(f, "ReferenceLinkedCells"),
            ContainerKind::VerletLists => write!(f, "VerletLists"),
            ContainerKind::VerletClusterLists => write!(f, "VerletClusterLists"),
        }
    }
}

impl fmt::Display for TraversalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalKind::DirectSumTraversal => write!(f, "directSum"),
            TraversalKind::C08 => write!(f, "c08"),
            TraversalKind::C18 => write!(f, "c18"),
            TraversalKind::Sliced => write!(f, "sliced"),
            TraversalKind::BalancedSliced => write!(f, "balancedSliced"),
            TraversalKind::VerletTraversal => write!(f, "verlet"),
            TraversalKind::ClusterTraversal => write!(f, "cluster"),
        }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLayout::Aos => write!(f, "AoS"),
            DataLayout::Soa => write!(f, "SoA"),
        }
    }
}

impl fmt::Display for Newton3Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Newton3Kind::Enabled => write!(f, "on"),
            Newton3Kind::Disabled => write!(f, "off"),
        }
    }
}

impl fmt::Display for IteratorBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IteratorBehavior::Owned => write!(f, "owned"),
            IteratorBehavior::Halo => write!(f, "halo"),
            IteratorBehavior::OwnedOrHalo => write!(f, "ownedOrHalo"),
            IteratorBehavior::OwnedOrHaloOrDummy => write!(f, "ownedOrHaloOrDummy"),
        }
    }
}
