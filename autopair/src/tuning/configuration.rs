//! The configuration tuple and search-space enumeration.

use crate::containers::compatible::is_compatible;
use crate::options::{ContainerKind, DataLayout, Newton3Kind, TraversalKind};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An immutable selection of (container, cell-size factor, traversal, data
/// layout, Newton-3), the unit the tuner measures and commits.
#[derive(Debug, Clone, Copy)]
pub struct Configuration {
    /// The container kind.
    pub container: ContainerKind,
    /// Scales the minimum cell side of cell-based containers.
    pub cell_size_factor: f64,
    /// The traversal kind; must be compatible with the container.
    pub traversal: TraversalKind,
    /// The data layout.
    pub layout: DataLayout,
    /// The Newton-3 mode; must be permitted by the functor.
    pub newton3: Newton3Kind,
}

impl Configuration {
    /// Whether the tuple is internally consistent.
    pub fn is_valid(&self) -> bool {
        self.cell_size_factor > 0.0
            && is_compatible(self.container, self.traversal, self.layout)
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
            && self.cell_size_factor.to_bits() == other.cell_size_factor.to_bits()
            && self.traversal == other.traversal
            && self.layout == other.layout
            && self.newton3 == other.newton3
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.cell_size_factor.to_bits().hash(state);
        self.traversal.hash(state);
        self.layout.hash(state);
        self.newton3.hash(state);
    }
}

impl PartialOrd for Configuration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Configuration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.container
            .cmp(&other.container)
            .then_with(|| {
                self.cell_size_factor
                    .total_cmp(&other.cell_size_factor)
            })
            .then_with(|| self.traversal.cmp(&other.traversal))
            .then_with(|| self.layout.cmp(&other.layout))
            .then_with(|| self.newton3.cmp(&other.newton3))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{container: {}, cellSizeFactor: {}, traversal: {}, layout: {}, newton3: {}}}",
            self.container, self.cell_size_factor, self.traversal, self.layout, self.newton3
        )
    }
}

/// Enumerate the cartesian product of the allowed options, filtered down to
/// internally consistent tuples. Order: container, cell-size factor,
/// traversal, layout, Newton-3.
pub fn enumerate_search_space(
    containers: &[ContainerKind],
    cell_size_factors: &[f64],
    traversals: &[TraversalKind],
    layouts: &[DataLayout],
    newton3_options: &[Newton3Kind],
) -> Vec<Configuration> {
    let mut space = Vec::new();
    for &container in containers {
        for &cell_size_factor in cell_size_factors {
            for &traversal in traversals {
                for &layout in layouts {
                    for &newton3 in newton3_options {
                        let config = Configuration {
                            container,
                            cell_size_factor,
                            traversal,
                            layout,
                            newton3,
                        };
                        if config.is_valid() {
                            space.push(config);
                        }
                    }
                }
            }
        }
    }
    space
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enumeration_filters_incompatible_tuples() {
        let space = enumerate_search_space(
            &ContainerKind::ALL,
            &[1.0],
            &TraversalKind::ALL,
            &[DataLayout::Aos, DataLayout::Soa],
            &Newton3Kind::ALL,
        );
        assert!(!space.is_empty());
        for config in &space {
            assert!(config.is_valid(), "invalid tuple {config} enumerated");
        }
        // direct sum only pairs with its own traversal
        assert!(space
            .iter()
            .filter(|c| c.container == ContainerKind::DirectSum)
            .all(|c| c.traversal == TraversalKind::DirectSumTraversal));
    }

    #[test]
    fn test_configuration_identity_over_cell_size() {
        let a = Configuration {
            container: ContainerKind::LinkedCells,
            cell_size_factor: 1.0,
            traversal: TraversalKind::C08,
            layout: DataLayout::Aos,
            newton3: Newton3Kind::Enabled,
        };
        let mut b = a;
        assert_eq!(a, b);
        b.cell_size_factor = 1.5;
        assert_ne!(a, b);
        assert!(a < b);
    }
}
