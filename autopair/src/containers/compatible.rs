//! Which traversals and layouts a container supports.

use crate::options::{ContainerKind, DataLayout, TraversalKind};

/// Traversals a container can run.
pub fn compatible_traversals(container: ContainerKind) -> &'static [TraversalKind] {
    match container {
        ContainerKind::DirectSum => &[TraversalKind::DirectSumTraversal],
        ContainerKind::LinkedCells => &[
            TraversalKind::C08,
            TraversalKind::C18,
            TraversalKind::Sliced,
            TraversalKind::BalancedSliced,
        ],
        // the reference variant resolves indices into the central vector and
        // runs the colored schedules only
        ContainerKind::ReferenceLinkedCells => &[TraversalKind::C08, TraversalKind::C18],
        ContainerKind::VerletLists => &[TraversalKind::VerletTraversal],
        ContainerKind::VerletClusterLists => &[TraversalKind::ClusterTraversal],
    }
}

/// Whether the container supports the data layout.
pub fn supports_layout(container: ContainerKind, layout: DataLayout) -> bool {
    match container {
        // index cells have no contiguous columnar form
        ContainerKind::ReferenceLinkedCells => layout == DataLayout::Aos,
        _ => true,
    }
}

/// Whether the (container, traversal, layout) triple can run at all.
pub fn is_compatible(
    container: ContainerKind,
    traversal: TraversalKind,
    layout: DataLayout,
) -> bool {
    compatible_traversals(container).contains(&traversal) && supports_layout(container, layout)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_container_has_a_traversal() {
        for container in ContainerKind::ALL {
            assert!(!compatible_traversals(container).is_empty());
        }
    }

    #[test]
    fn test_direct_sum_rejects_cell_traversals() {
        assert!(!is_compatible(
            ContainerKind::DirectSum,
            TraversalKind::C08,
            DataLayout::Aos
        ));
        assert!(is_compatible(
            ContainerKind::DirectSum,
            TraversalKind::DirectSumTraversal,
            DataLayout::Soa
        ));
    }

    #[test]
    fn test_reference_cells_are_aos_only() {
        assert!(!supports_layout(
            ContainerKind::ReferenceLinkedCells,
            DataLayout::Soa
        ));
    }
}
