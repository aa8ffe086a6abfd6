//! Behavior-filtered particle iteration.

use crate::options::IteratorBehavior;
use crate::traits::particle::{Ownership, Particle};
use crate::utils::math::in_box_closed;

impl IteratorBehavior {
    /// Set-membership test: whether a particle with this ownership tag is
    /// surfaced by the behavior.
    pub fn contains_ownership(self, ownership: Ownership) -> bool {
        match self {
            IteratorBehavior::Owned => ownership == Ownership::Owned,
            IteratorBehavior::Halo => ownership == Ownership::Halo,
            IteratorBehavior::OwnedOrHalo => {
                matches!(ownership, Ownership::Owned | Ownership::Halo)
            }
            IteratorBehavior::OwnedOrHaloOrDummy => true,
        }
    }

    /// Whether `particle` is surfaced by the behavior.
    pub fn contains<P: Particle>(self, particle: &P) -> bool {
        self.contains_ownership(particle.ownership())
    }
}

/// Whether `particle` lies in the closed region `[lo, hi]` and matches the
/// behavior. The predicate of region iteration.
pub fn in_region<P: Particle>(
    particle: &P,
    lo: [f64; 3],
    hi: [f64; 3],
    behavior: IteratorBehavior,
) -> bool {
    behavior.contains(particle) && in_box_closed(particle.position(), lo, hi)
}
