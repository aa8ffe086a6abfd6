//! Domain geometry helpers.

use num::Float;

/// Whether `coordinates` lie inside the half-open domain `[box_min, box_max)`.
pub fn is_inside_domain<T: Float>(coordinates: [T; 3], box_min: [T; 3], box_max: [T; 3]) -> bool {
    crate::utils::math::in_box(coordinates, box_min, box_max)
}

/// Distance of a point to a domain under an n-th-root metric.
///
/// For a point outside the domain this accumulates the squared per-axis
/// overhang and returns `sum^(1/dims)` with `dims = 3`, which is **not** the
/// Euclidean distance (that would be `sum^(1/2)`). The helper is preserved
/// for callers that depend on this historical metric; every distance used
/// internally by this crate is Euclidean.
pub fn distance_to_domain_root_metric(r: [f64; 3], box_min: [f64; 3], box_max: [f64; 3]) -> f64 {
    let mut accumulated = 0.0;
    for k in 0..3 {
        let overhang = if r[k] < box_min[k] {
            box_min[k] - r[k]
        } else if r[k] >= box_max[k] {
            r[k] - box_max[k]
        } else {
            0.0
        };
        accumulated += overhang * overhang;
    }
    accumulated.powf(1.0 / 3.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inside_point_has_zero_distance() {
        let lo = [0.0; 3];
        let hi = [10.0; 3];
        assert!(is_inside_domain([5.0, 5.0, 5.0], lo, hi));
        assert_relative_eq!(distance_to_domain_root_metric([5.0, 5.0, 5.0], lo, hi), 0.0);
    }

    #[test]
    fn test_root_metric_is_not_euclidean() {
        let lo = [0.0; 3];
        let hi = [10.0; 3];
        // one axis out by 2: accumulated = 4, metric = 4^(1/3)
        let d = distance_to_domain_root_metric([-2.0, 5.0, 5.0], lo, hi);
        assert_relative_eq!(d, 4.0f64.powf(1.0 / 3.0), epsilon = 1e-12);
    }
}
