//! Per-type particle properties and pairwise mixing.

use std::collections::HashMap;

/// How the well depths of two particle types combine.
///
/// Both rules are offered explicitly because downstream code exists for
/// either: [`MixingRule::RootOfSum`] combines as `sqrt(ε_i + ε_j)`,
/// [`MixingRule::Geometric`] is the Lorentz–Berthelot `sqrt(ε_i · ε_j)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixingRule {
    /// `sqrt(ε_i + ε_j)`.
    RootOfSum,
    /// `sqrt(ε_i · ε_j)` (Lorentz–Berthelot).
    #[default]
    Geometric,
}

/// Registry of per-type mass, well depth and diameter, with pairwise mixing
/// accessors. Consulted by kernels through the type ids of a pair.
#[derive(Debug, Clone, Default)]
pub struct ParticlePropertiesLibrary {
    epsilon: HashMap<usize, f64>,
    sigma: HashMap<usize, f64>,
    mass: HashMap<usize, f64>,
    mixing_rule: MixingRule,
}

impl ParticlePropertiesLibrary {
    /// Empty library with the given mixing rule.
    pub fn new(mixing_rule: MixingRule) -> Self {
        Self {
            mixing_rule,
            ..Default::default()
        }
    }

    /// Register a particle type.
    pub fn add_type(&mut self, type_id: usize, epsilon: f64, sigma: f64, mass: f64) {
        self.epsilon.insert(type_id, epsilon);
        self.sigma.insert(type_id, sigma);
        self.mass.insert(type_id, mass);
    }

    /// Mass of a type.
    ///
    /// # Panics
    /// Panics on an unregistered type id.
    pub fn get_mass(&self, type_id: usize) -> f64 {
        self.mass[&type_id]
    }

    /// 24·ε of a single type.
    pub fn get_24_epsilon(&self, type_id: usize) -> f64 {
        24.0 * self.epsilon[&type_id]
    }

    /// σ² of a single type.
    pub fn get_sigma_squared(&self, type_id: usize) -> f64 {
        let sigma = self.sigma[&type_id];
        sigma * sigma
    }

    /// Mixed well depth of a pair under the configured rule.
    pub fn mixing_epsilon(&self, i: usize, j: usize) -> f64 {
        match self.mixing_rule {
            MixingRule::RootOfSum => (self.epsilon[&i] + self.epsilon[&j]).sqrt(),
            MixingRule::Geometric => (self.epsilon[&i] * self.epsilon[&j]).sqrt(),
        }
    }

    /// 24 times the mixed well depth.
    pub fn mixing_24_epsilon(&self, i: usize, j: usize) -> f64 {
        24.0 * self.mixing_epsilon(i, j)
    }

    /// Square of the arithmetically mixed diameter.
    pub fn mixing_sigma_squared(&self, i: usize, j: usize) -> f64 {
        let mixed = (self.sigma[&i] + self.sigma[&j]) / 2.0;
        mixed * mixed
    }

    /// Six times the potential shift that zeroes the 12-6 potential at the
    /// cutoff for the mixed pair.
    pub fn get_shift_6(&self, i: usize, j: usize, cutoff_squared: f64) -> f64 {
        let sigma_sq = self.mixing_sigma_squared(i, j);
        let eps24 = self.mixing_24_epsilon(i, j);
        let lj6 = (sigma_sq / cutoff_squared).powi(3);
        let lj12 = lj6 * lj6;
        -eps24 * (lj12 - lj6)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn library(rule: MixingRule) -> ParticlePropertiesLibrary {
        let mut lib = ParticlePropertiesLibrary::new(rule);
        lib.add_type(0, 1.0, 1.0, 1.0);
        lib.add_type(1, 4.0, 2.0, 3.0);
        lib
    }

    #[test]
    fn test_both_mixing_rules_are_available() {
        let root_of_sum = library(MixingRule::RootOfSum);
        let geometric = library(MixingRule::Geometric);
        assert_relative_eq!(root_of_sum.mixing_epsilon(0, 1), 5.0f64.sqrt());
        assert_relative_eq!(geometric.mixing_epsilon(0, 1), 2.0);
        // identical for equal types only when epsilon is self-consistent
        assert_relative_eq!(geometric.mixing_epsilon(0, 0), 1.0);
    }

    #[test]
    fn test_sigma_mixing_is_arithmetic() {
        let lib = library(MixingRule::Geometric);
        assert_relative_eq!(lib.mixing_sigma_squared(0, 1), 2.25);
        assert_relative_eq!(lib.get_sigma_squared(1), 4.0);
        assert_relative_eq!(lib.get_24_epsilon(1), 96.0);
    }

    #[test]
    fn test_shift_zeroes_potential_at_cutoff() {
        let lib = library(MixingRule::Geometric);
        let cutoff_sq: f64 = 6.25;
        let shift6 = lib.get_shift_6(0, 0, cutoff_sq);
        let lj6 = (1.0f64 / cutoff_sq).powi(3);
        let lj12 = lj6 * lj6;
        let upot6 = 24.0 * (lj12 - lj6) + shift6;
        assert_relative_eq!(upot6, 0.0, epsilon = 1e-15);
    }
}
