//! Stock biomass estimate.

use crate::error::{Error, Result};

/// Estimated live weight of the stock in a pond or tank.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Biomass {
    /// Average body weight of a single fish, in kilograms.
    pub average_weight_kg: f64,
    /// Number of fish.
    pub fish_count: u32,
}

impl Biomass {
    /// Create a biomass estimate, rejecting non-positive inputs.
    pub fn new(average_weight_kg: f64, fish_count: u32) -> Result<Self> {
        if !(average_weight_kg.is_finite() && average_weight_kg > 0.0) {
            return Err(Error::invalid_parameter(
                "average_weight_kg",
                average_weight_kg,
            ));
        }
        if fish_count == 0 {
            return Err(Error::invalid_parameter("fish_count", fish_count));
        }

        Ok(Self {
            average_weight_kg,
            fish_count,
        })
    }

    /// Total biomass in kilograms.
    pub fn total_kg(&self) -> f64 {
        self.average_weight_kg * self.fish_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        let biomass = Biomass::new(0.25, 400).unwrap();
        assert!((biomass.total_kg() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(Biomass::new(0.0, 10).is_err());
        assert!(Biomass::new(-1.0, 10).is_err());
        assert!(Biomass::new(f64::NAN, 10).is_err());
        assert!(Biomass::new(0.5, 0).is_err());
    }
}
