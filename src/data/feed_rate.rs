//! Daily feed-rate recommendation.
//!
//! Fish appetite depends on water temperature. The recommended ration is a
//! percentage of the stock's biomass, chosen by temperature band:
//!
//! | Band     | Temperature (°C) | Ration |
//! |----------|------------------|--------|
//! | Stress   | t < 0 or t ≥ 32  | 2 %    |
//! | Cool     | 0 ≤ t < 26       | 2 %    |
//! | Warm     | 26 ≤ t < 28      | 3 %    |
//! | Optimal  | 28 ≤ t ≤ 30      | 4 %    |
//! | Elevated | 30 < t < 32      | 3 %    |

use crate::utils::round_to_hundredths;

/// Temperature band used to pick the feed ration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedRateBand {
    /// Below 26 °C.
    Cool,
    /// 26 °C up to (not including) 28 °C.
    Warm,
    /// 28 °C through 30 °C inclusive.
    Optimal,
    /// Above 30 °C, below 32 °C.
    Elevated,
    /// 32 °C and above, or an impossible negative reading.
    Stress,
}

impl FeedRateBand {
    /// Classify a water temperature.
    ///
    /// Lower bounds are inclusive, so 26.0 is `Warm` and 28.0 is `Optimal`.
    /// Non-finite readings fall into `Stress`.
    pub fn from_temperature(temperature_c: f64) -> Self {
        if !temperature_c.is_finite() || temperature_c < 0.0 || temperature_c >= 32.0 {
            Self::Stress
        } else if temperature_c < 26.0 {
            Self::Cool
        } else if temperature_c < 28.0 {
            Self::Warm
        } else if temperature_c <= 30.0 {
            Self::Optimal
        } else {
            Self::Elevated
        }
    }

    /// Daily ration as a fraction of biomass.
    pub fn fraction(&self) -> f64 {
        match self {
            Self::Cool | Self::Stress => 0.02,
            Self::Warm | Self::Elevated => 0.03,
            Self::Optimal => 0.04,
        }
    }

    /// Daily ration as a whole percentage.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Cool | Self::Stress => 2,
            Self::Warm | Self::Elevated => 3,
            Self::Optimal => 4,
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cool => "Cool",
            Self::Warm => "Warm",
            Self::Optimal => "Optimal",
            Self::Elevated => "Elevated",
            Self::Stress => "Stress",
        }
    }
}

impl std::fmt::Display for FeedRateBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}%)", self.label(), self.percent())
    }
}

/// Recommended daily feed in kilograms for a stock of `biomass_kg` at `temperature_c`.
///
/// The result is rounded to two decimal places. Biomass is not validated.
///
/// # Example
///
/// ```
/// use feedflow::calculate_feed_amount;
///
/// assert_eq!(calculate_feed_amount(100.0, 25.0), 2.0);
/// assert_eq!(calculate_feed_amount(100.0, 29.0), 4.0);
/// assert_eq!(calculate_feed_amount(100.0, 33.0), 2.0);
/// ```
pub fn calculate_feed_amount(biomass_kg: f64, temperature_c: f64) -> f64 {
    let band = FeedRateBand::from_temperature(temperature_c);
    round_to_hundredths(biomass_kg * band.fraction())
}
