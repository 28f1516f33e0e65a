//! Simulation timing and outcome-rate parameters.
//!
//! A simulated batch advances on a fixed tick. Each detection unit stays
//! in progress for `unit_dwell_ms`; its outcome becomes final once
//! `reveal_offset_ms` has elapsed. Outcomes are drawn from the configured
//! rates, with any remaining probability mass mapped to
//! [`HoleStatus::Uncertain`](crate::HoleStatus::Uncertain).

use serde::{Deserialize, Serialize};

/// Tolerance applied when checking that the outcome rates sum to at most 1.
const RATE_SUM_TOLERANCE: f64 = 1e-9;

/// Errors raised by [`SimulationParams::validate`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulationConfigError {
    /// A rate is negative or not a finite number.
    #[error("invalid {name} rate: {value}")]
    InvalidRate {
        /// Which rate is invalid.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// The configured rates add up to more than 1.
    #[error("outcome rates sum to {sum}, which exceeds 1")]
    RatesExceedOne {
        /// The sum of all configured rates.
        sum: f64,
    },

    /// A timing parameter is out of range.
    #[error("invalid timing: {reason}")]
    InvalidTiming {
        /// Explanation of what is wrong.
        reason: String,
    },
}

/// Timing and outcome-rate configuration for a simulated batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Tick granularity in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Total time a unit occupies "in progress".
    #[serde(default = "default_unit_dwell_ms")]
    pub unit_dwell_ms: u64,

    /// Time within the dwell after which the outcome is revealed.
    #[serde(default = "default_reveal_offset_ms")]
    pub reveal_offset_ms: u64,

    /// Probability of a qualified outcome.
    #[serde(default = "default_qualified_rate")]
    pub qualified_rate: f64,

    /// Probability of a defective outcome.
    #[serde(default = "default_defective_rate")]
    pub defective_rate: f64,

    /// Probability of a blind-hole outcome.
    #[serde(default)]
    pub blind_rate: f64,

    /// Seed for outcome sampling.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            unit_dwell_ms: default_unit_dwell_ms(),
            reveal_offset_ms: default_reveal_offset_ms(),
            qualified_rate: default_qualified_rate(),
            defective_rate: default_defective_rate(),
            blind_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulationParams {
    /// Probability mass left over for the uncertain outcome.
    pub fn uncertain_rate(&self) -> f64 {
        (1.0 - self.qualified_rate - self.defective_rate - self.blind_rate).max(0.0)
    }

    /// Check rates and timing.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationConfigError`] if any rate is negative or
    /// non-finite, the rates sum to more than 1, the tick interval or dwell
    /// is zero, or the reveal offset is not strictly inside the dwell.
    pub fn validate(&self) -> Result<(), SimulationConfigError> {
        for (name, value) in [
            ("qualified", self.qualified_rate),
            ("defective", self.defective_rate),
            ("blind", self.blind_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationConfigError::InvalidRate { name, value });
            }
        }

        let sum = self.qualified_rate + self.defective_rate + self.blind_rate;
        if sum > 1.0 + RATE_SUM_TOLERANCE {
            return Err(SimulationConfigError::RatesExceedOne { sum });
        }

        if self.tick_interval_ms == 0 {
            return Err(SimulationConfigError::InvalidTiming {
                reason: "tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.unit_dwell_ms == 0 {
            return Err(SimulationConfigError::InvalidTiming {
                reason: "unit_dwell_ms must be at least 1".to_owned(),
            });
        }
        if self.reveal_offset_ms >= self.unit_dwell_ms {
            return Err(SimulationConfigError::InvalidTiming {
                reason: format!(
                    "reveal_offset_ms ({}) must be less than unit_dwell_ms ({})",
                    self.reveal_offset_ms, self.unit_dwell_ms
                ),
            });
        }
        Ok(())
    }
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_unit_dwell_ms() -> u64 {
    10_000
}

const fn default_reveal_offset_ms() -> u64 {
    9_500
}

const fn default_qualified_rate() -> f64 {
    0.995
}

const fn default_defective_rate() -> f64 {
    0.005
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimulationParams::default().validate(), Ok(()));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let params = SimulationParams {
            defective_rate: -0.1,
            ..SimulationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationConfigError::InvalidRate { name: "defective", .. })
        ));
    }

    #[test]
    fn nan_rate_is_rejected() {
        let params = SimulationParams {
            blind_rate: f64::NAN,
            ..SimulationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationConfigError::InvalidRate { name: "blind", .. })
        ));
    }

    #[test]
    fn rates_over_one_are_rejected() {
        let params = SimulationParams {
            qualified_rate: 0.8,
            defective_rate: 0.2,
            blind_rate: 0.1,
            ..SimulationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationConfigError::RatesExceedOne { .. })
        ));
    }

    #[test]
    fn rates_summing_to_exactly_one_are_accepted() {
        let params = SimulationParams {
            qualified_rate: 0.7,
            defective_rate: 0.2,
            blind_rate: 0.1,
            ..SimulationParams::default()
        };
        assert_eq!(params.validate(), Ok(()));
        assert!(params.uncertain_rate() < 1e-9);
    }

    #[test]
    fn reveal_must_precede_dwell_end() {
        let params = SimulationParams {
            unit_dwell_ms: 1000,
            reveal_offset_ms: 1000,
            ..SimulationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationConfigError::InvalidTiming { .. })
        ));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let params = SimulationParams {
            tick_interval_ms: 0,
            ..SimulationParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let params: SimulationParams =
            serde_json::from_str(r#"{"qualified_rate": 0.7, "seed": 9}"#).unwrap_or_default();
        assert_eq!(params.seed, 9);
        assert_eq!(params.unit_dwell_ms, 10_000);
        assert!((params.qualified_rate - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn uncertain_takes_the_remainder() {
        let params = SimulationParams {
            qualified_rate: 0.7,
            defective_rate: 0.2,
            blind_rate: 0.05,
            ..SimulationParams::default()
        };
        assert!((params.uncertain_rate() - 0.05).abs() < 1e-9);
    }
}
