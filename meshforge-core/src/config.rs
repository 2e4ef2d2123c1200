//! Balance-cycle tuning parameters.
//!
//! Configuration records are immutable value types validated before any
//! state is published. A record that fails validation never reaches the
//! engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::BalanceError;

/// Tuning parameters for one balance orchestrator.
///
/// The per-request deadline used inside coordination rounds is part of the
/// configuration rather than a protocol constant, so deployments with slow
/// interconnects can widen it without touching round semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceConfiguration {
    /// Upper bound on refinement rounds per cycle. The coordinator executes
    /// at most `min(ceil(log2 P), max_rounds)` rounds.
    pub max_rounds: u32,

    /// Budget for one full refinement round, exchange plus barrier.
    pub round_timeout: Duration,

    /// Deadline for a single refinement request; expiry substitutes an
    /// empty response instead of failing the round.
    pub request_timeout: Duration,

    /// Maximum boundary keys carried by one batched refinement request.
    pub batch_size: usize,

    /// Fraction of boundary leaves allowed to remain unbalanced before a
    /// round reports that more refinement is needed.
    pub refinement_threshold: f64,
}

impl BalanceConfiguration {
    /// Validate every field against its documented range.
    ///
    /// Returns the record unchanged on success so construction sites can
    /// chain: `BalanceConfiguration { .. }.validated()?`.
    pub fn validated(self) -> Result<Self, BalanceError> {
        if self.max_rounds < 1 {
            return Err(BalanceError::ConfigInvalid(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        if self.round_timeout.is_zero() {
            return Err(BalanceError::ConfigInvalid(
                "round_timeout must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(BalanceError::ConfigInvalid(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.batch_size < 1 {
            return Err(BalanceError::ConfigInvalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.refinement_threshold) {
            return Err(BalanceError::ConfigInvalid(format!(
                "refinement_threshold must be within [0, 1], got {}",
                self.refinement_threshold
            )));
        }
        Ok(self)
    }
}

impl Default for BalanceConfiguration {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            batch_size: 100,
            refinement_threshold: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(BalanceConfiguration::default().validated().is_ok());
    }

    #[test]
    fn zero_max_rounds_is_rejected() {
        let result = BalanceConfiguration {
            max_rounds: 0,
            ..Default::default()
        }
        .validated();
        assert!(matches!(result, Err(BalanceError::ConfigInvalid(_))));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = BalanceConfiguration {
            batch_size: 0,
            ..Default::default()
        }
        .validated();
        assert!(matches!(result, Err(BalanceError::ConfigInvalid(_))));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for field in ["round", "request"] {
            let mut config = BalanceConfiguration::default();
            match field {
                "round" => config.round_timeout = Duration::ZERO,
                _ => config.request_timeout = Duration::ZERO,
            }
            assert!(matches!(
                config.validated(),
                Err(BalanceError::ConfigInvalid(_))
            ));
        }
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        for threshold in [-0.1, 1.5] {
            let result = BalanceConfiguration {
                refinement_threshold: threshold,
                ..Default::default()
            }
            .validated();
            assert!(matches!(result, Err(BalanceError::ConfigInvalid(_))));
        }
    }
}
