//! Fault-layer configuration records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use meshforge_core::BalanceError;

/// Timing thresholds for the heartbeat failure detector.
///
/// The three thresholds must be strictly increasing: a partition is
/// suspected before it is declared failed, and heartbeats arrive well
/// inside the suspicion window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetectionConfig {
    /// Expected interval between heartbeats from a healthy partition.
    pub heartbeat_interval: Duration,

    /// Silence longer than this moves a partition to `Suspected`.
    pub suspect_timeout: Duration,

    /// Silence longer than this moves a partition to `Failed`.
    pub failure_timeout: Duration,

    /// Cadence of the background timeout-evaluation loop.
    pub check_interval: Duration,
}

impl FailureDetectionConfig {
    /// Validate the threshold ordering before any detector state exists.
    pub fn validated(self) -> Result<Self, BalanceError> {
        if self.check_interval.is_zero() {
            return Err(BalanceError::ConfigInvalid(
                "check_interval must be positive".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(BalanceError::ConfigInvalid(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        if self.suspect_timeout <= self.heartbeat_interval {
            return Err(BalanceError::ConfigInvalid(
                "suspect_timeout must exceed heartbeat_interval".to_string(),
            ));
        }
        if self.failure_timeout <= self.suspect_timeout {
            return Err(BalanceError::ConfigInvalid(
                "failure_timeout must exceed suspect_timeout".to_string(),
            ));
        }
        Ok(self)
    }
}

impl Default for FailureDetectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(500),
            suspect_timeout: Duration::from_secs(2),
            failure_timeout: Duration::from_secs(5),
            check_interval: Duration::from_millis(100),
        }
    }
}

/// Tuning for recovery strategy execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum recovery attempts per partition before giving up.
    pub max_attempts: u32,

    /// Pause between consecutive attempts for the same partition.
    pub retry_delay: Duration,

    /// How long a barrier recovery waits for in-flight operations to drain.
    pub quiescence_timeout: Duration,
}

impl RecoveryConfig {
    pub fn validated(self) -> Result<Self, BalanceError> {
        if self.max_attempts < 1 {
            return Err(BalanceError::ConfigInvalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.quiescence_timeout.is_zero() {
            return Err(BalanceError::ConfigInvalid(
                "quiescence_timeout must be positive".to_string(),
            ));
        }
        Ok(self)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            quiescence_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(FailureDetectionConfig::default().validated().is_ok());
        assert!(RecoveryConfig::default().validated().is_ok());
    }

    #[test]
    fn equal_timeouts_are_rejected() {
        let config = FailureDetectionConfig {
            suspect_timeout: Duration::from_secs(2),
            failure_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(BalanceError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn suspect_timeout_must_exceed_heartbeat_interval() {
        let config = FailureDetectionConfig {
            heartbeat_interval: Duration::from_secs(3),
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(BalanceError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn zero_check_interval_is_rejected() {
        let config = FailureDetectionConfig {
            check_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(BalanceError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn zero_recovery_attempts_are_rejected() {
        let config = RecoveryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(BalanceError::ConfigInvalid(_))
        ));
    }
}
