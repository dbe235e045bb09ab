//! Retry accounting for armed escalations.
//!
//! Each escalation armed with a positive retry ceiling gets a `RetryUnit`
//! under its escalation key. Every scheduled firing checks in: while retries
//! remain the firing is consumed as a retry (`Ongoing`); once the ceiling is
//! reached the unit is removed and the firing reports `Idle`, which lets the
//! real transition happen.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::constants::ResultCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStatus {
    /// No retry phase: nothing armed under this key, or a ceiling of zero
    None,
    /// Retries are exhausted; the firing that observed this is terminal
    Idle,
    /// This firing was consumed as a retry
    Ongoing,
}

impl fmt::Display for RetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "NONE",
            Self::Idle => "IDLE",
            Self::Ongoing => "ONGOING",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryUnit {
    pub key: String,
    pub retry_limit: u32,
    pub current: u32,
    pub status: RetryStatus,
}

#[derive(Debug, Default)]
pub struct RetryManager {
    units: DashMap<String, RetryUnit>,
}

impl RetryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track retries for escalation `key`. A zero ceiling or a key already
    /// tracked is refused.
    pub fn add_retry_unit(&self, key: &str, retry_limit: u32) -> bool {
        if retry_limit == 0 || self.units.contains_key(key) {
            return false;
        }
        self.units.insert(
            key.to_string(),
            RetryUnit {
                key: key.to_string(),
                retry_limit,
                current: 0,
                status: RetryStatus::Idle,
            },
        );
        debug!(code = %ResultCode::SuccessAddRetryUnit, key = %key, retry_limit, "Retry unit added");
        true
    }

    /// Record one scheduled firing for `key` and report how to treat it
    pub fn check_retry(&self, key: &str) -> RetryStatus {
        {
            let Some(mut unit) = self.units.get_mut(key) else {
                return RetryStatus::None;
            };
            if unit.retry_limit == 0 {
                return RetryStatus::None;
            }
            if unit.current < unit.retry_limit {
                unit.current += 1;
                unit.status = RetryStatus::Ongoing;
                debug!(
                    key = %key,
                    attempt = unit.current,
                    retry_limit = unit.retry_limit,
                    "Escalation firing consumed as retry"
                );
                return RetryStatus::Ongoing;
            }
        }

        self.remove_retry_unit(key);
        RetryStatus::Idle
    }

    /// Current status without recording a firing
    pub fn retry_status(&self, key: &str) -> RetryStatus {
        self.units
            .get(key)
            .map(|unit| unit.status)
            .unwrap_or(RetryStatus::None)
    }

    pub fn retry_unit(&self, key: &str) -> Option<RetryUnit> {
        self.units.get(key).map(|unit| unit.clone())
    }

    pub fn remove_retry_unit(&self, key: &str) -> bool {
        let removed = self.units.remove(key).is_some();
        if removed {
            debug!(code = %ResultCode::SuccessRemoveRetryUnit, key = %key, "Retry unit removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn clear(&self) {
        self.units.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_reports_none() {
        let retries = RetryManager::new();
        assert_eq!(retries.check_retry("missing"), RetryStatus::None);
        assert_eq!(retries.retry_status("missing"), RetryStatus::None);
    }

    #[test]
    fn test_zero_ceiling_is_refused() {
        let retries = RetryManager::new();
        assert!(!retries.add_retry_unit("k", 0));
        assert_eq!(retries.check_retry("k"), RetryStatus::None);
    }

    #[test]
    fn test_ceiling_then_terminal_firing() {
        let retries = RetryManager::new();
        assert!(retries.add_retry_unit("k", 2));
        assert!(!retries.add_retry_unit("k", 5), "duplicate key must be refused");

        assert_eq!(retries.check_retry("k"), RetryStatus::Ongoing);
        assert_eq!(retries.retry_status("k"), RetryStatus::Ongoing);
        assert_eq!(retries.check_retry("k"), RetryStatus::Ongoing);
        assert_eq!(retries.retry_unit("k").unwrap().current, 2);

        assert_eq!(retries.check_retry("k"), RetryStatus::Idle);
        assert!(retries.is_empty());
        assert_eq!(retries.check_retry("k"), RetryStatus::None);
    }
}
