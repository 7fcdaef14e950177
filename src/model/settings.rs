//! Tunable thresholds persisted as `key -> value` system config.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GovernanceError, GovernanceResult};

pub const EXPIRY_DAYS_KEY: &str = "expiry_days";
pub const ML_SENSITIVITY_KEY: &str = "ml_sensitivity";

pub const DEFAULT_EXPIRY_DAYS: u32 = 30;
pub const MIN_EXPIRY_DAYS: i64 = 1;
pub const MAX_EXPIRY_DAYS: i64 = 90;
pub const DEFAULT_ML_SENSITIVITY: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub expiry_days: u32,
    pub ml_sensitivity: f64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            expiry_days: DEFAULT_EXPIRY_DAYS,
            ml_sensitivity: DEFAULT_ML_SENSITIVITY,
        }
    }
}

impl SystemSettings {
    /// Build from raw stored values. Missing or out-of-range entries fall back
    /// to defaults so a bad row never blocks governance.
    pub fn from_stored(
        expiry_days: Option<&Value>,
        ml_sensitivity: Option<&Value>,
        default_expiry_days: u32,
    ) -> Self {
        let expiry_days = expiry_days
            .and_then(Value::as_i64)
            .and_then(|days| validate_expiry_days(days).ok())
            .unwrap_or(default_expiry_days);
        let ml_sensitivity = ml_sensitivity
            .and_then(Value::as_f64)
            .and_then(|v| validate_ml_sensitivity(v).ok())
            .unwrap_or(DEFAULT_ML_SENSITIVITY);
        Self {
            expiry_days,
            ml_sensitivity,
        }
    }
}

pub fn validate_expiry_days(days: i64) -> GovernanceResult<u32> {
    if !(MIN_EXPIRY_DAYS..=MAX_EXPIRY_DAYS).contains(&days) {
        return Err(GovernanceError::validation(format!(
            "expiry_days must be between {} and {}",
            MIN_EXPIRY_DAYS, MAX_EXPIRY_DAYS
        )));
    }
    Ok(days as u32)
}

pub fn validate_ml_sensitivity(value: f64) -> GovernanceResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GovernanceError::validation(
            "ml_sensitivity must be between 0 and 1",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_days_bounds() {
        assert_eq!(validate_expiry_days(1).unwrap(), 1);
        assert_eq!(validate_expiry_days(90).unwrap(), 90);
        assert!(validate_expiry_days(0).is_err());
        assert!(validate_expiry_days(91).is_err());
    }

    #[test]
    fn test_ml_sensitivity_bounds() {
        assert!(validate_ml_sensitivity(0.0).is_ok());
        assert!(validate_ml_sensitivity(1.0).is_ok());
        assert!(validate_ml_sensitivity(1.01).is_err());
        assert!(validate_ml_sensitivity(f64::NAN).is_err());
    }

    #[test]
    fn test_from_stored_ignores_bad_values() {
        let settings = SystemSettings::from_stored(Some(&json!(400)), Some(&json!("x")), 30);
        assert_eq!(settings, SystemSettings::default());

        let settings = SystemSettings::from_stored(Some(&json!(14)), Some(&json!(0.5)), 30);
        assert_eq!(settings.expiry_days, 14);
        assert_eq!(settings.ml_sensitivity, 0.5);
    }
}
