use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(ParseEnumError::new("risk level", other)),
        }
    }
}

/// Outcome of a permission check.
///
/// Warnings never block. Any error sets `passed = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub risk_level: RiskLevel,
    pub passed: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Seconds to wait before retrying, when a throttle rejected the trade.
    pub wait_seconds: u64,
}

impl Default for RiskReport {
    fn default() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            passed: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            suggestions: Vec::new(),
            metrics: BTreeMap::new(),
            wait_seconds: 0,
        }
    }
}

impl RiskReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a blocking error and raises the risk level to at least `level`.
    pub fn fail(&mut self, level: RiskLevel, message: impl Into<String>) {
        self.passed = false;
        self.errors.push(message.into());
        self.escalate(level);
    }

    /// Records a non-blocking warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Records a warning and raises the risk level to at least `level`.
    pub fn warn_at(&mut self, level: RiskLevel, message: impl Into<String>) {
        self.warn(message);
        self.escalate(level);
    }

    pub fn suggest(&mut self, message: impl Into<String>) {
        self.suggestions.push(message.into());
    }

    pub fn metric(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metrics.insert(key.to_string(), value.into());
    }

    /// Raises the level; never lowers it.
    pub fn escalate(&mut self, level: RiskLevel) {
        self.risk_level = self.risk_level.max(level);
    }

    #[must_use]
    pub fn has_error_containing(&self, needle: &str) -> bool {
        self.errors.iter().any(|e| e.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_block() {
        let mut report = RiskReport::new();
        report.warn_at(RiskLevel::Medium, "near daily limit");
        assert!(report.passed);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn errors_block_and_level_only_rises() {
        let mut report = RiskReport::new();
        report.fail(RiskLevel::Critical, "circuit breaker active");
        report.warn_at(RiskLevel::Medium, "late in session");
        assert!(!report.passed);
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(report.has_error_containing("circuit breaker"));
    }

    #[test]
    fn levels_are_ordered() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert_eq!("medium".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("severe".parse::<RiskLevel>().is_err());
    }
}
