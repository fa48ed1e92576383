use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::ReconcileError;

/// Vulnerability severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ordinal stored in the database and used by aggregate views
    pub fn level(&self) -> i64 {
        match self {
            Severity::Negligible => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Severity::Negligible),
            1 => Some(Severity::Low),
            2 => Some(Severity::Medium),
            3 => Some(Severity::High),
            4 => Some(Severity::Critical),
            _ => None,
        }
    }

    /// CVSS v3 qualitative rating for a base score
    pub fn from_cvss_score(base_score: f64) -> Self {
        if base_score <= 0.0 {
            Severity::Negligible
        } else if base_score < 4.0 {
            Severity::Low
        } else if base_score < 7.0 {
            Severity::Medium
        } else if base_score < 9.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Negligible => "NEGLIGIBLE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NEGLIGIBLE" => Ok(Severity::Negligible),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(ReconcileError::validation(format!(
                "unknown severity '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CIS Docker Benchmark check level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CisLevel {
    Ignore,
    Info,
    Warn,
    Fatal,
}

impl CisLevel {
    pub fn level(&self) -> i64 {
        match self {
            CisLevel::Ignore => 0,
            CisLevel::Info => 1,
            CisLevel::Warn => 2,
            CisLevel::Fatal => 3,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(CisLevel::Ignore),
            1 => Some(CisLevel::Info),
            2 => Some(CisLevel::Warn),
            3 => Some(CisLevel::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CisLevel::Ignore => "IGNORE",
            CisLevel::Info => "INFO",
            CisLevel::Warn => "WARN",
            CisLevel::Fatal => "FATAL",
        }
    }
}

impl FromStr for CisLevel {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IGNORE" => Ok(CisLevel::Ignore),
            "INFO" => Ok(CisLevel::Info),
            "WARN" => Ok(CisLevel::Warn),
            "FATAL" => Ok(CisLevel::Fatal),
            _ => Err(ReconcileError::validation(format!(
                "unknown CIS level '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for CisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
