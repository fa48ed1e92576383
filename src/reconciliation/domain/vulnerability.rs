use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Severity, VulnerabilityId, VulnerabilitySource};

/// CVSS data attached to a vulnerability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cvss {
    pub vector: String,
    pub base_score: f64,
    /// Rating derived from `base_score`; kept next to, not instead of, the
    /// scanner-provided severity.
    pub severity: Severity,
}

impl Cvss {
    pub fn new(vector: impl Into<String>, base_score: f64) -> Self {
        Self {
            vector: vector.into(),
            base_score,
            severity: Severity::from_cvss_score(base_score),
        }
    }
}

/// A vulnerability shared by every package edge that references its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: VulnerabilityId,
    pub name: String,
    pub severity: Severity,
    pub cvss: Option<Cvss>,
    pub description: String,
    pub links: BTreeSet<String>,
    pub reporting_scanners: BTreeSet<String>,
    pub source: VulnerabilitySource,
    /// RFC 3339 timestamp of the report that last wrote this row
    pub scanned_at: String,
}

impl Vulnerability {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        let name = name.into();
        Self {
            id: VulnerabilityId::from_name(&name),
            name,
            severity,
            cvss: None,
            description: String::new(),
            links: BTreeSet::new(),
            reporting_scanners: BTreeSet::new(),
            source: VulnerabilitySource::default(),
            scanned_at: String::new(),
        }
    }

    /// Folds the scanner attribution of an earlier observation of the same
    /// vulnerability into this one.
    pub fn absorb_scanners(&mut self, other: &Vulnerability) {
        self.reporting_scanners
            .extend(other.reporting_scanners.iter().cloned());
    }
}
