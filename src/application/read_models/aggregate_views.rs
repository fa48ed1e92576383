//! Rows of the precomputed aggregate views.
//!
//! These are eventually consistent: they reflect the base tables as of the
//! last refresh. Callers that just wrote data read the base tables instead.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::reconciliation::domain::{
    ApplicationId, ApplicationType, CisLevel, PackageId, ResourceId, ResourceType, Severity,
    VulnerabilityId,
};

/// Vulnerability counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub negligible: i64,
}

impl SeverityCounts {
    pub fn total(&self) -> i64 {
        self.critical + self.high + self.medium + self.low + self.negligible
    }

    /// Most severe level with at least one vulnerability
    pub fn highest(&self) -> Option<Severity> {
        if self.critical > 0 {
            Some(Severity::Critical)
        } else if self.high > 0 {
            Some(Severity::High)
        } else if self.medium > 0 {
            Some(Severity::Medium)
        } else if self.low > 0 {
            Some(Severity::Low)
        } else if self.negligible > 0 {
            Some(Severity::Negligible)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationViewRow {
    pub id: ApplicationId,
    pub name: String,
    pub application_type: ApplicationType,
    pub labels: BTreeSet<String>,
    pub environments: BTreeSet<String>,
    pub resources: i64,
    pub packages: i64,
    pub vulnerabilities: SeverityCounts,
    pub cis_docker_benchmark_level: Option<CisLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceViewRow {
    pub id: ResourceId,
    pub name: String,
    pub hash: String,
    pub resource_type: ResourceType,
    pub reporting_analyzers: BTreeSet<String>,
    pub applications: i64,
    pub packages: i64,
    pub vulnerabilities: SeverityCounts,
    pub cis_docker_benchmark_level: Option<CisLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageViewRow {
    pub id: PackageId,
    pub name: String,
    pub version: String,
    pub license: String,
    pub language: String,
    pub applications: i64,
    pub resources: i64,
    pub vulnerabilities: SeverityCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerabilityViewRow {
    pub id: VulnerabilityId,
    pub name: String,
    pub severity: Severity,
    pub cvss_base_score: Option<f64>,
    pub cvss_severity: Option<Severity>,
    pub reporting_scanners: BTreeSet<String>,
    pub packages: i64,
    pub resources: i64,
    pub applications: i64,
    pub fix_versions: BTreeSet<String>,
}

/// Rows returned by the "most vulnerable" dashboard queries when no limit
/// is given
pub const DEFAULT_MOST_VULNERABLE_LIMIT: usize = 5;

/// Number of packages sharing one license
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseCount {
    pub license: String,
    pub count: i64,
}

/// Number of packages sharing one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: i64,
}

/// Dashboard data read from the aggregate views.
///
/// "Most vulnerable" orders by critical count, then high, medium, low and
/// negligible, all descending. Packages with an empty license or language
/// are left out of the per-license and per-language counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub most_vulnerable_applications: Vec<ApplicationViewRow>,
    pub most_vulnerable_resources: Vec<ResourceViewRow>,
    pub most_vulnerable_packages: Vec<PackageViewRow>,
    pub packages_per_license: Vec<LicenseCount>,
    pub packages_per_language: Vec<LanguageCount>,
}
