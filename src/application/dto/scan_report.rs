use serde::{Deserialize, Serialize};

use crate::reconciliation::domain::{
    CisLevel, ReportKind, ResourceId, ResourceType, Severity, VulnerabilitySource,
};

/// ScanReport - inbound scan report as consumed by the reconciler
///
/// Only the fields the reconciler reads are modelled; anything else in the
/// JSON document is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub kind: ReportKind,
    #[serde(default)]
    pub source: VulnerabilitySource,
    #[serde(default)]
    pub resources: Vec<ResourceScan>,
}

impl ScanReport {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            source: VulnerabilitySource::default(),
            resources: Vec::new(),
        }
    }

    pub fn vulnerability_scan() -> Self {
        Self::new(ReportKind::VulnerabilityScan)
    }

    pub fn content_analysis() -> Self {
        Self::new(ReportKind::ContentAnalysis)
    }

    pub fn with_source(mut self, source: VulnerabilitySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_resource(mut self, resource: ResourceScan) -> Self {
        self.resources.push(resource);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceScan {
    pub resource: ResourceInfo,
    #[serde(default)]
    pub packages: Vec<PackageScan>,
    #[serde(default)]
    pub cis_docker_benchmark_checks: Vec<CisCheckScan>,
}

impl ResourceScan {
    pub fn new(hash: impl Into<String>, name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            resource: ResourceInfo {
                hash: hash.into(),
                name: name.into(),
                resource_type,
            },
            packages: Vec::new(),
            cis_docker_benchmark_checks: Vec::new(),
        }
    }

    pub fn with_package(mut self, package: PackageScan) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_cis_check(mut self, check: CisCheckScan) -> Self {
        self.cis_docker_benchmark_checks.push(check);
        self
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::from_parts(
            &self.resource.hash,
            &self.resource.name,
            self.resource.resource_type,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub hash: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageScan {
    pub package: PackageInfo,
    /// Content analyzers that found this package in the resource
    #[serde(default)]
    pub analyzers: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<VulnerabilityScan>,
}

impl PackageScan {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: PackageInfo {
                name: name.into(),
                version: version.into(),
                license: String::new(),
                language: String::new(),
            },
            analyzers: Vec::new(),
            vulnerabilities: Vec::new(),
        }
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.package.license = license.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.package.language = language.into();
        self
    }

    pub fn with_analyzers<I, S>(mut self, analyzers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analyzers.extend(analyzers.into_iter().map(Into::into));
        self
    }

    pub fn with_vulnerability(mut self, vulnerability: VulnerabilityScan) -> Self {
        self.vulnerabilities.push(vulnerability);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityScan {
    pub name: String,
    pub severity: Severity,
    #[serde(default)]
    pub cvss: Option<CvssScan>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub fix_version: String,
    /// Scanners that reported this finding
    #[serde(default)]
    pub scanners: Vec<String>,
}

impl VulnerabilityScan {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            severity,
            cvss: None,
            description: String::new(),
            links: Vec::new(),
            fix_version: String::new(),
            scanners: Vec::new(),
        }
    }

    pub fn with_fix_version(mut self, fix_version: impl Into<String>) -> Self {
        self.fix_version = fix_version.into();
        self
    }

    pub fn with_scanners<I, S>(mut self, scanners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scanners.extend(scanners.into_iter().map(Into::into));
        self
    }

    pub fn with_cvss(mut self, vector: impl Into<String>, base_score: f64) -> Self {
        self.cvss = Some(CvssScan {
            vector: vector.into(),
            base_score,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvssScan {
    pub vector: String,
    pub base_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CisCheckScan {
    pub code: String,
    pub level: CisLevel,
    #[serde(default)]
    pub descriptions: String,
}

impl CisCheckScan {
    pub fn new(code: impl Into<String>, level: CisLevel) -> Self {
        Self {
            code: code.into(),
            level,
            descriptions: String::new(),
        }
    }
}
