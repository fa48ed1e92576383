//! Type discriminators for applications, resources and reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::ReconcileError;

/// Kind of scanned unit an Application represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    Image,
    Pod,
    Directory,
    File,
}

impl ApplicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationType::Image => "IMAGE",
            ApplicationType::Pod => "POD",
            ApplicationType::Directory => "DIRECTORY",
            ApplicationType::File => "FILE",
        }
    }
}

impl FromStr for ApplicationType {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IMAGE" => Ok(ApplicationType::Image),
            "POD" => Ok(ApplicationType::Pod),
            "DIRECTORY" => Ok(ApplicationType::Directory),
            "FILE" => Ok(ApplicationType::File),
            _ => Err(ReconcileError::validation(format!(
                "unknown application type '{}'. Expected IMAGE, POD, DIRECTORY or FILE",
                s
            ))),
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of scanned artifact a Resource represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Image,
    Directory,
    File,
    Rootfs,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "IMAGE",
            ResourceType::Directory => "DIRECTORY",
            ResourceType::File => "FILE",
            ResourceType::Rootfs => "ROOTFS",
        }
    }
}

impl FromStr for ResourceType {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IMAGE" => Ok(ResourceType::Image),
            "DIRECTORY" => Ok(ResourceType::Directory),
            "FILE" => Ok(ResourceType::File),
            "ROOTFS" => Ok(ResourceType::Rootfs),
            _ => Err(ReconcileError::validation(format!(
                "unknown resource type '{}'. Expected IMAGE, DIRECTORY, FILE or ROOTFS",
                s
            ))),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a vulnerability finding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VulnerabilitySource {
    #[default]
    Cicd,
    Runtime,
}

impl VulnerabilitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilitySource::Cicd => "CICD",
            VulnerabilitySource::Runtime => "RUNTIME",
        }
    }
}

impl FromStr for VulnerabilitySource {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CICD" => Ok(VulnerabilitySource::Cicd),
            "RUNTIME" => Ok(VulnerabilitySource::Runtime),
            _ => Err(ReconcileError::validation(format!(
                "unknown vulnerability source '{}'. Expected CICD or RUNTIME",
                s
            ))),
        }
    }
}

impl fmt::Display for VulnerabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an inbound report describes.
///
/// Vulnerability scans carry findings and replace the vulnerability set of
/// every package they re-report; content analyses only establish which
/// packages exist in which resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    VulnerabilityScan,
    ContentAnalysis,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::VulnerabilityScan => "VULNERABILITY_SCAN",
            ReportKind::ContentAnalysis => "CONTENT_ANALYSIS",
        }
    }

    /// Whether packages re-reported by this kind of report get their
    /// vulnerability association rewritten.
    pub fn updates_package_vulnerabilities(&self) -> bool {
        match self {
            ReportKind::VulnerabilityScan => true,
            ReportKind::ContentAnalysis => false,
        }
    }

    /// Default application-level policy: full scans replace the resource
    /// membership, content analyses extend it.
    pub fn replaces_application_resources(&self) -> bool {
        match self {
            ReportKind::VulnerabilityScan => true,
            ReportKind::ContentAnalysis => false,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
