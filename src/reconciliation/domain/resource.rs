use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{CisDockerBenchmarkCheck, Package, PackageId, ResourceId, ResourceType};

/// A scanned artifact (image, directory, file, root filesystem)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub hash: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub reporting_analyzers: BTreeSet<String>,
    pub packages: Vec<Package>,
    pub cis_docker_benchmark_checks: Vec<CisDockerBenchmarkCheck>,
}

impl Resource {
    pub fn new(hash: impl Into<String>, name: impl Into<String>, resource_type: ResourceType) -> Self {
        let hash = hash.into();
        let name = name.into();
        Self {
            id: ResourceId::from_parts(&hash, &name, resource_type),
            hash,
            name,
            resource_type,
            reporting_analyzers: BTreeSet::new(),
            packages: Vec::new(),
            cis_docker_benchmark_checks: Vec::new(),
        }
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_cis_check(mut self, check: CisDockerBenchmarkCheck) -> Self {
        self.cis_docker_benchmark_checks.push(check);
        self
    }

    pub fn package(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| &p.id == id)
    }

    /// Same resource with no packages, checks or attribution.
    pub fn shell(&self) -> Self {
        Self {
            id: self.id,
            hash: self.hash.clone(),
            name: self.name.clone(),
            resource_type: self.resource_type,
            reporting_analyzers: BTreeSet::new(),
            packages: Vec::new(),
            cis_docker_benchmark_checks: Vec::new(),
        }
    }
}
