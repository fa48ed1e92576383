pub mod application;
pub mod attribution;
pub mod cis_check;
pub mod identity;
pub mod kinds;
pub mod package;
pub mod resource;
pub mod severity;
pub mod vulnerability;

pub use application::{Application, ApplicationInfo};
pub use attribution::TransactionParams;
pub use cis_check::CisDockerBenchmarkCheck;
pub use identity::{
    ApplicationId, CisCheckId, PackageId, PkgVulId, ResourceId, ResourcePkgId, VulnerabilityId,
};
pub use kinds::{ApplicationType, ReportKind, ResourceType, VulnerabilitySource};
pub use package::Package;
pub use resource::Resource;
pub use severity::{CisLevel, Severity};
pub use vulnerability::{Cvss, Vulnerability};
