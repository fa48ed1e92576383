use serde::{Deserialize, Serialize};

use super::{PackageId, Vulnerability};

/// A software package, shared by every resource that contains it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub version: String,
    pub license: String,
    pub language: String,
    pub vulnerabilities: Vec<Vulnerability>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            id: PackageId::from_name_version(&name, &version),
            name,
            version,
            license: String::new(),
            language: String::new(),
            vulnerabilities: Vec::new(),
        }
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_vulnerability(mut self, vulnerability: Vulnerability) -> Self {
        self.vulnerabilities.push(vulnerability);
        self
    }

    /// Adds a vulnerability unless one with the same ID is already attached,
    /// in which case the scanner attribution of both is merged.
    pub fn attach_vulnerability(&mut self, vulnerability: Vulnerability) {
        match self
            .vulnerabilities
            .iter_mut()
            .find(|v| v.id == vulnerability.id)
        {
            Some(existing) => existing.absorb_scanners(&vulnerability),
            None => self.vulnerabilities.push(vulnerability),
        }
    }
}
