//! Deterministic, content-derived identifiers.
//!
//! Every ID is a version-5 UUID in the nil namespace over the entity's
//! natural key, so re-scanning the same logical thing lands on the same row.
//! Single-field keys are hashed as is. Multi-field keys are hashed as each
//! field prefixed with its byte length (`3:a.b1:1`), so no field content can
//! shift a boundary between fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::reconciliation::domain::ResourceType;
use crate::shared::error::ReconcileError;

fn derive(natural_key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::nil(), natural_key.as_bytes())
}

fn derive_fields(fields: &[&str]) -> Uuid {
    let key: String = fields
        .iter()
        .map(|field| format!("{}:{}", field.len(), field))
        .collect();
    derive(&key)
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = ReconcileError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    ReconcileError::validation(format!(
                        "invalid {} '{}': {}",
                        stringify!($name),
                        s,
                        e
                    ))
                })
            }
        }
    };
}

entity_id!(
    /// Identifier of an Application, derived from its name
    ApplicationId
);
entity_id!(
    /// Identifier of a Resource, derived from hash, name and type
    ResourceId
);
entity_id!(
    /// Identifier of a Package, derived from name and version
    PackageId
);
entity_id!(
    /// Identifier of a Vulnerability, derived from its name
    VulnerabilityId
);
entity_id!(
    /// Identifier of a CIS Docker Benchmark check, derived from its code
    CisCheckId
);
entity_id!(
    /// Composite key of a Resource→Package edge
    ResourcePkgId
);
entity_id!(
    /// Composite key of a Package→Vulnerability edge
    PkgVulId
);

impl ApplicationId {
    pub fn from_name(name: &str) -> Self {
        Self(derive(name))
    }
}

impl ResourceId {
    pub fn from_parts(hash: &str, name: &str, resource_type: ResourceType) -> Self {
        Self(derive_fields(&[hash, name, resource_type.as_str()]))
    }
}

impl PackageId {
    pub fn from_name_version(name: &str, version: &str) -> Self {
        Self(derive_fields(&[name, version]))
    }
}

impl VulnerabilityId {
    pub fn from_name(name: &str) -> Self {
        Self(derive(name))
    }
}

impl CisCheckId {
    pub fn from_code(code: &str) -> Self {
        Self(derive(code))
    }
}

impl ResourcePkgId {
    pub fn new(resource_id: &ResourceId, package_id: &PackageId) -> Self {
        Self(derive_fields(&[
            resource_id.to_string().as_str(),
            package_id.to_string().as_str(),
        ]))
    }
}

impl PkgVulId {
    pub fn new(package_id: &PackageId, vulnerability_id: &VulnerabilityId) -> Self {
        Self(derive_fields(&[
            package_id.to_string().as_str(),
            vulnerability_id.to_string().as_str(),
        ]))
    }
}
