/// Scan tree core - entities, identity, attribution and the reconciliation engine
pub mod domain;
pub mod services;
