use serde::{Deserialize, Serialize};

use super::{CisCheckId, CisLevel};

/// Result of one CIS Docker Benchmark check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CisDockerBenchmarkCheck {
    pub id: CisCheckId,
    pub code: String,
    pub level: CisLevel,
    pub descriptions: String,
}

impl CisDockerBenchmarkCheck {
    pub fn new(code: impl Into<String>, level: CisLevel, descriptions: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: CisCheckId::from_code(&code),
            code,
            level,
            descriptions: descriptions.into(),
        }
    }
}
