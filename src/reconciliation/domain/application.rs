use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ApplicationId, ApplicationType, Resource};

/// Descriptive fields of an Application, as supplied by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub application_type: ApplicationType,
    pub labels: BTreeSet<String>,
    pub environments: BTreeSet<String>,
}

impl ApplicationInfo {
    pub fn new(name: impl Into<String>, application_type: ApplicationType) -> Self {
        Self {
            name: name.into(),
            application_type,
            labels: BTreeSet::new(),
            environments: BTreeSet::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments
            .extend(environments.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> ApplicationId {
        ApplicationId::from_name(&self.name)
    }
}

/// Top-level scanned unit composed of Resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub application_type: ApplicationType,
    pub labels: BTreeSet<String>,
    pub environments: BTreeSet<String>,
    pub resources: Vec<Resource>,
}

impl Application {
    pub fn new(name: impl Into<String>, application_type: ApplicationType) -> Self {
        Self::from_info(ApplicationInfo::new(name, application_type))
    }

    pub fn from_info(info: ApplicationInfo) -> Self {
        Self {
            id: info.id(),
            name: info.name,
            application_type: info.application_type,
            labels: info.labels,
            environments: info.environments,
            resources: Vec::new(),
        }
    }

    /// Replaces the descriptive fields, keeping ID and resources.
    pub fn apply_info(&mut self, info: ApplicationInfo) {
        self.name = info.name;
        self.application_type = info.application_type;
        self.labels = info.labels;
        self.environments = info.environments;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_sorted_and_deduplicated() {
        let info = ApplicationInfo::new("app1", ApplicationType::Pod)
            .with_labels(["team=b", "team=a", "team=b"]);
        assert_eq!(
            info.labels.iter().cloned().collect::<Vec<_>>(),
            vec!["team=a".to_string(), "team=b".to_string()]
        );
    }

    #[test]
    fn test_id_depends_only_on_name() {
        let a = ApplicationInfo::new("app1", ApplicationType::Pod).with_environments(["prod"]);
        let b = ApplicationInfo::new("app1", ApplicationType::Image);
        assert_eq!(a.id(), b.id());
        assert_eq!(Application::from_info(a).id, ApplicationId::from_name("app1"));
    }

    #[test]
    fn test_apply_info_keeps_resources() {
        let mut application = Application::new("app1", ApplicationType::Pod);
        application
            .resources
            .push(Resource::new("h1", "r1", crate::reconciliation::domain::ResourceType::Image));
        application.apply_info(
            ApplicationInfo::new("app1", ApplicationType::Image).with_labels(["x"]),
        );
        assert_eq!(application.application_type, ApplicationType::Image);
        assert_eq!(application.resources.len(), 1);
        assert!(application.labels.contains("x"));
    }
}
