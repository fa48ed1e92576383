use crate::reconciliation::domain::ApplicationId;

/// CommitSummary - what one reconciliation+commit cycle wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Application whose tree was committed, if the cycle was application-scoped
    pub application_id: Option<ApplicationId>,
    pub resources: usize,
    pub packages: usize,
    pub vulnerabilities: usize,
}
