/// Read models - aggregate view rows served to listing and dashboard queries
mod aggregate_views;

pub use aggregate_views::{
    ApplicationViewRow, DashboardSummary, LanguageCount, LicenseCount, PackageViewRow,
    ResourceViewRow, SeverityCounts, VulnerabilityViewRow, DEFAULT_MOST_VULNERABLE_LIMIT,
};
