//! Merged record set and the CKLB (STIG Viewer 3) document model.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::catalogue::{Catalogue, RuleRecord};
use crate::models::scan::{OutcomeRecord, ScanResult};

/// Checklist status understood by the review application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Open,
    NotAFinding,
    NotApplicable,
    NotReviewed,
}

impl std::fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::NotAFinding => write!(f, "NotAFinding"),
            Self::NotApplicable => write!(f, "NotApplicable"),
            Self::NotReviewed => write!(f, "NotReviewed"),
        }
    }
}

/// Per-status counts for one output document.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusTally {
    pub open: usize,
    pub not_a_finding: usize,
    pub not_applicable: usize,
    pub not_reviewed: usize,
}

impl StatusTally {
    pub fn record(&mut self, status: ChecklistStatus) {
        match status {
            ChecklistStatus::Open => self.open += 1,
            ChecklistStatus::NotAFinding => self.not_a_finding += 1,
            ChecklistStatus::NotApplicable => self.not_applicable += 1,
            ChecklistStatus::NotReviewed => self.not_reviewed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.open + self.not_a_finding + self.not_applicable + self.not_reviewed
    }
}

impl FromIterator<ChecklistStatus> for StatusTally {
    fn from_iter<I: IntoIterator<Item = ChecklistStatus>>(iter: I) -> Self {
        let mut tally = Self::default();
        for status in iter {
            tally.record(status);
        }
        tally
    }
}

/// One outcome joined with its rule metadata (or a placeholder).
#[derive(Debug, Clone)]
pub struct MergedRecord<'a> {
    pub outcome: &'a OutcomeRecord,
    pub rule: Cow<'a, RuleRecord>,
    pub status: ChecklistStatus,
    /// False when the rule metadata is a placeholder.
    pub matched: bool,
}

/// Where the metadata of a merge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueSource {
    Embedded,
    Cache,
    Unavailable,
}

/// Result of joining a scan with its catalogue.
#[derive(Debug, Clone)]
pub struct MergeResult<'a> {
    pub records: Vec<MergedRecord<'a>>,
    pub resolved: bool,
    pub source: CatalogueSource,
    pub catalogue: Option<&'a Catalogue>,
    /// Basename that could not be found, when resolution failed on a reference.
    pub missing_reference: Option<String>,
    /// Cache keys available at resolution time, for diagnostics.
    pub available: Vec<String>,
}

impl MergeResult<'_> {
    pub fn tally(&self) -> StatusTally {
        self.records.iter().map(|r| r.status).collect()
    }

    pub fn unmatched(&self) -> usize {
        self.records.iter().filter(|r| !r.matched).count()
    }
}

/// Benchmark identity written into the checklist.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkInfo {
    pub id: String,
    pub title: String,
    pub version: String,
    pub release_info: String,
}

impl BenchmarkInfo {
    pub fn from_catalogue(catalogue: &Catalogue) -> Self {
        Self {
            id: catalogue.benchmark_id.clone(),
            title: catalogue.title.clone(),
            version: catalogue.version.clone(),
            release_info: catalogue.release_info.clone(),
        }
    }

    /// Identity derived from the scan alone when no catalogue resolved.
    pub fn from_scan(scan: &ScanResult) -> Self {
        let id = scan.fallback_benchmark_id();
        Self {
            title: id.clone(),
            id,
            version: String::new(),
            release_info: String::new(),
        }
    }
}

/// Host identity written into the checklist.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInfo {
    pub hostname: String,
    pub address: String,
    pub mac_address: String,
    pub fqdn: String,
    pub comment: String,
}

// -- CKLB document (STIG Viewer 3 JSON) --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CklbDocument {
    pub title: String,
    pub id: Uuid,
    pub active: bool,
    pub mode: u8,
    pub has_path: bool,
    pub target_data: CklbTargetData,
    pub stigs: Vec<CklbStig>,
    pub cklb_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CklbTargetData {
    pub target_type: String,
    pub host_name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub fqdn: String,
    pub comments: String,
    pub role: String,
    pub is_web_database: bool,
    pub technology_area: String,
    pub web_db_site: String,
    pub web_db_instance: String,
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CklbStig {
    pub stig_name: String,
    pub display_name: String,
    pub stig_id: String,
    pub release_info: String,
    pub version: String,
    pub uuid: Uuid,
    pub reference_identifier: String,
    pub size: usize,
    pub rules: Vec<CklbRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CklbRule {
    pub uuid: Uuid,
    pub stig_uuid: Uuid,
    pub group_id: String,
    pub group_title: String,
    pub rule_id: String,
    pub rule_id_src: String,
    pub rule_version: String,
    pub rule_title: String,
    pub severity: String,
    pub discussion: String,
    pub check_content: String,
    pub fix_text: String,
    pub ccis: Vec<String>,
    pub legacy_ids: Vec<String>,
    pub status: ChecklistStatus,
    pub finding_details: String,
    pub comments: String,
    pub overrides: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ChecklistStatus::NotAFinding).unwrap();
        assert_eq!(json, "not_a_finding");
        let json = serde_json::to_value(ChecklistStatus::NotApplicable).unwrap();
        assert_eq!(json, "not_applicable");
    }

    #[test]
    fn status_display() {
        assert_eq!(ChecklistStatus::Open.to_string(), "Open");
        assert_eq!(ChecklistStatus::NotReviewed.to_string(), "NotReviewed");
    }

    #[test]
    fn tally_collects_statuses() {
        let tally: StatusTally = [
            ChecklistStatus::Open,
            ChecklistStatus::Open,
            ChecklistStatus::NotAFinding,
            ChecklistStatus::NotReviewed,
        ]
        .into_iter()
        .collect();
        assert_eq!(tally.open, 2);
        assert_eq!(tally.not_a_finding, 1);
        assert_eq!(tally.not_applicable, 0);
        assert_eq!(tally.not_reviewed, 1);
        assert_eq!(tally.total(), 4);
    }
}
