//! Scan result (TestResult) model.

use serde::Serialize;

use crate::models::catalogue::Catalogue;
use crate::models::XccdfNamespace;

/// Outcome of one rule evaluated for the host.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutcomeRecord {
    pub rule_id: String,
    /// Raw result text as reported by the scanner.
    pub status: String,
    pub severity: Option<String>,
    /// Name of the `check-content-ref` the scanner evaluated.
    pub check_reference: Option<String>,
    pub message: Option<String>,
}

impl OutcomeRecord {
    pub fn finding_details(&self) -> String {
        let mut details = format!("Scanner result: {}", self.status);
        if let Some(name) = self.check_reference.as_deref().filter(|n| !n.is_empty()) {
            details.push_str(&format!("\nCheck performed: {name}"));
        }
        details
    }
}

/// One parsed scan-result document.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Input filename the scan was read from.
    pub source_name: String,
    pub hostname: String,
    pub address: String,
    pub mac_address: String,
    pub fqdn: String,
    /// Basename of the referenced external catalogue, if declared.
    pub catalogue_reference: Option<String>,
    /// `id` of the referenced benchmark, if declared.
    pub benchmark_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub namespace: XccdfNamespace,
    pub outcomes: Vec<OutcomeRecord>,
    /// Inline catalogue of a self-contained export. Never empty when set.
    pub embedded: Option<Catalogue>,
}

impl ScanResult {
    pub fn is_self_contained(&self) -> bool {
        self.embedded.is_some()
    }

    /// Identifier used for the benchmark when no catalogue could be resolved.
    pub fn fallback_benchmark_id(&self) -> String {
        if let Some(id) = self.benchmark_id.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        if let Some(reference) = self.catalogue_reference.as_deref() {
            let stem = reference
                .strip_suffix(".xml")
                .unwrap_or(reference)
                .to_string();
            if !stem.is_empty() {
                return stem;
            }
        }
        "Unknown_STIG".to_string()
    }
}
