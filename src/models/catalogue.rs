//! Rule catalogue (benchmark) model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::XccdfNamespace;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Unknown,
}

impl Severity {
    /// Map a catalogue `severity` attribute, defaulting to `Unknown`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("medium") => Self::Medium,
            Some("high") => Self::High,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }
}

/// A cross-reference identifier attached to a rule (`ident` element).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceId {
    pub system: String,
    pub value: String,
}

impl ReferenceId {
    /// CCI references are told apart by their system URI or value prefix.
    pub fn is_cci(&self) -> bool {
        self.system.to_ascii_lowercase().contains("cci") || self.value.starts_with("CCI-")
    }
}

/// Rule metadata from a catalogue. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleRecord {
    pub rule_id: String,
    pub group_id: String,
    pub group_title: String,
    pub title: String,
    pub version: String,
    pub severity: Severity,
    pub description: String,
    pub discussion: String,
    pub check_text: String,
    pub fix_text: String,
    pub reference_ids: Vec<ReferenceId>,
}

impl RuleRecord {
    /// Metadata-absent stand-in used when a rule cannot be resolved.
    pub fn placeholder(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            group_id: rule_id.to_string(),
            group_title: String::new(),
            title: rule_id.to_string(),
            version: String::new(),
            severity: Severity::Unknown,
            description: String::new(),
            discussion: String::new(),
            check_text: String::new(),
            fix_text: String::new(),
            reference_ids: Vec::new(),
        }
    }

    pub fn ccis(&self) -> Vec<String> {
        self.reference_ids
            .iter()
            .filter(|r| r.is_cci())
            .map(|r| r.value.clone())
            .collect()
    }

    pub fn legacy_ids(&self) -> Vec<String> {
        self.reference_ids
            .iter()
            .filter(|r| !r.is_cci())
            .map(|r| r.value.clone())
            .collect()
    }
}

/// Parsed rule catalogue keyed by rule identifier.
///
/// Identifiers are opaque, case-sensitive strings.
#[derive(Debug, Clone)]
pub struct Catalogue {
    /// Source filename; the cache key for externally loaded catalogues.
    pub source: String,
    pub benchmark_id: String,
    pub title: String,
    pub version: String,
    pub release_info: String,
    pub namespace: XccdfNamespace,
    pub rules: HashMap<String, RuleRecord>,
}

impl Catalogue {
    pub fn get(&self, rule_id: &str) -> Option<&RuleRecord> {
        self.rules.get(rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
