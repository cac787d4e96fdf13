//! Namespace and resolution diagnostics for scan documents.
//!
//! Explains why a scan converts with or without rule metadata: which XCCDF
//! version it uses, whether it embeds a benchmark, what it references, and
//! whether that reference is present in the catalogue cache.

use serde::Serialize;

use crate::models::catalogue::Catalogue;
use crate::models::XccdfNamespace;
use crate::parsers::scan::ScanParser;
use crate::parsers::xml::{parse_document, Xccdf};
use crate::parsers::DocumentParser;
use crate::services::catalogue_cache::CatalogueCache;

const SAMPLE_SIZE: usize = 3;

/// Findings for one scan document.
#[derive(Debug, Serialize)]
pub struct Diagnosis {
    pub source: String,
    pub root_element: String,
    pub root_namespace: Option<String>,
    pub namespace: XccdfNamespace,
    /// Rule count of the embedded benchmark, if the scan is self-contained.
    pub embedded_rules: Option<usize>,
    pub has_test_result: bool,
    pub reference_href: Option<String>,
    pub reference_id: Option<String>,
    pub rule_results: usize,
    /// First few `(rule id, raw result)` pairs.
    pub samples: Vec<(String, String)>,
    pub catalogue: Option<CatalogueCheck>,
    /// Set when the document could not be read at all.
    pub error: Option<String>,
}

/// Outcome of looking the scan's reference up in the catalogue cache.
#[derive(Debug, Serialize)]
pub struct CatalogueCheck {
    pub key: String,
    pub found: bool,
    pub namespace: Option<XccdfNamespace>,
    /// The catalogue uses a different XCCDF version than the scan. Harmless.
    pub namespace_mismatch: bool,
    pub rules: usize,
    pub sample_check_chars: usize,
    pub sample_fix_chars: usize,
}

impl CatalogueCheck {
    /// Whether the sampled rule carries both check and fix text.
    pub fn has_details(&self) -> bool {
        self.sample_check_chars > 0 && self.sample_fix_chars > 0
    }
}

/// Inspect one scan document against the catalogue cache.
pub fn diagnose(name: &str, data: &[u8], cache: &CatalogueCache) -> Diagnosis {
    let mut diagnosis = Diagnosis {
        source: name.to_string(),
        root_element: String::new(),
        root_namespace: None,
        namespace: XccdfNamespace::Unqualified,
        embedded_rules: None,
        has_test_result: false,
        reference_href: None,
        reference_id: None,
        rule_results: 0,
        samples: Vec::new(),
        catalogue: None,
        error: None,
    };

    let root = match parse_document(name, data) {
        Ok(root) => root,
        Err(e) => {
            diagnosis.error = Some(e.to_string());
            return diagnosis;
        }
    };
    let xccdf = Xccdf::detect(&root);
    diagnosis.root_element = root.name.clone();
    diagnosis.root_namespace = root.namespace.clone();
    diagnosis.namespace = xccdf.namespace();

    if let Some(reference) = xccdf
        .find(&root, "TestResult")
        .and_then(|tr| xccdf.child(tr, "benchmark"))
    {
        diagnosis.reference_href = reference.attr("href").map(str::to_string);
        diagnosis.reference_id = reference.attr("id").map(str::to_string);
    }

    let scan = match ScanParser::new().parse(name, data) {
        Ok(scan) => scan,
        Err(e) => {
            diagnosis.error = Some(e.to_string());
            return diagnosis;
        }
    };
    diagnosis.has_test_result = true;
    diagnosis.namespace = scan.namespace;
    diagnosis.embedded_rules = scan.embedded.as_ref().map(Catalogue::len);
    diagnosis.rule_results = scan.outcomes.len();
    diagnosis.samples = scan
        .outcomes
        .iter()
        .take(SAMPLE_SIZE)
        .map(|o| (o.rule_id.clone(), o.status.clone()))
        .collect();

    if !scan.is_self_contained() {
        diagnosis.catalogue = scan
            .catalogue_reference
            .as_deref()
            .map(|key| check_catalogue(key, scan.namespace, cache));
    }
    diagnosis
}

fn check_catalogue(key: &str, scan_namespace: XccdfNamespace, cache: &CatalogueCache) -> CatalogueCheck {
    let Some(catalogue) = cache.get(key) else {
        return CatalogueCheck {
            key: key.to_string(),
            found: false,
            namespace: None,
            namespace_mismatch: false,
            rules: 0,
            sample_check_chars: 0,
            sample_fix_chars: 0,
        };
    };

    // Lowest rule id, so the sample is stable between runs.
    let sample = catalogue.rules.values().min_by(|a, b| a.rule_id.cmp(&b.rule_id));
    CatalogueCheck {
        key: key.to_string(),
        found: true,
        namespace: Some(catalogue.namespace),
        namespace_mismatch: catalogue.namespace != scan_namespace,
        rules: catalogue.len(),
        sample_check_chars: sample.map_or(0, |r| r.check_text.chars().count()),
        sample_fix_chars: sample.map_or(0, |r| r.fix_text.chars().count()),
    }
}
