//! XCCDF benchmark (rule catalogue) parser.
//!
//! Walks every `Rule` under the `Benchmark`, remembering the enclosing
//! `Group` for the vulnerability number and group title. Works identically
//! for XCCDF 1.1 and 1.2 documents.

use std::collections::HashMap;

use regex::Regex;

use crate::errors::ConvertError;
use crate::models::catalogue::{Catalogue, ReferenceId, RuleRecord, Severity};
use crate::parsers::xml::{parse_document, XmlElement, Xccdf};
use crate::parsers::DocumentParser;

/// Parser for standalone catalogue documents.
#[derive(Debug, Default)]
pub struct CatalogueParser;

impl CatalogueParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for CatalogueParser {
    type Output = Catalogue;

    fn parse(&self, name: &str, data: &[u8]) -> Result<Catalogue, ConvertError> {
        let root = parse_document(name, data)
            .map_err(|e| ConvertError::MalformedCatalogue(e.to_string()))?;
        catalogue_from_tree(name, &root, Xccdf::detect(&root))
    }

    fn document_kind(&self) -> &str {
        "catalogue"
    }
}

/// Build a catalogue from an already parsed tree (standalone or embedded).
pub(crate) fn catalogue_from_tree(
    source: &str,
    root: &XmlElement,
    xccdf: Xccdf,
) -> Result<Catalogue, ConvertError> {
    let benchmark = xccdf
        .find(root, "Benchmark")
        .ok_or_else(|| ConvertError::MalformedCatalogue(format!("{source}: no Benchmark element")))?;

    let benchmark_id = benchmark.attr("id").unwrap_or("Unknown_STIG").to_string();
    let title = xccdf
        .child_text(benchmark, "title")
        .unwrap_or(&benchmark_id)
        .to_string();
    let version = xccdf.child_text(benchmark, "version").unwrap_or_default().to_string();
    let release_info = xccdf
        .children(benchmark, "plain-text")
        .find(|p| p.attr("id") == Some("release-info"))
        .map(|p| p.text.clone())
        .unwrap_or_default();

    let discussion_regex = Regex::new(r"(?s)<VulnDiscussion>(.*?)</VulnDiscussion>")
        .map_err(|e| ConvertError::MalformedCatalogue(e.to_string()))?;

    let mut rules = HashMap::new();
    collect_rules(benchmark, None, xccdf, &discussion_regex, &mut rules, source);

    tracing::debug!(source, rules = rules.len(), namespace = %xccdf.namespace(), "Parsed catalogue");

    Ok(Catalogue {
        source: source.to_string(),
        benchmark_id,
        title,
        version,
        release_info,
        namespace: xccdf.namespace(),
        rules,
    })
}

/// Recursively collect rules, tracking the nearest enclosing group.
fn collect_rules(
    element: &XmlElement,
    group: Option<&XmlElement>,
    xccdf: Xccdf,
    discussion_regex: &Regex,
    rules: &mut HashMap<String, RuleRecord>,
    source: &str,
) {
    for child in &element.children {
        if xccdf.is(child, "Group") {
            collect_rules(child, Some(child), xccdf, discussion_regex, rules, source);
        } else if xccdf.is(child, "Rule") {
            let Some(rule) = convert_rule(child, group, xccdf, discussion_regex) else {
                tracing::warn!(source, "Skipping Rule element without id");
                continue;
            };
            if let Some(previous) = rules.insert(rule.rule_id.clone(), rule) {
                tracing::debug!(source, rule_id = %previous.rule_id, "Duplicate rule id in catalogue");
            }
        } else if !xccdf.is(child, "TestResult") {
            collect_rules(child, group, xccdf, discussion_regex, rules, source);
        }
    }
}

fn convert_rule(
    rule: &XmlElement,
    group: Option<&XmlElement>,
    xccdf: Xccdf,
    discussion_regex: &Regex,
) -> Option<RuleRecord> {
    let rule_id = rule.attr("id").filter(|id| !id.is_empty())?.to_string();

    let (group_id, group_title) = match group {
        Some(g) => (
            g.attr("id").unwrap_or_default().to_string(),
            xccdf.child_text(g, "title").unwrap_or_default().to_string(),
        ),
        None => (rule_id.clone(), String::new()),
    };

    let description = xccdf
        .child_text(rule, "description")
        .unwrap_or_default()
        .to_string();
    let discussion = discussion_regex
        .captures(&description)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| description.clone());

    let check_text = xccdf
        .child(rule, "check")
        .and_then(|check| xccdf.child_text(check, "check-content"))
        .unwrap_or_default()
        .to_string();

    let fix_text = xccdf
        .find_all(rule, "fixtext")
        .next()
        .map(|f| f.text.clone())
        .unwrap_or_default();

    let reference_ids = xccdf
        .children(rule, "ident")
        .filter(|ident| !ident.text.is_empty())
        .map(|ident| ReferenceId {
            system: ident.attr("system").unwrap_or_default().to_string(),
            value: ident.text.clone(),
        })
        .collect();

    Some(RuleRecord {
        title: xccdf.child_text(rule, "title").unwrap_or(&rule_id).to_string(),
        version: xccdf.child_text(rule, "version").unwrap_or_default().to_string(),
        severity: Severity::parse(rule.attr("severity")),
        rule_id,
        group_id,
        group_title,
        description,
        discussion,
        check_text,
        fix_text,
        reference_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::XccdfNamespace;

    #[test]
    fn parses_v12_benchmark() {
        let parser = CatalogueParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v12_xccdf.xml");
        let catalogue = parser.parse("bench_v12_xccdf.xml", data).unwrap();
        assert_eq!(catalogue.namespace, XccdfNamespace::V1_2);
        assert_eq!(catalogue.source, "bench_v12_xccdf.xml");
        assert_eq!(catalogue.benchmark_id, "xccdf_mil.disa.stig_benchmark_Demo_STIG");
        assert_eq!(catalogue.title, "Demo Security Technical Implementation Guide");
        assert_eq!(catalogue.len(), 3);
    }

    #[test]
    fn extracts_rule_fields() {
        let parser = CatalogueParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v12_xccdf.xml");
        let catalogue = parser.parse("bench", data).unwrap();
        let rule = catalogue.get("SV-1001r1_rule").unwrap();
        assert_eq!(rule.group_id, "V-1001");
        assert_eq!(rule.group_title, "SRG-OS-000001");
        assert_eq!(rule.title, "Passwords must be long.");
        assert_eq!(rule.version, "DEMO-01-000001");
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.discussion, "Short passwords are guessable.");
        assert_eq!(rule.check_text, "Inspect the password policy.");
        assert_eq!(rule.fix_text, "Set minimum length to 15.");
        assert_eq!(rule.ccis(), vec!["CCI-000205"]);
        assert_eq!(rule.legacy_ids(), vec!["V-1001", "SV-1001"]);
    }

    #[test]
    fn missing_optional_fields_default() {
        let parser = CatalogueParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v12_xccdf.xml");
        let catalogue = parser.parse("bench", data).unwrap();
        let rule = catalogue.get("SV-1003r1_rule").unwrap();
        assert_eq!(rule.severity, Severity::Unknown);
        assert!(rule.reference_ids.is_empty());
        assert!(rule.fix_text.is_empty());
    }

    #[test]
    fn parses_v11_benchmark_with_default_namespace() {
        let parser = CatalogueParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v11_xccdf.xml");
        let catalogue = parser.parse("bench_v11_xccdf.xml", data).unwrap();
        assert_eq!(catalogue.namespace, XccdfNamespace::V1_1);
        assert_eq!(catalogue.len(), 2);
        let rule = catalogue.get("SV-2001r2_rule").unwrap();
        assert_eq!(rule.severity, Severity::Medium);
        assert_eq!(rule.check_text, "Verify the audit service is running.");
        assert_eq!(catalogue.release_info, "Release: 2 Benchmark Date: 01 Jan 2025");
    }

    #[test]
    fn empty_benchmark_is_valid() {
        let parser = CatalogueParser::new();
        let data = br#"<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.2" id="empty"><title>Empty</title></Benchmark>"#;
        let catalogue = parser.parse("empty_xccdf.xml", data).unwrap();
        assert!(catalogue.is_empty());
        assert_eq!(catalogue.title, "Empty");
    }

    #[test]
    fn rejects_document_without_benchmark() {
        let parser = CatalogueParser::new();
        let data = br#"<TestResult xmlns="http://checklists.nist.gov/xccdf/1.2"/>"#;
        let err = parser.parse("scan.xml", data).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedCatalogue(_)));
    }

    #[test]
    fn rejects_malformed_xml() {
        let parser = CatalogueParser::new();
        let err = parser.parse("broken.xml", b"<Benchmark").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedCatalogue(_)));
    }

    #[test]
    fn rule_ids_are_case_sensitive() {
        let parser = CatalogueParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v12_xccdf.xml");
        let catalogue = parser.parse("bench", data).unwrap();
        assert!(catalogue.get("sv-1001r1_rule").is_none());
    }
}
