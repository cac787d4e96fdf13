//! XCCDF scan-result (TestResult) parser.
//!
//! Accepts both standalone `TestResult` documents and `Benchmark` documents
//! carrying a `TestResult`. A `Benchmark` with at least one rule makes the
//! scan self-contained; otherwise the `benchmark` reference inside the
//! `TestResult` names the external catalogue by basename.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime};

use crate::errors::ConvertError;
use crate::models::scan::{OutcomeRecord, ScanResult};
use crate::parsers::catalogue::catalogue_from_tree;
use crate::parsers::xml::{parse_document, XmlElement, Xccdf};
use crate::parsers::DocumentParser;

const FACT_MAC: &str = "urn:xccdf:fact:asset:identifier:mac";
const FACT_FQDN: &str = "urn:xccdf:fact:asset:identifier:fqdn";

/// Parser for scan-result exports.
#[derive(Debug, Default)]
pub struct ScanParser;

impl ScanParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for ScanParser {
    type Output = ScanResult;

    fn parse(&self, name: &str, data: &[u8]) -> Result<ScanResult, ConvertError> {
        let root = parse_document(name, data)?;
        let xccdf = Xccdf::detect(&root);

        let test_result = match xccdf.find(&root, "TestResult") {
            Some(tr) => (tr, xccdf),
            // Last resort: a TestResult bound to some other namespace version.
            None => {
                let tr = std::iter::once(&root)
                    .chain(root.descendants())
                    .find(|el| el.name == "TestResult")
                    .ok_or(ConvertError::NoTestResult)?;
                (tr, Xccdf::of(tr))
            }
        };
        let (test_result, tr_xccdf) = test_result;

        let hostname = tr_xccdf
            .find_all(test_result, "target")
            .map(|t| t.text.as_str())
            .find(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(name));
        let address = tr_xccdf
            .find_all(test_result, "target-address")
            .map(|t| t.text.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string();

        let (mac_address, fqdn) = target_facts(test_result, tr_xccdf);

        let reference = tr_xccdf.child(test_result, "benchmark");
        let catalogue_reference = reference
            .and_then(|b| b.attr("href"))
            .map(reference_basename)
            .filter(|basename| !basename.is_empty());
        let benchmark_id = reference
            .and_then(|b| b.attr("id"))
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let outcomes: Vec<OutcomeRecord> = tr_xccdf
            .find_all(test_result, "rule-result")
            .map(|rr| convert_rule_result(rr, tr_xccdf))
            .collect();

        let embedded = match xccdf.find(&root, "Benchmark") {
            Some(_) => match catalogue_from_tree(name, &root, xccdf) {
                Ok(catalogue) if !catalogue.is_empty() => Some(catalogue),
                Ok(_) => {
                    tracing::debug!(file = name, "Embedded Benchmark has no rules");
                    None
                }
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "Ignoring unreadable embedded Benchmark");
                    None
                }
            },
            None => None,
        };

        Ok(ScanResult {
            source_name: name.to_string(),
            hostname,
            address,
            mac_address,
            fqdn,
            catalogue_reference,
            benchmark_id,
            start_time: test_result.attr("start-time").map(normalize_timestamp),
            end_time: test_result.attr("end-time").map(normalize_timestamp),
            namespace: tr_xccdf.namespace(),
            outcomes,
            embedded,
        })
    }

    fn document_kind(&self) -> &str {
        "scan"
    }
}

/// Reduce a path-qualified reference to its basename.
///
/// Both separators are honoured since exports are produced on either platform.
pub fn reference_basename(href: &str) -> String {
    href.trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn convert_rule_result(rule_result: &XmlElement, xccdf: Xccdf) -> OutcomeRecord {
    let status = xccdf
        .child_text(rule_result, "result")
        .unwrap_or("unknown")
        .to_string();
    let check_reference = xccdf
        .child(rule_result, "check")
        .and_then(|check| xccdf.find_all(check, "check-content-ref").next())
        .and_then(|r| r.attr("name"))
        .map(str::to_string);
    let message = xccdf
        .child_text(rule_result, "message")
        .map(str::to_string);

    OutcomeRecord {
        rule_id: rule_result.attr("idref").unwrap_or_default().to_string(),
        status,
        severity: rule_result.attr("severity").map(str::to_string),
        check_reference,
        message,
    }
}

fn target_facts(test_result: &XmlElement, xccdf: Xccdf) -> (String, String) {
    let mut mac = String::new();
    let mut fqdn = String::new();
    if let Some(facts) = xccdf.child(test_result, "target-facts") {
        for fact in xccdf.children(facts, "fact") {
            match fact.attr("name") {
                Some(FACT_MAC) if mac.is_empty() => mac = fact.text.clone(),
                Some(FACT_FQDN) if fqdn.is_empty() => fqdn = fact.text.clone(),
                _ => {}
            }
        }
    }
    (mac, fqdn)
}

/// Normalize a scanner timestamp; unparseable values are kept verbatim.
fn normalize_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.to_rfc3339();
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown_Host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::XccdfNamespace;

    #[test]
    fn parses_self_contained_scan() {
        let parser = ScanParser::new();
        let data = include_bytes!("../../tests/fixtures/scan_self_contained.xml");
        let scan = parser.parse("scan_self_contained.xml", data).unwrap();
        assert_eq!(scan.hostname, "r1");
        assert_eq!(scan.address, "10.0.0.5");
        assert!(scan.is_self_contained());
        assert_eq!(scan.embedded.as_ref().unwrap().len(), 3);
        let statuses: Vec<_> = scan.outcomes.iter().map(|o| o.status.as_str()).collect();
        assert_eq!(statuses, vec!["pass", "fail", "notapplicable"]);
    }

    #[test]
    fn parses_external_reference_scan() {
        let parser = ScanParser::new();
        let data = include_bytes!("../../tests/fixtures/scan_external_ref.xml");
        let scan = parser.parse("web01_scan.xml", data).unwrap();
        assert!(!scan.is_self_contained());
        assert_eq!(scan.namespace, XccdfNamespace::V1_1);
        assert_eq!(scan.catalogue_reference.as_deref(), Some("bench.xml"));
        assert_eq!(scan.benchmark_id.as_deref(), Some("Bench_STIG"));
        assert_eq!(scan.hostname, "web01");
        assert_eq!(scan.mac_address, "00:11:22:33:44:55");
        assert_eq!(scan.fqdn, "web01.example.mil");
        assert_eq!(scan.outcomes.len(), 3);
    }

    #[test]
    fn extracts_outcome_details() {
        let parser = ScanParser::new();
        let data = include_bytes!("../../tests/fixtures/scan_external_ref.xml");
        let scan = parser.parse("web01_scan.xml", data).unwrap();
        let first = &scan.outcomes[0];
        assert_eq!(first.rule_id, "SV-2001r2_rule");
        assert_eq!(first.status, "fail");
        assert_eq!(first.check_reference.as_deref(), Some("oval:mil.disa.stig:def:2001"));
        assert_eq!(first.message.as_deref(), Some("auditd is inactive"));
    }

    #[test]
    fn missing_hostname_falls_back_to_file_stem() {
        let parser = ScanParser::new();
        let data = br#"<TestResult xmlns="http://checklists.nist.gov/xccdf/1.2" id="t">
            <rule-result idref="a"><result>pass</result></rule-result>
        </TestResult>"#;
        let scan = parser.parse("host-from-name.xml", data).unwrap();
        assert_eq!(scan.hostname, "host-from-name");
        assert_eq!(scan.address, "");
        assert!(scan.catalogue_reference.is_none());
    }

    #[test]
    fn missing_result_is_unknown() {
        let parser = ScanParser::new();
        let data = br#"<TestResult xmlns="http://checklists.nist.gov/xccdf/1.2">
            <target>h</target><rule-result idref="a"/>
        </TestResult>"#;
        let scan = parser.parse("s.xml", data).unwrap();
        assert_eq!(scan.outcomes[0].status, "unknown");
    }

    #[test]
    fn catalogue_document_is_not_a_scan() {
        let parser = ScanParser::new();
        let data = include_bytes!("../../tests/fixtures/bench_v12_xccdf.xml");
        let err = parser.parse("bench_v12_xccdf.xml", data).unwrap_err();
        assert!(matches!(err, ConvertError::NoTestResult));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let parser = ScanParser::new();
        let err = parser.parse("broken.xml", b"<TestResult><target>").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    #[test]
    fn reference_is_reduced_to_basename() {
        assert_eq!(reference_basename("bench.xml"), "bench.xml");
        assert_eq!(reference_basename("/opt/scap/bench.xml"), "bench.xml");
        assert_eq!(reference_basename("C:\\STIGs\\U_Bench-xccdf.xml"), "U_Bench-xccdf.xml");
        assert_eq!(reference_basename("../rel/Bench.xml"), "Bench.xml");
        assert_eq!(reference_basename("dir/"), "");
    }

    #[test]
    fn timestamps_are_normalized() {
        assert_eq!(normalize_timestamp("2025-03-01T10:00:00"), "2025-03-01T10:00:00");
        assert_eq!(
            normalize_timestamp("2025-03-01T10:00:00Z"),
            "2025-03-01T10:00:00+00:00"
        );
        assert_eq!(normalize_timestamp("yesterday"), "yesterday");
    }
}
