//! CKLB (STIG Viewer 3) checklist writer.
//!
//! One document per scan. Items follow the scan's outcome order exactly,
//! repeats included. Identifiers are derived from content so identical
//! inputs render byte-identical documents.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::ConvertError;
use crate::models::catalogue::Severity;
use crate::models::checklist::{
    BenchmarkInfo, CklbDocument, CklbRule, CklbStig, CklbTargetData, MergeResult, MergedRecord,
    TargetInfo,
};
use crate::models::scan::ScanResult;
use crate::services::fingerprint;

pub const CKLB_VERSION: &str = "1.0";
pub const CKLB_EXTENSION: &str = "cklb";

/// Host identity for the checklist, annotated when metadata is incomplete.
pub fn target_info(scan: &ScanResult, merge: &MergeResult<'_>) -> TargetInfo {
    let comment = if merge.resolved {
        String::new()
    } else if let Some(missing) = merge.missing_reference.as_deref() {
        format!("Benchmark {missing} was not found; rule metadata is unavailable.")
    } else {
        "Scan does not reference a usable benchmark; rule metadata is unavailable.".to_string()
    };

    TargetInfo {
        hostname: scan.hostname.clone(),
        address: scan.address.clone(),
        mac_address: scan.mac_address.clone(),
        fqdn: scan.fqdn.clone(),
        comment,
    }
}

/// Benchmark identity for the checklist header.
pub fn benchmark_info(scan: &ScanResult, merge: &MergeResult<'_>) -> BenchmarkInfo {
    match merge.catalogue {
        Some(catalogue) => BenchmarkInfo::from_catalogue(catalogue),
        None => BenchmarkInfo::from_scan(scan),
    }
}

/// Build the checklist document for one host.
pub fn build_checklist(
    target: &TargetInfo,
    benchmark: &BenchmarkInfo,
    records: &[MergedRecord<'_>],
) -> CklbDocument {
    let stig_uuid = fingerprint::stig_uuid(&target.hostname, &benchmark.id);

    let rules = records
        .iter()
        .enumerate()
        .map(|(position, record)| checklist_item(target, benchmark, stig_uuid, position, record))
        .collect::<Vec<_>>();

    CklbDocument {
        title: format!("{}_{}", target.hostname, benchmark.id),
        id: fingerprint::checklist_uuid(&target.hostname, &benchmark.id),
        active: false,
        mode: 1,
        has_path: true,
        target_data: CklbTargetData {
            target_type: "Computing".to_string(),
            host_name: target.hostname.clone(),
            ip_address: target.address.clone(),
            mac_address: target.mac_address.clone(),
            fqdn: target.fqdn.clone(),
            comments: target.comment.clone(),
            role: "None".to_string(),
            is_web_database: false,
            technology_area: String::new(),
            web_db_site: String::new(),
            web_db_instance: String::new(),
            classification: None,
        },
        stigs: vec![CklbStig {
            stig_name: benchmark.title.clone(),
            display_name: benchmark.title.clone(),
            stig_id: benchmark.id.clone(),
            release_info: benchmark.release_info.clone(),
            version: benchmark.version.clone(),
            uuid: stig_uuid,
            reference_identifier: String::new(),
            size: rules.len(),
            rules,
        }],
        cklb_version: CKLB_VERSION.to_string(),
    }
}

fn checklist_item(
    target: &TargetInfo,
    benchmark: &BenchmarkInfo,
    stig_uuid: uuid::Uuid,
    position: usize,
    record: &MergedRecord<'_>,
) -> CklbRule {
    let rule = &record.rule;
    let outcome = record.outcome;
    // Without catalogue metadata the scanner's own severity is the best available.
    let severity = if record.matched {
        rule.severity
    } else {
        Severity::parse(outcome.severity.as_deref())
    };

    let mut comments = outcome.message.clone().unwrap_or_default();
    if !record.matched && target.comment.is_empty() {
        if !comments.is_empty() {
            comments.push('\n');
        }
        comments.push_str("Rule definition not found in the benchmark.");
    }

    CklbRule {
        uuid: fingerprint::rule_uuid(&target.hostname, &benchmark.id, &outcome.rule_id, position),
        stig_uuid,
        group_id: rule.group_id.clone(),
        group_title: rule.group_title.clone(),
        rule_id: outcome.rule_id.clone(),
        rule_id_src: outcome.rule_id.clone(),
        rule_version: rule.version.clone(),
        rule_title: rule.title.clone(),
        severity: severity.as_str().to_string(),
        discussion: rule.discussion.clone(),
        check_content: rule.check_text.clone(),
        fix_text: rule.fix_text.clone(),
        ccis: rule.ccis(),
        legacy_ids: rule.legacy_ids(),
        status: record.status,
        finding_details: outcome.finding_details(),
        comments,
        overrides: serde_json::Map::new(),
    }
}

/// Serialize a checklist as pretty-printed JSON with a trailing newline.
pub fn render(document: &CklbDocument) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Reduce a name component to `[A-Za-z0-9_-]`, turning whitespace into `_`.
pub fn sanitize_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Output filename for a host and benchmark title, without collision handling.
pub fn output_file_name(hostname: &str, title: &str) -> String {
    let host = non_empty_or(sanitize_component(hostname), "Unknown_Host");
    let title = non_empty_or(sanitize_component(title), "Unknown_STIG");
    format!("{host}_{title}.{CKLB_EXTENSION}")
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Write `contents` to `dir/name` so readers see either the old file or the
/// complete new one, never a partial document.
pub fn write_atomically(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf, ConvertError> {
    let target = dir.join(name);
    let write_error = |source: std::io::Error| ConvertError::OutputWrite {
        path: target.clone(),
        source,
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(contents).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(&target).map_err(|e| write_error(e.error))?;
    Ok(target)
}

/// Make sure the output directory exists and is a directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), ConvertError> {
    fs::create_dir_all(dir).map_err(|source| ConvertError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::checklist::ChecklistStatus;
    use crate::parsers::scan::ScanParser;
    use crate::parsers::DocumentParser;
    use crate::services::catalogue_cache::CatalogueCache;
    use crate::services::resolver::resolve;

    const SCAN_SELF: &[u8] = include_bytes!("../../tests/fixtures/scan_self_contained.xml");
    const SCAN_EXTERNAL: &[u8] = include_bytes!("../../tests/fixtures/scan_external_ref.xml");
    const BENCH_V11: &[u8] = include_bytes!("../../tests/fixtures/bench_v11_xccdf.xml");

    fn document_for(scan: &ScanResult, cache: &CatalogueCache) -> CklbDocument {
        let merge = resolve(scan, cache);
        build_checklist(&target_info(scan, &merge), &benchmark_info(scan, &merge), &merge.records)
    }

    #[test]
    fn builds_items_in_outcome_order() {
        let scan = ScanParser::new().parse("r1.xml", SCAN_SELF).unwrap();
        let doc = document_for(&scan, &CatalogueCache::new());
        assert_eq!(doc.target_data.host_name, "r1");
        assert_eq!(doc.target_data.ip_address, "10.0.0.5");
        assert_eq!(doc.stigs.len(), 1);
        let stig = &doc.stigs[0];
        assert_eq!(stig.stig_name, "Router Security Technical Implementation Guide");
        assert_eq!(stig.size, 3);
        let rows: Vec<_> = stig.rules.iter().map(|r| (r.rule_id.as_str(), r.status)).collect();
        assert_eq!(
            rows,
            vec![
                ("SV-3001r1_rule", ChecklistStatus::NotAFinding),
                ("SV-3002r1_rule", ChecklistStatus::Open),
                ("SV-3003r1_rule", ChecklistStatus::NotApplicable),
            ]
        );
        assert_eq!(stig.rules[0].ccis, vec!["CCI-001368"]);
        assert_eq!(stig.rules[0].group_id, "V-3001");
        assert_eq!(stig.rules[1].comments, "Deny statements lack the log keyword");
        assert!(doc.target_data.comments.is_empty());
    }

    #[test]
    fn unresolved_scan_gets_placeholders_and_target_comment() {
        let scan = ScanParser::new().parse("web01.xml", SCAN_EXTERNAL).unwrap();
        let doc = document_for(&scan, &CatalogueCache::new());
        assert!(doc.target_data.comments.contains("bench.xml"));
        let stig = &doc.stigs[0];
        assert_eq!(stig.stig_id, "Bench_STIG");
        assert_eq!(stig.rules.len(), 3);
        assert_eq!(stig.rules[0].rule_title, "SV-2001r2_rule");
        assert_eq!(stig.rules[0].severity, "unknown");
        assert!(stig.rules[0].check_content.is_empty());
        assert_eq!(stig.rules[0].status, ChecklistStatus::Open);
        assert_eq!(
            stig.rules[0].finding_details,
            "Scanner result: fail\nCheck performed: oval:mil.disa.stig:def:2001"
        );
    }

    #[test]
    fn unmatched_rule_is_annotated_when_catalogue_resolved() {
        let scan = ScanParser::new().parse("web01.xml", SCAN_EXTERNAL).unwrap();
        let cache = CatalogueCache::from_documents(vec![("bench.xml".to_string(), BENCH_V11.to_vec())]);
        let doc = document_for(&scan, &cache);
        let rules = &doc.stigs[0].rules;
        assert_eq!(rules[0].rule_title, "The audit service must be running.");
        assert_eq!(rules[0].comments, "auditd is inactive");
        assert_eq!(rules[2].comments, "Rule definition not found in the benchmark.");
        assert_eq!(doc.stigs[0].stig_name, "Legacy Operating System STIG");
    }

    #[test]
    fn placeholder_takes_severity_from_scan() {
        let mut scan = ScanParser::new().parse("r1.xml", SCAN_SELF).unwrap();
        scan.outcomes[0].rule_id = "SV-0000r0_rule".to_string();
        let doc = document_for(&scan, &CatalogueCache::new());
        let rules = &doc.stigs[0].rules;
        assert_eq!(rules[0].rule_title, "SV-0000r0_rule");
        assert_eq!(rules[0].severity, "high");
        assert_eq!(rules[1].severity, "medium");
    }

    #[test]
    fn rendering_is_deterministic() {
        let scan = ScanParser::new().parse("r1.xml", SCAN_SELF).unwrap();
        let cache = CatalogueCache::new();
        let first = render(&document_for(&scan, &cache)).unwrap();
        let second = render(&document_for(&scan, &cache)).unwrap();
        assert_eq!(first, second);
        let value: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(value["stigs"][0]["rules"][1]["status"], "open");
        assert_eq!(value["cklb_version"], "1.0");
    }

    #[test]
    fn repeated_rules_get_distinct_uuids() {
        let mut scan = ScanParser::new().parse("r1.xml", SCAN_SELF).unwrap();
        let repeat = scan.outcomes[0].clone();
        scan.outcomes.push(repeat);
        let doc = document_for(&scan, &CatalogueCache::new());
        let rules = &doc.stigs[0].rules;
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].rule_id, rules[3].rule_id);
        assert_ne!(rules[0].uuid, rules[3].uuid);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(
            output_file_name("web01.example.mil", "Red Hat Enterprise Linux 9 STIG"),
            "web01examplemil_Red_Hat_Enterprise_Linux_9_STIG.cklb"
        );
        assert_eq!(output_file_name("r1", "a/b\\c:d"), "r1_abcd.cklb");
        assert_eq!(output_file_name("", "???"), "Unknown_Host_Unknown_STIG.cklb");
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_atomically(dir.path(), "h_t.cklb", b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");
        write_atomically(dir.path(), "h_t.cklb", b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = write_atomically(&missing, "h_t.cklb", b"x").unwrap_err();
        assert!(matches!(err, ConvertError::OutputWrite { .. }));
        assert!(!missing.exists());
    }
}
