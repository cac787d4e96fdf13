//! Join scan outcomes with catalogue metadata.
//!
//! Resolution never fails. A scan whose catalogue cannot be found still
//! yields one merged record per outcome, carrying placeholder metadata and
//! `resolved = false`.

use std::borrow::Cow;

use crate::models::catalogue::RuleRecord;
use crate::models::checklist::{CatalogueSource, MergeResult, MergedRecord};
use crate::models::scan::ScanResult;
use crate::services::catalogue_cache::CatalogueCache;
use crate::services::status::map_status;

/// Resolve the scan's catalogue and merge every outcome with its rule.
pub fn resolve<'a>(scan: &'a ScanResult, cache: &'a CatalogueCache) -> MergeResult<'a> {
    let mut missing_reference = None;
    let mut available = Vec::new();

    let (catalogue, source) = if let Some(embedded) = scan.embedded.as_ref() {
        (Some(embedded), CatalogueSource::Embedded)
    } else if let Some(reference) = scan.catalogue_reference.as_deref() {
        match cache.get(reference) {
            Some(catalogue) => (Some(catalogue), CatalogueSource::Cache),
            None => {
                available = cache.keys().map(str::to_string).collect();
                tracing::warn!(
                    file = %scan.source_name,
                    missing = reference,
                    available = ?available,
                    "Benchmark not found in catalogue cache"
                );
                missing_reference = Some(reference.to_string());
                (None, CatalogueSource::Unavailable)
            }
        }
    } else {
        tracing::warn!(file = %scan.source_name, "Scan declares no benchmark and embeds none");
        (None, CatalogueSource::Unavailable)
    };

    // A catalogue without rules cannot describe anything.
    let catalogue = catalogue.filter(|c| {
        if c.is_empty() {
            tracing::warn!(file = %scan.source_name, catalogue = %c.source, "Catalogue has no rules");
        }
        !c.is_empty()
    });

    let records = scan
        .outcomes
        .iter()
        .map(|outcome| {
            let found = catalogue.and_then(|c| c.get(&outcome.rule_id));
            MergedRecord {
                outcome,
                rule: found.map_or_else(
                    || Cow::Owned(RuleRecord::placeholder(&outcome.rule_id)),
                    Cow::Borrowed,
                ),
                status: map_status(&outcome.status),
                matched: found.is_some(),
            }
        })
        .collect();

    let result = MergeResult {
        records,
        resolved: catalogue.is_some(),
        source: if catalogue.is_some() {
            source
        } else {
            CatalogueSource::Unavailable
        },
        catalogue,
        missing_reference,
        available,
    };

    if result.resolved && result.unmatched() > 0 {
        tracing::warn!(
            file = %scan.source_name,
            unmatched = result.unmatched(),
            "Rules missing from resolved catalogue"
        );
    }
    result
}
