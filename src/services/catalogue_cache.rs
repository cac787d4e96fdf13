//! Batch-wide catalogue cache keyed by catalogue basename.
//!
//! Built once before any scan is processed and then only read. Passed to
//! the resolver explicitly so tests can build isolated caches.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ExtractOptions;
use crate::models::catalogue::Catalogue;
use crate::parsers::catalogue::CatalogueParser;
use crate::parsers::DocumentParser;
use crate::services::archive::{collect_catalogue_documents, Extraction};

#[derive(Debug, Default)]
pub struct CatalogueCache {
    entries: BTreeMap<String, Catalogue>,
    /// Documents that matched the suffix but did not parse, with the reason.
    rejected: BTreeMap<String, String>,
    /// Archive-level problems met while building the cache.
    warnings: Vec<String>,
    /// Basenames seen more than once; the later copy was kept.
    duplicates: Vec<String>,
}

impl CatalogueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract and parse every catalogue under `dir`.
    ///
    /// A missing benchmark directory yields an empty cache so that
    /// self-contained scans still convert.
    pub fn build(dir: &Path, options: &ExtractOptions) -> Self {
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "Benchmark directory not found, external references will not resolve");
            return Self::new();
        }
        match collect_catalogue_documents(dir, options) {
            Ok(extraction) => Self::from_extraction(extraction),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Could not read benchmark directory");
                let mut cache = Self::new();
                cache.warnings.push(e.to_string());
                cache
            }
        }
    }

    pub fn from_extraction(extraction: Extraction) -> Self {
        let mut cache = Self::from_documents(extraction.documents);
        cache
            .warnings
            .extend(extraction.warnings.iter().map(ToString::to_string));
        cache.duplicates.extend(extraction.duplicates);
        cache
    }

    /// Parse raw catalogue documents keyed by basename.
    pub fn from_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let parser = CatalogueParser::new();
        let mut cache = Self::new();
        for (name, data) in documents {
            match parser.parse(&name, &data) {
                Ok(catalogue) => {
                    tracing::debug!(file = %name, rules = catalogue.len(), "Parsed catalogue");
                    cache.insert(name, catalogue);
                }
                Err(e) => {
                    tracing::warn!(file = %name, kind = parser.document_kind(), error = %e, "Skipping unparseable document");
                    cache.rejected.insert(name, e.to_string());
                }
            }
        }
        tracing::info!(count = cache.len(), "Catalogue cache ready");
        cache
    }

    /// Insert under `key`; a later document with the same name replaces the earlier one.
    fn insert(&mut self, key: String, catalogue: Catalogue) {
        if self.entries.insert(key.clone(), catalogue).is_some() {
            tracing::warn!(file = %key, "Replacing cached catalogue with the same filename");
            self.duplicates
                .push(format!("duplicate catalogue filename {key}, kept the later copy"));
        }
    }

    /// Exact, case-sensitive lookup by basename.
    pub fn get(&self, key: &str) -> Option<&Catalogue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rejected(&self) -> &BTreeMap<String, String> {
        &self.rejected
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}
