//! Batch pipeline: build the catalogue cache, then convert every scan.
//!
//! Each input ends as a `FileReport` value (converted, skipped, or failed).
//! Only environment problems, such as a missing scan directory or an output
//! directory that cannot be created, end the batch early.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use zip::ZipArchive;

use crate::config::{ConverterConfig, ExtractOptions};
use crate::errors::ConvertError;
use crate::models::checklist::StatusTally;
use crate::parsers::scan::ScanParser;
use crate::parsers::DocumentParser;
use crate::services::archive::{entry_basename, is_archive_name, read_entry};
use crate::services::catalogue_cache::CatalogueCache;
use crate::services::{checklist, fingerprint, resolver};

/// One scan-result document waiting to be converted.
#[derive(Debug, Clone)]
pub struct ScanDocument {
    /// Filename, or `archive.zip/entry.xml` for archive members.
    pub name: String,
    pub data: Vec<u8>,
}

/// A scan input in the scan directory. Nothing is read until it is visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// A loose `*.xml` file.
    File { name: String, path: PathBuf },
    /// A `*.zip` whose `.xml` members are scans.
    Archive { name: String, path: PathBuf },
}

impl ScanSource {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Archive { name, .. } => name,
        }
    }

    /// Read the documents in this source one at a time, handing each to
    /// `visit` before the next is read. Unreadable inputs arrive as failed
    /// reports.
    pub fn for_each_document<F>(&self, options: &ExtractOptions, mut visit: F)
    where
        F: FnMut(Result<ScanDocument, FileReport>),
    {
        match self {
            Self::File { name, path } => visit(
                fs::read(path)
                    .map(|data| ScanDocument {
                        name: name.clone(),
                        data,
                    })
                    .map_err(|e| failed(name.clone(), e)),
            ),
            Self::Archive { name, path } => visit_archive_members(name, path, options, &mut visit),
        }
    }
}

/// Summary of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub catalogues_loaded: usize,
    pub catalogue_warnings: Vec<String>,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Converted(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    /// Status counts summed across all converted files.
    pub fn totals(&self) -> StatusTally {
        self.converted().fold(StatusTally::default(), |mut acc, file| {
            acc.open += file.tally.open;
            acc.not_a_finding += file.tally.not_a_finding;
            acc.not_applicable += file.tally.not_applicable;
            acc.not_reviewed += file.tally.not_reviewed;
            acc
        })
    }

    pub fn converted(&self) -> impl Iterator<Item = &ConvertedFile> {
        self.files.iter().filter_map(|f| match &f.outcome {
            FileOutcome::Converted(converted) => Some(converted),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.outcome)).count()
    }
}

/// Result for one input document.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub source: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted(ConvertedFile),
    /// Input is not a scan export (no TestResult).
    Skipped { reason: String },
    Failed { reason: String },
}

/// A checklist that was written.
#[derive(Debug, Serialize)]
pub struct ConvertedFile {
    pub output: PathBuf,
    pub hostname: String,
    pub benchmark_title: String,
    pub resolved: bool,
    pub missing_reference: Option<String>,
    /// Rules kept with placeholder metadata although the catalogue resolved.
    pub unmatched: usize,
    pub rule_count: usize,
    pub tally: StatusTally,
    pub digest: String,
}

/// Output filenames already used in this run.
#[derive(Debug, Default)]
pub struct OutputNames {
    taken: HashSet<String>,
}

impl OutputNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, appending `_2`, `_3`, ... before the extension on collision.
    pub fn reserve(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }
        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{stem}_{suffix}{extension}");
            if self.taken.insert(candidate.clone()) {
                tracing::warn!(file = name, renamed = %candidate, "Output name already used in this run");
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Run the whole conversion described by `config`.
pub fn run_batch(config: &ConverterConfig) -> Result<BatchReport, ConvertError> {
    let started_at = Utc::now();

    if !config.scan_results_dir.is_dir() {
        return Err(ConvertError::InputDirectory {
            path: config.scan_results_dir.clone(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }
    checklist::ensure_output_dir(&config.output_dir)?;

    let cache = CatalogueCache::build(&config.benchmark_dir, &config.extract);
    let sources = discover_scan_sources(&config.scan_results_dir)?;
    tracing::info!(
        sources = sources.len(),
        catalogues = cache.len(),
        "Starting conversion"
    );

    let files = convert_all(&sources, &config.extract, &cache, &config.output_dir);

    Ok(BatchReport {
        started_at,
        completed_at: Utc::now(),
        catalogues_loaded: cache.len(),
        catalogue_warnings: cache
            .warnings()
            .iter()
            .cloned()
            .chain(cache.duplicates().iter().cloned())
            .chain(cache.rejected().iter().map(|(name, reason)| format!("{name}: {reason}")))
            .collect(),
        files,
    })
}

/// Convert every document of every source in order against a prepared cache.
///
/// Only one scan document is held in memory at a time.
pub fn convert_all(
    sources: &[ScanSource],
    options: &ExtractOptions,
    cache: &CatalogueCache,
    output_dir: &Path,
) -> Vec<FileReport> {
    let mut names = OutputNames::new();
    let mut reports = Vec::new();
    for source in sources {
        source.for_each_document(options, |read| {
            reports.push(match read {
                Ok(document) => FileReport {
                    outcome: convert_document(&document, cache, output_dir, &mut names),
                    source: document.name,
                },
                Err(report) => report,
            });
        });
    }
    reports
}

/// Convert one scan document and write its checklist.
pub fn convert_document(
    document: &ScanDocument,
    cache: &CatalogueCache,
    output_dir: &Path,
    names: &mut OutputNames,
) -> FileOutcome {
    let parser = ScanParser::new();
    let scan = match parser.parse(&document.name, &document.data) {
        Ok(scan) => scan,
        Err(e) if e.is_not_a_scan() => {
            tracing::warn!(file = %document.name, "Skipping, no TestResult found");
            return FileOutcome::Skipped {
                reason: e.to_string(),
            };
        }
        Err(e) => {
            tracing::error!(file = %document.name, kind = parser.document_kind(), error = %e, "Failed to parse");
            return FileOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    let merge = resolver::resolve(&scan, cache);
    let target = checklist::target_info(&scan, &merge);
    let benchmark = checklist::benchmark_info(&scan, &merge);
    let document_json = checklist::build_checklist(&target, &benchmark, &merge.records);

    let bytes = match checklist::render(&document_json) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(file = %document.name, error = %e, "Failed to serialize checklist");
            return FileOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    let file_name = names.reserve(&checklist::output_file_name(&scan.hostname, &benchmark.title));
    let output = match checklist::write_atomically(output_dir, &file_name, &bytes) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(file = %document.name, error = %e, "Failed to write checklist");
            return FileOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    let tally = merge.tally();
    tracing::info!(
        file = %document.name,
        output = %output.display(),
        host = %scan.hostname,
        resolved = merge.resolved,
        rules = merge.records.len(),
        open = tally.open,
        not_a_finding = tally.not_a_finding,
        "Checklist written"
    );

    FileOutcome::Converted(ConvertedFile {
        output,
        hostname: scan.hostname.clone(),
        benchmark_title: benchmark.title,
        resolved: merge.resolved,
        missing_reference: merge.missing_reference.clone(),
        unmatched: if merge.resolved { merge.unmatched() } else { 0 },
        rule_count: merge.records.len(),
        tally,
        digest: fingerprint::content_digest(&bytes),
    })
}

/// Find scan inputs: loose `*.xml` files and `*.zip` archives directly in
/// `dir`, in sorted order.
pub fn discover_scan_sources(dir: &Path) -> Result<Vec<ScanSource>, ConvertError> {
    let entries = fs::read_dir(dir).map_err(|source| ConvertError::InputDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            if is_archive_name(&name) {
                Some(ScanSource::Archive { name, path })
            } else if is_xml_name(&name) {
                Some(ScanSource::File { name, path })
            } else {
                None
            }
        })
        .collect())
}

fn visit_archive_members<F>(name: &str, path: &Path, options: &ExtractOptions, visit: &mut F)
where
    F: FnMut(Result<ScanDocument, FileReport>),
{
    let opened = fs::File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|file| ZipArchive::new(file).map_err(|e| e.to_string()));
    let mut archive = match opened {
        Ok(archive) => archive,
        Err(reason) => {
            let error = ConvertError::ArchiveRead {
                name: name.to_string(),
                reason,
            };
            tracing::warn!(file = name, error = %error, "Skipping unreadable scan archive");
            visit(Err(failed(name.to_string(), error)));
            return;
        }
    };

    for index in 0..archive.len() {
        let read = {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    visit(Err(failed(format!("{name}#{index}"), e)));
                    continue;
                }
            };
            if entry.is_dir() || !is_xml_name(entry_basename(entry.name())) {
                continue;
            }
            let member = format!("{name}/{}", entry_basename(entry.name()));
            match read_entry(&mut entry, options.max_entry_bytes) {
                Ok(data) => Ok(ScanDocument { name: member, data }),
                Err(reason) => Err(failed(member, reason)),
            }
        };
        visit(read);
    }
}

fn failed(source: String, reason: impl std::fmt::Display) -> FileReport {
    FileReport {
        source,
        outcome: FileOutcome::Failed {
            reason: reason.to_string(),
        },
    }
}

fn is_xml_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".xml")
}
