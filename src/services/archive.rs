//! Recursive catalogue extraction from zip archives.
//!
//! STIG packages arrive as zips that often hold further zips (quarterly
//! compilations). Every entry whose name ends in the catalogue suffix is
//! collected by basename; nested archives are descended into up to the
//! configured depth. A bad archive or entry is recorded as a warning and
//! its siblings are still processed.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use zip::ZipArchive;

use crate::config::ExtractOptions;
use crate::errors::ConvertError;

/// Catalogue documents found so far, keyed by basename.
#[derive(Debug, Default)]
pub struct Extraction {
    pub documents: BTreeMap<String, Vec<u8>>,
    /// Per-archive or per-entry problems that were skipped.
    pub warnings: Vec<ConvertError>,
    /// One line per basename that replaced an earlier document.
    pub duplicates: Vec<String>,
}

impl Extraction {
    /// Insert with last-write-wins, recording when an earlier entry is replaced.
    fn insert(&mut self, name: String, data: Vec<u8>, origin: &str) {
        if self.documents.insert(name.clone(), data).is_some() {
            tracing::warn!(file = %name, origin, "Duplicate catalogue filename, keeping the last one extracted");
            self.duplicates
                .push(format!("duplicate catalogue filename {name}, kept the copy from {origin}"));
        } else {
            tracing::info!(file = %name, origin, "Loaded benchmark");
        }
    }

    fn skip(&mut self, error: ConvertError) {
        tracing::warn!(error = %error, "Skipping");
        self.warnings.push(error);
    }
}

/// Collect catalogue documents from a benchmark directory.
///
/// Order: zip archives directly in `dir` (sorted by name), then loose
/// catalogue files in `dir` (both last-write-wins), then catalogue files in
/// subdirectories, which never replace an existing key.
pub fn collect_catalogue_documents(
    dir: &Path,
    options: &ExtractOptions,
) -> Result<Extraction, ConvertError> {
    let mut extraction = Extraction::default();
    let mut archives = Vec::new();
    let mut loose = Vec::new();
    let mut subdirs = Vec::new();

    let entries = fs::read_dir(dir).map_err(|source| ConvertError::InputDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_archive_name(&name) {
            archives.push((name, path));
        } else if name.ends_with(&options.catalogue_suffix) {
            loose.push((name, path));
        }
    }
    archives.sort();
    loose.sort();
    subdirs.sort();

    for (name, path) in &archives {
        match fs::read(path) {
            Ok(data) => extract_archive(name, &data, options, &mut extraction),
            Err(e) => extraction.skip(ConvertError::ArchiveRead {
                name: name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    for (name, path) in loose {
        match fs::read(&path) {
            Ok(data) => extraction.insert(name, data, "directory"),
            Err(e) => extraction.skip(ConvertError::malformed(&name, e)),
        }
    }

    for subdir in subdirs {
        collect_nested_files(&subdir, options, &mut extraction);
    }

    Ok(extraction)
}

/// Extract every catalogue entry from one top-level archive blob.
pub fn extract_archive(name: &str, data: &[u8], options: &ExtractOptions, extraction: &mut Extraction) {
    if let Err(e) = walk_archive(name, data, 0, options, extraction) {
        extraction.skip(e);
    }
}

fn walk_archive(
    label: &str,
    data: &[u8],
    depth: usize,
    options: &ExtractOptions,
    extraction: &mut Extraction,
) -> Result<(), ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| ConvertError::ArchiveRead {
        name: label.to_string(),
        reason: e.to_string(),
    })?;

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                extraction.skip(ConvertError::ArchiveRead {
                    name: format!("{label}#{index}"),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let entry_path = entry.name().to_string();
        let basename = entry_basename(&entry_path).to_string();
        let is_catalogue = basename.ends_with(&options.catalogue_suffix);
        let is_nested = is_archive_name(&basename);
        if !is_catalogue && !is_nested {
            continue;
        }

        let qualified = format!("{label}/{entry_path}");
        if is_nested && depth + 1 > options.max_depth {
            extraction.skip(ConvertError::DepthExceeded {
                name: qualified,
                depth: depth + 1,
            });
            continue;
        }

        let bytes = match read_entry(&mut entry, options.max_entry_bytes) {
            Ok(bytes) => bytes,
            Err(reason) => {
                extraction.skip(ConvertError::ArchiveRead { name: qualified, reason });
                continue;
            }
        };

        if is_catalogue {
            extraction.insert(basename, bytes, label);
        } else if let Err(e) = walk_archive(&qualified, &bytes, depth + 1, options, extraction) {
            extraction.skip(e);
        }
    }
    Ok(())
}

/// Read an entry fully, refusing anything over `limit` bytes once inflated.
pub(crate) fn read_entry<R: Read>(entry: &mut R, limit: u64) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| e.to_string())?;
    if bytes.len() as u64 > limit {
        return Err(format!("entry exceeds {limit} bytes"));
    }
    Ok(bytes)
}

fn collect_nested_files(dir: &Path, options: &ExtractOptions, extraction: &mut Extraction) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            extraction.skip(ConvertError::InputDirectory {
                path: dir.to_path_buf(),
                source: e,
            });
            return;
        }
    };
    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_nested_files(&path, options, extraction);
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.ends_with(&options.catalogue_suffix) || extraction.documents.contains_key(&name) {
            continue;
        }
        match fs::read(&path) {
            Ok(data) => extraction.insert(name, data, "subdirectory"),
            Err(e) => extraction.skip(ConvertError::malformed(&name, e)),
        }
    }
}

/// Entry names may use either separator depending on the producing platform.
pub(crate) fn entry_basename(entry_path: &str) -> &str {
    entry_path.rsplit(['/', '\\']).next().unwrap_or(entry_path)
}

pub(crate) fn is_archive_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".zip")
}
