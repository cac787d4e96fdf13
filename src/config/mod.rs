use std::env;
use std::path::PathBuf;

use crate::errors::ConvertError;

/// Default recursion limit for archives nested inside archives.
pub const DEFAULT_MAX_ARCHIVE_DEPTH: usize = 10;

/// Default cap on a single decompressed archive entry (512 MiB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

/// Default filename suffix identifying catalogue documents.
pub const DEFAULT_CATALOGUE_SUFFIX: &str = "xccdf.xml";

/// Converter configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub scan_results_dir: PathBuf,
    pub benchmark_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extract: ExtractOptions,
}

/// Limits and matching rules for catalogue extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub max_depth: usize,
    pub max_entry_bytes: u64,
    pub catalogue_suffix: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            catalogue_suffix: DEFAULT_CATALOGUE_SUFFIX.to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn from_env() -> Result<Self, ConvertError> {
        let max_depth = env::var("MAX_ARCHIVE_DEPTH")
            .unwrap_or_else(|_| DEFAULT_MAX_ARCHIVE_DEPTH.to_string())
            .parse()
            .unwrap_or(DEFAULT_MAX_ARCHIVE_DEPTH);
        if max_depth == 0 {
            return Err(ConvertError::Config(
                "MAX_ARCHIVE_DEPTH must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            scan_results_dir: env::var("SCAN_RESULTS_DIR")
                .unwrap_or_else(|_| "scan_results".to_string())
                .into(),
            benchmark_dir: env::var("STIG_BENCHMARKS_DIR")
                .unwrap_or_else(|_| "stig_benchmarks".to_string())
                .into(),
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "output".to_string())
                .into(),
            extract: ExtractOptions {
                max_depth,
                max_entry_bytes: env::var("MAX_ENTRY_BYTES")
                    .unwrap_or_else(|_| DEFAULT_MAX_ENTRY_BYTES.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_MAX_ENTRY_BYTES),
                catalogue_suffix: env::var("CATALOGUE_SUFFIX")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_CATALOGUE_SUFFIX.to_string()),
            },
        })
    }

    /// Apply positional `[SCAN_DIR [BENCHMARK_DIR [OUTPUT_DIR]]]` overrides.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        if let Some(dir) = args.next() {
            self.scan_results_dir = dir.into();
        }
        if let Some(dir) = args.next() {
            self.benchmark_dir = dir.into();
        }
        if let Some(dir) = args.next() {
            self.output_dir = dir.into();
        }
        self
    }
}
