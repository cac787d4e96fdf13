//! Unified error taxonomy for the conversion pipeline.
//!
//! File- and archive-scoped variants are recovered at the smallest enclosing
//! scope and turned into a logged skip. Only environment-level variants are
//! allowed to end a batch.

use std::path::PathBuf;

/// Conversion error covering parsing, extraction, and output.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("No TestResult found in XCCDF - this may not be a scan export")]
    NoTestResult,

    #[error("Malformed document {name}: {reason}")]
    MalformedDocument { name: String, reason: String },

    #[error("Malformed catalogue: {0}")]
    MalformedCatalogue(String),

    #[error("Failed to read archive {name}: {reason}")]
    ArchiveRead { name: String, reason: String },

    #[error("Archive nesting too deep in {name} (depth {depth})")]
    DepthExceeded { name: String, depth: usize },

    #[error("Failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input directory unavailable {}: {source}", path.display())]
    InputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory unusable {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConvertError {
    /// Check if this error only affects one input file, archive, or output.
    pub fn is_file_scoped(&self) -> bool {
        !matches!(
            self,
            Self::InputDirectory { .. } | Self::OutputDirectory { .. } | Self::Config(_)
        )
    }

    /// Check if this error means the input is not a scan export at all.
    pub fn is_not_a_scan(&self) -> bool {
        matches!(self, Self::NoTestResult)
    }

    /// Attach a document name to a low-level XML error.
    pub fn malformed(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::MalformedDocument {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_test_result_is_file_scoped() {
        let err = ConvertError::NoTestResult;
        assert!(err.is_file_scoped());
        assert!(err.is_not_a_scan());
    }

    #[test]
    fn environment_errors_are_batch_fatal() {
        let err = ConvertError::InputDirectory {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!err.is_file_scoped());
        assert!(!ConvertError::Config("bad".to_string()).is_file_scoped());
        let err = ConvertError::OutputDirectory {
            path: PathBuf::from("/ro/output"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_file_scoped());
    }

    #[test]
    fn output_write_is_file_scoped() {
        let err = ConvertError::OutputWrite {
            path: PathBuf::from("out/host.cklb"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.is_file_scoped());
        assert!(err.to_string().starts_with("Failed to write out/host.cklb"));
    }

    #[test]
    fn malformed_display() {
        let err = ConvertError::malformed("scan.xml", "unexpected EOF");
        assert_eq!(err.to_string(), "Malformed document scan.xml: unexpected EOF");
    }

    #[test]
    fn depth_exceeded_display() {
        let err = ConvertError::DepthExceeded {
            name: "outer.zip/inner.zip".to_string(),
            depth: 11,
        };
        assert_eq!(
            err.to_string(),
            "Archive nesting too deep in outer.zip/inner.zip (depth 11)"
        );
    }
}
