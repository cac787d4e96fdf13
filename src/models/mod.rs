//! Domain models for catalogues, scans, and checklists.

pub mod catalogue;
pub mod checklist;
pub mod scan;

use serde::Serialize;

/// Namespace URI of XCCDF 1.1 documents.
pub const XCCDF_1_1_NS: &str = "http://checklists.nist.gov/xccdf/1.1";

/// Namespace URI of XCCDF 1.2 documents.
pub const XCCDF_1_2_NS: &str = "http://checklists.nist.gov/xccdf/1.2";

/// XCCDF schema variant a document was written against.
///
/// Resolved once per document; every element lookup goes through it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum XccdfNamespace {
    V1_1,
    V1_2,
    /// No XCCDF namespace declared; elements are matched unqualified.
    Unqualified,
}

impl XccdfNamespace {
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            XCCDF_1_1_NS => Some(Self::V1_1),
            XCCDF_1_2_NS => Some(Self::V1_2),
            _ => None,
        }
    }

    pub fn uri(&self) -> Option<&'static str> {
        match self {
            Self::V1_1 => Some(XCCDF_1_1_NS),
            Self::V1_2 => Some(XCCDF_1_2_NS),
            Self::Unqualified => None,
        }
    }
}

impl std::fmt::Display for XccdfNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1_1 => write!(f, "XCCDF 1.1"),
            Self::V1_2 => write!(f, "XCCDF 1.2"),
            Self::Unqualified => write!(f, "unqualified"),
        }
    }
}
