//! XCCDF document parsers.
//!
//! Both parsers sit on the same namespace-resolving element tree (`xml`), so
//! XCCDF 1.1 and 1.2 inputs go through identical code paths.

pub mod catalogue;
pub mod scan;
pub mod xml;

use crate::errors::ConvertError;

/// Trait for parsers turning raw document bytes into a domain value.
pub trait DocumentParser: Send + Sync {
    type Output;

    /// Parse one document; `name` is used for diagnostics and fallbacks.
    fn parse(&self, name: &str, data: &[u8]) -> Result<Self::Output, ConvertError>;

    /// Short label of the document kind this parser handles.
    fn document_kind(&self) -> &str;
}
