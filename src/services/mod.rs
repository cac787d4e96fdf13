//! Conversion services: extraction, caching, resolution, and output.

pub mod archive;
pub mod catalogue_cache;
pub mod checklist;
pub mod diagnostics;
pub mod fingerprint;
pub mod ingestion;
pub mod resolver;
pub mod status;
