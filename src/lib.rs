pub mod config;
pub mod errors;
pub mod models;
pub mod parsers;
pub mod services;

pub use config::ConverterConfig;
pub use errors::ConvertError;
pub use services::catalogue_cache::CatalogueCache;
pub use services::ingestion::{run_batch, BatchReport};
