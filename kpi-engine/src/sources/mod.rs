//! External data sources: outbound calls and role-based value fusion

pub mod fetcher;
pub mod resolver;

pub use fetcher::{parse_numeric, HttpSourceFetcher, SourceFetcher};
pub use resolver::{resolve_value, SourcePlan, SourceReading};
