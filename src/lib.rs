pub mod metrics;
pub mod parsers;
pub mod report;
pub mod template;
pub mod time;

// Re-export for easy access
pub use metrics::{GroupBy, MetricCollector, Summary};
pub use parsers::record::RequestRecord;
pub use parsers::{LineParser, ParseError};
pub use template::Template;
