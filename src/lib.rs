pub mod batch;
pub mod core;
pub mod storage;
pub mod tdnet;
pub mod utils;

// Re-exports
pub use crate::core::config::{LabelLanguage, ParserConfig};
pub use crate::core::error::{Result, XbrlError};
pub use storage::{RecordSet, RecordSink};
pub use tdnet::{Filing, FilingModel, ReportType};
