pub mod config;
pub mod error;

pub use config::{LabelLanguage, ParserConfig};
pub use error::{ClassificationError, Result, XbrlError};
