pub mod classify;
pub mod fetch;
pub mod filing;
pub mod model;
pub mod parsing;
pub mod report;
pub mod taxonomy;

pub use filing::{Filing, Origin, SourceFile};
pub use model::FilingModel;
pub use report::{Component, FileCategory, ReportType};
