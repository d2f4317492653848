use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// TDnet report-type codes, as carried in instance file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum ReportType {
    /// Earnings summary, Japanese GAAP.
    EarningsJapanGaap,
    EarningsUsGaap,
    EarningsIfrs,
    /// Earnings summary, specified business company.
    EarningsSpecified,
    EarningsReit,
    ReitDividendRevision,
    ReitForecastRevision,
    DividendRevision,
    ForecastRevision,
    EarningsEtf,
}

impl ReportType {
    pub fn code(&self) -> &'static str {
        match self {
            ReportType::EarningsJapanGaap => "edjp",
            ReportType::EarningsUsGaap => "edus",
            ReportType::EarningsIfrs => "edif",
            ReportType::EarningsSpecified => "edit",
            ReportType::EarningsReit => "rejp",
            ReportType::ReitDividendRevision => "rrdf",
            ReportType::ReitForecastRevision => "rrfc",
            ReportType::DividendRevision => "rvdf",
            ReportType::ForecastRevision => "rvfc",
            ReportType::EarningsEtf => "efjp",
        }
    }

    pub fn list_types() -> &'static str {
        &REPORT_TYPES
    }

    /// Which documents must be present and which components run.
    pub fn descriptor(&self) -> &'static ReportDescriptor {
        match self {
            ReportType::EarningsJapanGaap
            | ReportType::EarningsUsGaap
            | ReportType::EarningsIfrs
            | ReportType::EarningsSpecified
            | ReportType::EarningsReit => &FULL_EARNINGS,
            ReportType::DividendRevision | ReportType::ReitDividendRevision => &DIVIDEND_REVISION,
            ReportType::ForecastRevision | ReportType::ReitForecastRevision => &FORECAST_REVISION,
            ReportType::EarningsEtf => &ETF_EARNINGS,
        }
    }
}

pub static REPORT_TYPES: Lazy<String> = Lazy::new(|| {
    ReportType::iter()
        .map(|t| t.code())
        .collect::<Vec<_>>()
        .join(", ")
});

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<ReportType, String> {
        let token = s.to_ascii_lowercase();
        ReportType::iter()
            .find(|t| t.code() == token)
            .ok_or_else(|| format!("unknown report type '{}', expected one of {}", s, Self::list_types()))
    }
}

/// Document role inside a bundle, derived from the file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter)]
pub enum FileCategory {
    Instance,
    Label,
    LabelEnglish,
    Calculation,
    Definition,
    Presentation,
    Schema,
    Narrative,
}

impl FileCategory {
    pub fn suffix(&self) -> &'static str {
        match self {
            FileCategory::Instance => "-ixbrl.htm",
            FileCategory::Label => "-lab.xml",
            FileCategory::LabelEnglish => "-lab-en.xml",
            FileCategory::Calculation => "-cal.xml",
            FileCategory::Definition => "-def.xml",
            FileCategory::Presentation => "-pre.xml",
            FileCategory::Schema => ".xsd",
            FileCategory::Narrative => "qualitative.htm",
        }
    }

    /// Suffixes are disjoint, so at most one category matches.
    pub fn of(file_name: &str) -> Option<FileCategory> {
        FileCategory::iter().find(|c| file_name.ends_with(c.suffix()))
    }
}

/// Whether a document belongs to the summary sheet or the attached report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Summary,
    Report,
}

impl DocumentKind {
    /// `tse-acedjpsm-...` is a summary document, everything else is report.
    pub fn of(file_name: &str) -> DocumentKind {
        match file_name.split('-').nth(1) {
            Some(segment) if segment.ends_with("sm") => DocumentKind::Summary,
            _ => DocumentKind::Report,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Summary => write!(f, "summary"),
            DocumentKind::Report => write!(f, "report"),
        }
    }
}

/// Units of work a filing model may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Labels,
    Calculations,
    Definitions,
    Presentations,
    Facts,
    Header,
}

#[derive(Debug)]
pub struct ReportDescriptor {
    pub required: &'static [FileCategory],
    pub components: &'static [Component],
}

impl ReportDescriptor {
    pub fn enables(&self, component: Component) -> bool {
        self.components.contains(&component)
    }
}

static FULL_EARNINGS: ReportDescriptor = ReportDescriptor {
    required: &[
        FileCategory::Instance,
        FileCategory::Schema,
        FileCategory::Label,
        FileCategory::Calculation,
        FileCategory::Definition,
        FileCategory::Presentation,
    ],
    components: &[
        Component::Labels,
        Component::Calculations,
        Component::Definitions,
        Component::Presentations,
        Component::Facts,
        Component::Header,
    ],
};

static DIVIDEND_REVISION: ReportDescriptor = ReportDescriptor {
    required: &[FileCategory::Instance, FileCategory::Schema, FileCategory::Definition],
    components: &[Component::Definitions, Component::Facts, Component::Header],
};

static FORECAST_REVISION: ReportDescriptor = ReportDescriptor {
    required: &[
        FileCategory::Instance,
        FileCategory::Schema,
        FileCategory::Definition,
        FileCategory::Presentation,
    ],
    components: &[
        Component::Labels,
        Component::Definitions,
        Component::Presentations,
        Component::Facts,
        Component::Header,
    ],
};

static ETF_EARNINGS: ReportDescriptor = ReportDescriptor {
    required: &[
        FileCategory::Instance,
        FileCategory::Schema,
        FileCategory::Label,
        FileCategory::Presentation,
    ],
    components: &[
        Component::Labels,
        Component::Presentations,
        Component::Facts,
        Component::Header,
    ],
};
