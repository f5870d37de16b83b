use thiserror::Error;

use crate::period::PeriodId;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Spreadsheet export error: {source}")]
    Xlsx {
        #[from]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: toml::de::Error,
    },

    #[error("Invalid period identifier '{0}' (expected YYYY-MM)")]
    InvalidPeriod(String),

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("Period {0} already exists")]
    PeriodExists(PeriodId),

    #[error("Period {0} does not exist")]
    UnknownPeriod(PeriodId),

    #[error("Period {0} contains KPI data and cannot be deleted")]
    PeriodNotEmpty(PeriodId),
}

pub type Result<T> = std::result::Result<T, KpiError>;
