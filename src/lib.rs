// KPI entry and reporting for a multi-site delivery network.
//
// Rows are kept per calendar month (`period::Period`) in a `store::DataStore`.
// Edits go through a `session::Session`, which derives, validates and saves,
// and keeps a bounded undo/redo `history::History`. Reports aggregate rows
// into daily, weekly and monthly rollups and compare them; `output` renders
// or exports the resulting `reports::ReportTable`s.
pub mod aggregate;
pub mod config;
pub mod delta;
pub mod derive;
pub mod error;
pub mod history;
pub mod loader;
pub mod output;
pub mod period;
pub mod reports;
pub mod session;
pub mod store;
pub mod types;
pub mod util;
pub mod validate;

pub use error::{KpiError, Result};
pub use period::{Period, PeriodId};
pub use types::{Kpi, KpiRow, RawRow};
