// Row validation gating persistence.
//
// Every row is checked and every problem collected, so one pass shows the
// user the full list. Nothing here mutates the input.
use std::collections::HashMap;

use thiserror::Error;

use crate::period::PeriodId;
use crate::types::{Kpi, RawRow};
use crate::util::{format_date, parse_date, parse_strict};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("Row {row}: invalid date '{raw}' (format: DD.MM.YYYY)")]
    InvalidDate { row: usize, raw: String },

    #[error("Row {row}: {field} is not a valid number ('{raw}')")]
    InvalidNumber {
        row: usize,
        field: &'static str,
        raw: String,
    },

    #[error("Row {row}: {field} must not be negative ({value})")]
    NegativeValue {
        row: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Row {row}: date is missing")]
    MissingDate { row: usize },

    #[error("Row {row}: site is missing")]
    MissingSite { row: usize },

    #[error("Row {row}: date {date} is not in period {period}")]
    OutsidePeriod {
        row: usize,
        date: String,
        period: PeriodId,
    },

    #[error("Row {row}: same date and site as row {first}; the later row wins")]
    DuplicateKey { row: usize, first: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Saving is allowed only without errors; warnings never block.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Check a batch of raw rows. Row numbers in the issues are 1-based.
pub fn validate(rows: &[RawRow]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen: HashMap<(String, String), usize> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx + 1;

        if let Some(raw) = row.date.as_deref().filter(|d| !d.trim().is_empty()) {
            if parse_date(raw).is_none() {
                report.errors.push(ValidationIssue::InvalidDate {
                    row: row_num,
                    raw: raw.to_string(),
                });
            }
        }

        let numeric = [
            (Kpi::Vehicles, &row.vehicles),
            (Kpi::Stops, &row.stops),
            (Kpi::UnplannedStops, &row.unplanned_stops),
            (Kpi::FleetCost, &row.fleet_cost),
        ];
        for (kpi, cell) in numeric {
            let Some(raw) = cell.as_deref().filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match parse_strict(raw) {
                Ok(value) if value < 0.0 => report.errors.push(ValidationIssue::NegativeValue {
                    row: row_num,
                    field: kpi.label(),
                    value,
                }),
                Ok(value) if kpi.is_count() && (value.fract() != 0.0 || value > f64::from(u32::MAX)) => {
                    report.errors.push(ValidationIssue::InvalidNumber {
                        row: row_num,
                        field: kpi.label(),
                        raw: raw.to_string(),
                    })
                }
                Ok(_) => {}
                Err(_) => report.errors.push(ValidationIssue::InvalidNumber {
                    row: row_num,
                    field: kpi.label(),
                    raw: raw.to_string(),
                }),
            }
        }

        if blank(&row.date) {
            report.warnings.push(ValidationIssue::MissingDate { row: row_num });
        }
        if blank(&row.site) {
            report.warnings.push(ValidationIssue::MissingSite { row: row_num });
        }

        if !blank(&row.date) && !blank(&row.site) {
            let key = (
                row.date.as_deref().unwrap_or("").trim().to_string(),
                row.site.as_deref().unwrap_or("").trim().to_string(),
            );
            if let Some(first) = seen.get(&key) {
                report.warnings.push(ValidationIssue::DuplicateKey {
                    row: row_num,
                    first: *first,
                });
            } else {
                seen.insert(key, row_num);
            }
        }
    }

    report
}

/// [`validate`], plus an error for every row dated outside `period`.
pub fn validate_for(period: PeriodId, rows: &[RawRow]) -> ValidationReport {
    let mut report = validate(rows);
    for (idx, row) in rows.iter().enumerate() {
        let Some(date) = row.date.as_deref().and_then(parse_date) else {
            continue;
        };
        if !period.contains(date) {
            report.errors.push(ValidationIssue::OutsidePeriod {
                row: idx + 1,
                date: format_date(date),
                period,
            });
        }
    }
    report
}
