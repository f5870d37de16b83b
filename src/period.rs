use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;

use crate::derive;
use crate::error::KpiError;
use crate::types::KpiRow;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct PeriodId {
    year: i32,
    month: u32,
}

impl PeriodId {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| PeriodId { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        PeriodId {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Monday to Friday of the month, ascending.
    pub fn weekdays(&self) -> Vec<NaiveDate> {
        self.first_day()
            .iter_days()
            .take_while(|d| d.month() == self.month)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodId {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KpiError::InvalidPeriod(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if y.len() != 4 || m.len() != 2 || !digits(y) || !digits(m) {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        PeriodId::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for PeriodId {
    type Error = KpiError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The rows of one month keyed by `(date, site)`, kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: PeriodId,
    rows: Vec<KpiRow>,
}

impl Period {
    pub fn new(id: PeriodId) -> Self {
        Period { id, rows: Vec::new() }
    }

    /// Build from loaded rows; a repeated identity replaces the earlier row.
    pub fn from_rows(id: PeriodId, rows: impl IntoIterator<Item = KpiRow>) -> Self {
        let mut period = Period::new(id);
        for row in rows {
            period.upsert(row);
        }
        period
    }

    /// One empty row per weekday and site, weekday-major.
    pub fn seed(id: PeriodId, sites: &[String]) -> Self {
        let rows = id
            .weekdays()
            .into_iter()
            .flat_map(|date| sites.iter().map(move |site| KpiRow::empty(date, site.clone())));
        Period::from_rows(id, rows)
    }

    pub fn rows(&self) -> &[KpiRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<KpiRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert or replace by identity, recomputing the derived fields.
    pub fn upsert(&mut self, row: KpiRow) {
        let row = derive::derive(row);
        match self.rows.iter_mut().find(|r| r.key() == row.key()) {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
    }

    pub fn get(&self, date: NaiveDate, site: &str) -> Option<&KpiRow> {
        self.rows.iter().find(|r| r.key() == (date, site))
    }

    pub fn remove(&mut self, date: NaiveDate, site: &str) -> Option<KpiRow> {
        let idx = self.rows.iter().position(|r| r.key() == (date, site))?;
        Some(self.rows.remove(idx))
    }

    /// True if any row carries a KPI value; such a period may not be deleted.
    pub fn has_data(&self) -> bool {
        self.rows.iter().any(KpiRow::has_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Site {i}")).collect()
    }

    #[test]
    fn parses_and_displays_period_ids() {
        let id: PeriodId = "2025-12".parse().unwrap();
        assert_eq!((id.year(), id.month()), (2025, 12));
        assert_eq!(id.to_string(), "2025-12");
        assert!("2025-13".parse::<PeriodId>().is_err());
        assert!("2025-1".parse::<PeriodId>().is_err());
        assert!("12-2025".parse::<PeriodId>().is_err());
        assert!("".parse::<PeriodId>().is_err());
    }

    #[test]
    fn ids_order_chronologically() {
        let mut ids: Vec<PeriodId> = ["2026-01", "2025-12", "2025-02"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let names: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["2025-02", "2025-12", "2026-01"]);
    }

    #[test]
    fn december_2025_has_23_weekdays() {
        let id: PeriodId = "2025-12".parse().unwrap();
        let days = id.weekdays();
        assert_eq!(days.len(), 23);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(days[22], NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(id.last_day(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn seeding_creates_empty_rows_per_weekday_and_site() {
        let id: PeriodId = "2025-12".parse().unwrap();
        let period = Period::seed(id, &sites(9));
        assert_eq!(period.len(), 23 * 9);
        assert!(!period.has_data());
        assert!(period.rows().iter().all(|r| r.stop_average().is_none() && r.stop_cost().is_none()));
        assert_eq!(period.rows()[0].site, "Site 1");
        assert_eq!(period.rows()[9].date, NaiveDate::from_ymd_opt(2025, 12, 2).unwrap());
    }

    #[test]
    fn upsert_replaces_by_identity_and_derives() {
        let id: PeriodId = "2025-12".parse().unwrap();
        let mut period = Period::seed(id, &sites(2));
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        let mut row = KpiRow::empty(date, "Site 2");
        row.vehicles = Some(4);
        row.stops = Some(30);
        period.upsert(row);
        assert_eq!(period.len(), 23 * 2);
        assert_eq!(period.get(date, "Site 2").unwrap().stop_average(), Some(7.5));
        assert!(period.has_data());

        assert!(period.remove(date, "Site 2").is_some());
        assert!(period.remove(date, "Site 2").is_none());
        assert!(!period.has_data());
    }
}
