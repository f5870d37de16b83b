// An editing session over one period.
//
// Every change runs the same pass: normalize, derive, validate, and only
// then save through the store. Saved states are recorded in the session's
// own `History` so they can be undone and redone.
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::Result;
use crate::history::History;
use crate::loader;
use crate::period::{Period, PeriodId};
use crate::store::DataStore;
use crate::types::{KpiRow, RawRow};
use crate::validate::{validate_for, ValidationIssue, ValidationReport};

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Saved; warnings are informational.
    Saved { rows: usize, warnings: Vec<ValidationIssue> },
    /// Nothing was saved because validation found errors.
    Rejected(ValidationReport),
}

impl CommitOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, CommitOutcome::Saved { .. })
    }
}

pub struct Session<S: DataStore> {
    store: S,
    period: Period,
    history: History<Vec<KpiRow>>,
}

impl<S: DataStore> Session<S> {
    pub fn open(store: S, id: PeriodId, history_capacity: usize) -> Result<Self> {
        let period = store.load_period(id)?;
        debug!(period = %id, rows = period.len(), "opened session");
        Ok(Session {
            store,
            period,
            history: History::new(history_capacity),
        })
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn history(&self) -> &History<Vec<KpiRow>> {
        &self.history
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Switch to another period. Undo history belongs to one period and is
    /// dropped.
    pub fn switch(&mut self, id: PeriodId) -> Result<()> {
        self.period = self.store.load_period(id)?;
        self.history.clear();
        Ok(())
    }

    /// Reload the current period from the store, keeping history.
    pub fn reload(&mut self) -> Result<()> {
        self.period = self.store.load_period(self.period.id)?;
        Ok(())
    }

    /// Replace the whole period with `raw` rows, gated by validation. Rows
    /// dated outside the period are errors.
    pub fn commit(&mut self, raw: &[RawRow]) -> Result<CommitOutcome> {
        let report = validate_for(self.period.id, raw);
        if !report.is_ok() {
            debug!(errors = report.errors.len(), "commit rejected");
            return Ok(CommitOutcome::Rejected(report));
        }
        let (rows, _) = loader::normalize(raw);
        let next = Period::from_rows(self.period.id, rows);

        if self.history.is_empty() {
            self.history.record(self.period.rows().to_vec());
        }
        self.store.save(next.id, next.rows())?;
        self.history.record(next.rows().to_vec());
        info!(period = %next.id, rows = next.len(), "saved period");

        let saved = next.len();
        self.period = next;
        Ok(CommitOutcome::Saved {
            rows: saved,
            warnings: report.warnings,
        })
    }

    /// Insert or replace one row and commit.
    pub fn upsert_row(&mut self, row: KpiRow) -> Result<CommitOutcome> {
        let mut next = self.period.clone();
        next.upsert(row);
        self.commit_period(&next)
    }

    /// Remove one row and commit. `Ok(None)` when no such row exists.
    pub fn remove_row(&mut self, date: NaiveDate, site: &str) -> Result<Option<CommitOutcome>> {
        let mut next = self.period.clone();
        if next.remove(date, site).is_none() {
            return Ok(None);
        }
        self.commit_period(&next).map(Some)
    }

    fn commit_period(&mut self, next: &Period) -> Result<CommitOutcome> {
        let raw: Vec<RawRow> = next.rows().iter().map(KpiRow::to_raw).collect();
        self.commit(&raw)
    }

    /// Step back one saved state and persist it. `Ok(false)` at the start.
    /// A failed save leaves the history where it was.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(rows) = self.history.undo() else {
            return Ok(false);
        };
        if let Err(e) = self.restore(rows) {
            self.history.redo();
            return Err(e);
        }
        Ok(true)
    }

    /// Step forward again after an undo. `Ok(false)` at the newest state.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(rows) = self.history.redo() else {
            return Ok(false);
        };
        if let Err(e) = self.restore(rows) {
            self.history.undo();
            return Err(e);
        }
        Ok(true)
    }

    fn restore(&mut self, rows: Vec<KpiRow>) -> Result<()> {
        let id = self.period.id;
        self.store.save(id, &rows)?;
        self.period = Period::from_rows(id, rows);
        info!(period = %id, position = self.history.position(), "restored snapshot");
        Ok(())
    }
}
