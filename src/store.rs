// Durable storage of periods.
//
// `DataStore` is the seam to persistence. `save` is a full replace of the
// period; creation seeds empty rows and deletion is refused while the period
// holds any KPI value.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{KpiError, Result};
use crate::loader;
use crate::period::{Period, PeriodId};
use crate::types::KpiRow;

pub trait DataStore {
    /// Known periods, ascending.
    fn list_periods(&self) -> Result<Vec<PeriodId>>;

    fn exists(&self, id: PeriodId) -> Result<bool>;

    fn load(&self, id: PeriodId) -> Result<Vec<KpiRow>>;

    /// Replace every row of the period.
    fn save(&mut self, id: PeriodId, rows: &[KpiRow]) -> Result<()>;

    /// Drop the period unconditionally; callers go through `delete_period`.
    fn remove(&mut self, id: PeriodId) -> Result<()>;

    /// Seed one empty row per weekday and site. Fails if the period exists.
    fn create_period(&mut self, id: PeriodId, sites: &[String]) -> Result<()> {
        if self.exists(id)? {
            return Err(KpiError::PeriodExists(id));
        }
        let period = Period::seed(id, sites);
        info!(
            period = %id,
            weekdays = id.weekdays().len(),
            sites = sites.len(),
            "created period"
        );
        self.save(id, period.rows())
    }

    /// Delete the period if no row carries a KPI value. Returns `false` (and
    /// leaves the period untouched) otherwise.
    fn delete_period(&mut self, id: PeriodId) -> Result<bool> {
        if !self.exists(id)? {
            return Err(KpiError::UnknownPeriod(id));
        }
        let period = Period::from_rows(id, self.load(id)?);
        if period.has_data() {
            warn!(period = %id, "refusing to delete period with data");
            return Ok(false);
        }
        self.remove(id)?;
        info!(period = %id, "deleted period");
        Ok(true)
    }

    fn load_period(&self, id: PeriodId) -> Result<Period> {
        Ok(Period::from_rows(id, self.load(id)?))
    }
}

/// One `<YYYY-MM>.csv` file per period in a directory.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(CsvStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: PeriodId) -> PathBuf {
        self.dir.join(format!("{}.csv", id))
    }
}

impl DataStore for CsvStore {
    fn list_periods(&self) -> Result<Vec<PeriodId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<PeriodId>() {
                Ok(id) => ids.push(id),
                Err(_) => warn!(path = %path.display(), "ignoring file that is not a period"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn exists(&self, id: PeriodId) -> Result<bool> {
        Ok(self.path_for(id).is_file())
    }

    fn load(&self, id: PeriodId) -> Result<Vec<KpiRow>> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(KpiError::UnknownPeriod(id));
        }
        let (rows, _report) = loader::load_rows(&path)?;
        Ok(rows)
    }

    fn save(&mut self, id: PeriodId, rows: &[KpiRow]) -> Result<()> {
        let period = Period::from_rows(id, rows.iter().cloned());
        loader::save_rows(&self.path_for(id), period.rows())
    }

    fn remove(&mut self, id: PeriodId) -> Result<()> {
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }
}

/// Keeps periods in memory; handy for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    periods: BTreeMap<PeriodId, Vec<KpiRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl DataStore for MemoryStore {
    fn list_periods(&self) -> Result<Vec<PeriodId>> {
        Ok(self.periods.keys().copied().collect())
    }

    fn exists(&self, id: PeriodId) -> Result<bool> {
        Ok(self.periods.contains_key(&id))
    }

    fn load(&self, id: PeriodId) -> Result<Vec<KpiRow>> {
        self.periods
            .get(&id)
            .cloned()
            .ok_or(KpiError::UnknownPeriod(id))
    }

    fn save(&mut self, id: PeriodId, rows: &[KpiRow]) -> Result<()> {
        let period = Period::from_rows(id, rows.iter().cloned());
        self.periods.insert(id, period.into_rows());
        Ok(())
    }

    fn remove(&mut self, id: PeriodId) -> Result<()> {
        self.periods.remove(&id);
        Ok(())
    }
}
