// Reading and writing period files (`;`-delimited, German headers).
//
// Reads are lenient: unreadable records and rows without a date are counted
// and skipped, malformed numbers become missing. Nothing on this path fails
// for bad cell content; only I/O and CSV framing errors propagate.
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};

use crate::error::{KpiError, Result};
use crate::types::{KpiRow, RawRow, HEADERS};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
    pub parse_errors: usize,
}

/// Deserialize raw rows; records the CSV layer cannot map are counted.
pub fn read_raw<R: Read>(reader: R) -> Result<(Vec<RawRow>, usize)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let mut rows = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.deserialize::<RawRow>() {
        match result {
            Ok(r) => rows.push(r),
            Err(e) => {
                parse_errors += 1;
                warn!(error = %e, "skipping unreadable record");
            }
        }
    }
    Ok((rows, parse_errors))
}

pub fn read_raw_file(path: &Path) -> Result<(Vec<RawRow>, usize)> {
    let file = fs::File::open(path)?;
    read_raw(file)
}

/// Convert raw rows into typed, derived rows.
pub fn normalize(raw: &[RawRow]) -> (Vec<KpiRow>, LoadReport) {
    let rows: Vec<KpiRow> = raw.iter().filter_map(KpiRow::from_raw).collect();
    let report = LoadReport {
        total_rows: raw.len(),
        loaded_rows: rows.len(),
        skipped_rows: raw.len() - rows.len(),
        parse_errors: 0,
    };
    (rows, report)
}

pub fn load_rows(path: &Path) -> Result<(Vec<KpiRow>, LoadReport)> {
    let (raw, parse_errors) = read_raw_file(path)?;
    let (rows, mut report) = normalize(&raw);
    report.parse_errors = parse_errors;
    report.total_rows += parse_errors;
    if report.skipped_rows > 0 {
        warn!(
            path = %path.display(),
            skipped = report.skipped_rows,
            "rows without a valid date were skipped"
        );
    }
    debug!(path = %path.display(), loaded = report.loaded_rows, "loaded period file");
    Ok((rows, report))
}

/// Write rows with the header line, even when there are no rows.
pub fn write_rows<W: std::io::Write>(writer: W, rows: &[KpiRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADERS)?;
    for r in rows {
        wtr.serialize(r.to_raw())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Replace the file at `path` via a temporary sibling and a rename.
pub fn save_rows(path: &Path, rows: &[KpiRow]) -> Result<()> {
    replace_file(path, |file| write_rows(file, rows))?;
    debug!(path = %path.display(), rows = rows.len(), "saved period file");
    Ok(())
}

// The temporary file never outlives a failed write or rename.
fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(fs::File) -> Result<()>,
{
    let tmp = path.with_extension("csv.tmp");
    let result = fs::File::create(&tmp)
        .map_err(KpiError::from)
        .and_then(write)
        .and_then(|_| fs::rename(&tmp, path).map_err(KpiError::from));
    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %e, "could not remove temporary file");
        }
    }
    result
}
