use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

use crate::error::Result;
use crate::reports::ReportTable;

const HEADER_FILL: u32 = 0x1F4E78;
const MAX_COLUMN_WIDTH: usize = 30;

/// Semicolon-delimited text, header line first.
pub fn write_csv(path: &Path, table: &ReportTable) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    wtr.write_record(&table.columns)?;
    for r in &table.rows {
        wtr.write_record(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Spreadsheet with a styled header row and widths fitted to the content.
pub fn write_xlsx(path: &Path, table: &ReportTable) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_font_size(12)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let cell = Format::new().set_border(FormatBorder::Thin);

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(&table.title))?;
    for (c, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, name, &header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string_with_format(r as u32 + 1, c as u16, value, &cell)?;
        }
    }
    for (c, width) in column_widths(table).into_iter().enumerate() {
        sheet.set_column_width(c as u16, width as f64)?;
    }
    workbook.save(path)?;
    Ok(())
}

/// Longest cell per column plus padding, capped.
pub fn column_widths(table: &ReportTable) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let longest = table
                .rows
                .iter()
                .filter_map(|r| r.get(c))
                .map(|v| v.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

// Worksheet names are limited to 31 characters and may not contain []:*?/\
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '-' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

/// Export by file extension: `.csv`, `.json` or `.xlsx`.
pub fn export(path: &Path, table: &ReportTable) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => write_json(path, table)?,
        Some("xlsx") => write_xlsx(path, table)?,
        _ => write_csv(path, table)?,
    }
    info!(path = %path.display(), rows = table.rows.len(), "exported report");
    Ok(())
}

/// Markdown rendering of the first `max_rows` rows.
pub fn render_table(table: &ReportTable, max_rows: usize) -> String {
    if table.rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(table.columns.iter().cloned());
    for r in table.rows.iter().take(max_rows) {
        builder.push_record(r.iter().cloned());
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_table(table: &ReportTable, max_rows: usize) {
    println!("{}\n", table.title);
    println!("{}\n", render_table(table, max_rows));
    if table.rows.len() > max_rows {
        println!("({} of {} rows shown)\n", max_rows, table.rows.len());
    }
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
