// Workbook import (xlsx, xlsm, xls, xlsb, ods) and XLSX export

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};
use sheetmerge_recon::{CanonicalTable, RawTable};

use crate::error::IoError;

/// Sheet name used for exported tables.
pub const EXPORT_SHEET_NAME: &str = "unified";

/// Load every sheet of a workbook. A sheet that cannot be read or holds no
/// usable table is logged and skipped.
pub fn import(path: &Path) -> Result<Vec<RawTable>, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::Parse {
        path: path.to_path_buf(),
        message: format!("failed to open workbook: {}", e),
    })?;

    let source = crate::source_name(path);
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        log::warn!("{}: workbook contains no sheets", source);
    }

    let mut tables = Vec::new();
    for sheet_name in &sheet_names {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("{} [{}]: cannot read sheet, skipped: {}", source, sheet_name, e);
                continue;
            }
        };

        let records: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        if let Some(table) = crate::build_table(&source, Some(sheet_name), records) {
            tables.push(table);
        }
    }
    Ok(tables)
}

/// Render one workbook cell as the text a user would see.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Write a table to a single-sheet XLSX file with a bold header row.
pub fn export(table: &CanonicalTable, path: &Path) -> Result<(), IoError> {
    let write_err = |message: String| IoError::Write {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(EXPORT_SHEET_NAME)
        .map_err(|e| write_err(e.to_string()))?;

    let header_format = Format::new().set_bold();
    for (col, name) in table.columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, &header_format)
            .map_err(|e| write_err(e.to_string()))?;
    }

    for (row_idx, row) in table.rows().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(row_num, col as u16, *value)
                .map_err(|e| write_err(e.to_string()))?;
        }
    }

    worksheet.autofit();

    workbook
        .save(path)
        .map_err(|e| write_err(format!("failed to save XLSX file: {}", e)))?;
    Ok(())
}
