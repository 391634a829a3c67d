// File I/O: load spreadsheets into RawTables, write the unified table back out

pub mod csv;
pub mod error;
pub mod xlsx;

use std::path::Path;

use sheetmerge_recon::{CanonicalTable, RawTable};

pub use error::IoError;

/// How a file is read, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Workbook,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv" | "tsv" | "txt") => Ok(SourceKind::Delimited),
            Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => Ok(SourceKind::Workbook),
            _ => Err(IoError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load every usable table in one file.
pub fn load_file(path: &Path) -> Result<Vec<RawTable>, IoError> {
    match SourceKind::detect(path)? {
        SourceKind::Delimited => Ok(csv::import(path)?.into_iter().collect()),
        SourceKind::Workbook => xlsx::import(path),
    }
}

/// Load many files. A file that fails is logged and skipped so one bad input
/// never sinks the run.
pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Vec<RawTable> {
    let mut tables = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match load_file(path) {
            Ok(loaded) => {
                log::info!("{}: {} table(s) loaded", path.display(), loaded.len());
                tables.extend(loaded);
            }
            Err(e) => log::warn!("skipping input: {}", e),
        }
    }
    tables
}

/// Write the unified table; the format follows the output extension
/// (`.xlsx` for a workbook, anything else as CSV).
pub fn export(table: &CanonicalTable, path: &Path) -> Result<(), IoError> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        xlsx::export(table, path)
    } else {
        csv::export(table, path)
    }
}

pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Turn raw records into a table: first record is the header, blank rows are
/// dropped, empty header cells become `Unnamed: <index>`. Returns `None` (and
/// logs) when there are no columns or no data rows.
pub(crate) fn build_table(
    source: &str,
    sheet: Option<&str>,
    records: Vec<Vec<String>>,
) -> Option<RawTable> {
    let label = match sheet {
        Some(sheet) => format!("{} [{}]", source, sheet),
        None => source.to_string(),
    };

    let mut records = records
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));
    let Some(header) = records.next() else {
        log::info!("{}: empty table skipped", label);
        return None;
    };
    let rows: Vec<Vec<String>> = records.collect();
    if rows.is_empty() {
        log::info!("{}: header only, skipped", label);
        return None;
    }

    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            }
        })
        .collect();

    let header = header.iter().map(|cell| cell.trim().to_string()).collect();
    let table = RawTable::new(source, columns, rows).with_header(header);
    Some(match sheet {
        Some(sheet) => table.with_sheet(sheet),
        None => table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(SourceKind::detect(Path::new("a.CSV")).unwrap(), SourceKind::Delimited);
        assert_eq!(SourceKind::detect(Path::new("a.txt")).unwrap(), SourceKind::Delimited);
        assert_eq!(SourceKind::detect(Path::new("a.xlsx")).unwrap(), SourceKind::Workbook);
        assert_eq!(SourceKind::detect(Path::new("a.ods")).unwrap(), SourceKind::Workbook);
        assert!(matches!(
            SourceKind::detect(Path::new("a.pdf")),
            Err(IoError::UnsupportedFormat(_))
        ));
        assert!(SourceKind::detect(Path::new("noext")).is_err());
    }

    #[test]
    fn build_table_names_blank_headers_and_drops_blank_rows() {
        let table = build_table(
            "a.csv",
            None,
            vec![
                strings(&["이름", "", "학교"]),
                strings(&["김철수", "x", "서울대"]),
                strings(&["", " ", ""]),
                strings(&["이영희", "", "부산대"]),
            ],
        )
        .unwrap();
        assert_eq!(table.columns, vec!["이름", "Unnamed: 1", "학교"]);
        assert_eq!(table.header, vec!["이름", "", "학교"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.sheet, None);
    }

    #[test]
    fn build_table_skips_empty_and_header_only() {
        assert!(build_table("a.csv", None, vec![]).is_none());
        assert!(build_table("a.csv", None, vec![strings(&["", ""])]).is_none());
        assert!(build_table("a.xlsx", Some("S1"), vec![strings(&["이름"])]).is_none());
    }

    #[test]
    fn build_table_keeps_sheet_name() {
        let table = build_table(
            "book.xlsx",
            Some("3월"),
            vec![strings(&["이름"]), strings(&["김철수"])],
        )
        .unwrap();
        assert_eq!(table.label(), "book.xlsx [3월]");
    }
}
