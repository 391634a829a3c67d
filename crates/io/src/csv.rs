// Delimited text import/export

use std::io::Write;
use std::path::Path;

use sheetmerge_recon::{CanonicalTable, RawTable};

use crate::error::IoError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Load one delimited file. `.tsv` is always tab-separated; anything else is
/// sniffed. Returns `None` when the file holds no usable table.
pub fn import(path: &Path) -> Result<Option<RawTable>, IoError> {
    let content = read_file_as_utf8(path)?;
    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    let delimiter = if is_tsv { b'\t' } else { sniff_delimiter(&content) };
    let records = parse_records(&content, delimiter).map_err(|message| IoError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(crate::build_table(&crate::source_name(path), None, records))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: lines agreeing with line 1, weighted by its field count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file as UTF-8, stripping a BOM. Bytes that are not valid UTF-8 are
/// decoded as EUC-KR (CP949), the usual encoding of Korean office exports.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
            if had_errors {
                log::warn!(
                    "{}: not valid UTF-8 or EUC-KR, some characters were replaced",
                    path.display()
                );
            } else {
                log::debug!("{}: decoded as EUC-KR", path.display());
            }
            Ok(decoded.into_owned())
        }
    }
}

fn parse_records(content: &str, delimiter: u8) -> Result<Vec<Vec<String>>, String> {
    // Header and data rows often differ in width on hand-made sheets.
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

/// Write a table as comma-separated UTF-8 with a BOM, so spreadsheet tools
/// pick the right encoding.
pub fn export(table: &CanonicalTable, path: &Path) -> Result<(), IoError> {
    let write_err = |message: String| IoError::Write {
        path: path.to_path_buf(),
        message,
    };

    let mut file = std::fs::File::create(path).map_err(|e| write_err(e.to_string()))?;
    file.write_all(UTF8_BOM).map_err(|e| write_err(e.to_string()))?;

    let mut writer = csv::WriterBuilder::new().from_writer(file);
    writer
        .write_record(&table.columns)
        .map_err(|e| write_err(e.to_string()))?;
    for row in table.rows() {
        writer
            .write_record(&row)
            .map_err(|e| write_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| write_err(e.to_string()))?;
    Ok(())
}
