use std::{io::Cursor, path::Path};

use calamine::{open_workbook_auto_from_rs, Reader};
use csv::ReaderBuilder;
use tracing::debug;

use super::{normalize::canonical_headers, FeedError, FeedTable};

/// Upload flavour, picked from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    /// `.csv`: comma, or semicolon for locales that use a decimal comma.
    Csv,
    /// `.tsv` / `.tab`
    Tsv,
    /// `.txt`: delimiter sniffed from the header line.
    Text,
    /// `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods`: first worksheet.
    Spreadsheet,
}

impl FeedFormat {
    pub fn from_file_name(name: &str) -> Result<Self, FeedError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FeedFormat::Csv),
            "tsv" | "tab" => Ok(FeedFormat::Tsv),
            "txt" => Ok(FeedFormat::Text),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FeedFormat::Spreadsheet),
            _ => Err(FeedError::UnsupportedFormat(name.to_string())),
        }
    }

    fn candidates(self) -> &'static [u8] {
        match self {
            FeedFormat::Csv => b",;",
            FeedFormat::Tsv => b"\t",
            FeedFormat::Text | FeedFormat::Spreadsheet => b"\t,;|",
        }
    }
}

/// Pick the candidate that occurs most often in the header line; ties go to
/// the earlier candidate.
fn sniff_delimiter(data: &[u8], candidates: &[u8]) -> u8 {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let mut best = candidates[0];
    let mut best_count = 0;
    for &candidate in candidates {
        let count = first_line.iter().filter(|&&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn is_blank<S: AsRef<str>>(cells: &[S]) -> bool {
    cells.iter().all(|cell| cell.as_ref().trim().is_empty())
}

/// Canonicalize headers and drop fully blank rows. Cell values are kept as
/// uploaded.
fn build_table<I>(headers: Vec<String>, records: I) -> Result<FeedTable, FeedError>
where
    I: IntoIterator<Item = Result<Vec<String>, FeedError>>,
{
    if is_blank(&headers) {
        return Err(FeedError::EmptyFeed);
    }
    let columns = canonical_headers(&headers);

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if !is_blank(&record) {
            rows.push(record);
        }
    }

    if rows.is_empty() {
        return Err(FeedError::EmptyFeed);
    }
    Ok(FeedTable::new(columns, rows))
}

fn load_delimited(data: &[u8], format: FeedFormat) -> Result<FeedTable, FeedError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let delimiter = sniff_delimiter(data, format.candidates());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FeedError::MalformedFeed(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let records = reader.records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(|e| FeedError::MalformedFeed(e.to_string()))
    });
    let table = build_table(headers, records)?;
    debug!(
        delimiter = %(delimiter as char).escape_default(),
        columns = table.columns().len(),
        rows = table.row_count(),
        "feed loaded"
    );
    Ok(table)
}

fn load_spreadsheet(data: &[u8]) -> Result<FeedTable, FeedError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
        .map_err(|e| FeedError::MalformedFeed(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(FeedError::EmptyFeed)?
        .map_err(|e| FeedError::MalformedFeed(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let headers = rows.next().ok_or(FeedError::EmptyFeed)?;
    let table = build_table(headers, rows.map(Ok))?;
    debug!(
        columns = table.columns().len(),
        rows = table.row_count(),
        "spreadsheet feed loaded"
    );
    Ok(table)
}

/// Parse an uploaded feed: first row is headers, the rest are data rows.
///
/// Headers are normalized and aliased to canonical field names; fully blank
/// rows are skipped.
pub fn load(data: &[u8], format: FeedFormat) -> Result<FeedTable, FeedError> {
    match format {
        FeedFormat::Spreadsheet => load_spreadsheet(data),
        _ => load_delimited(data, format),
    }
}
