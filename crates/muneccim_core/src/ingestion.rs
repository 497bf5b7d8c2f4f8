//! crates/muneccim_core/src/ingestion.rs
//!
//! Validation, storage keying and header-based parsing of uploaded datasets.

use bytes::Bytes;
use calamine::{Data, Reader, Xlsx};
use std::collections::HashSet;
use std::io::Cursor;
use uuid::Uuid;

use crate::domain::{ParsedDataset, Record};

/// Uploads larger than this are rejected before anything leaves the process.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(UploadFormat::Csv),
            "xlsx" => Some(UploadFormat::Xlsx),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file format: only .csv and .xlsx files are accepted")]
    InvalidFormat,
    #[error("File is too large: {size} bytes exceeds the 5 MiB limit")]
    FileTooLarge { size: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("The file has no header row")]
    MissingHeader,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("XLSX error: {0}")]
    Xlsx(#[from] calamine::XlsxError),
}

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// Reduces a client-supplied name to its final path component.
pub fn sanitize_file_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
}

/// Checks the extension first, then the size.
pub fn validate_upload(file_name: &str, size: u64) -> Result<UploadFormat, ValidationError> {
    let file_name = sanitize_file_name(file_name);
    if file_name.is_empty() {
        return Err(ValidationError::InvalidFormat);
    }
    let format = UploadFormat::from_file_name(file_name).ok_or(ValidationError::InvalidFormat)?;
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge { size });
    }
    Ok(format)
}

/// Object key for an upload: namespaced per user, with a random per-upload segment so
/// keys cannot be guessed from the user id and file name.
pub fn storage_key(user_id: Uuid, object_id: Uuid, file_name: &str) -> String {
    format!(
        "uploads/{}/{}/{}",
        user_id,
        object_id,
        sanitize_file_name(file_name)
    )
}

/// Parses the file into rows, using the first row as column names.
pub fn parse_dataset(format: UploadFormat, data: &[u8]) -> Result<ParsedDataset, DatasetError> {
    match format {
        UploadFormat::Csv => parse_csv(data),
        UploadFormat::Xlsx => parse_xlsx(data),
    }
}

fn parse_csv(data: &[u8]) -> Result<ParsedDataset, DatasetError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut records = reader.records();

    let header = match records.next() {
        Some(header) => header?,
        None => return Err(DatasetError::MissingHeader),
    };
    let columns = column_names(header.iter());
    if columns.is_empty() {
        return Err(DatasetError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        rows.push(to_record(&columns, record.iter().map(str::to_string)));
    }
    Ok(ParsedDataset { columns, rows })
}

fn parse_xlsx(data: &[u8]) -> Result<ParsedDataset, DatasetError> {
    let mut workbook = Xlsx::new(Cursor::new(data))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(DatasetError::MissingHeader),
    };

    let mut sheet_rows = range
        .rows()
        .filter(|cells| !cells.iter().all(|cell| matches!(cell, Data::Empty)));

    let header = sheet_rows.next().ok_or(DatasetError::MissingHeader)?;
    let header: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();
    let columns = column_names(header.iter().map(String::as_str));

    let rows = sheet_rows
        .map(|cells| to_record(&columns, cells.iter().map(|cell| cell.to_string())))
        .collect();
    Ok(ParsedDataset { columns, rows })
}

/// Names blank headers after their position and suffixes repeats with `_1`, `_2`, ...
fn column_names<'a>(header: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (index, raw) in header.enumerate() {
        let base = match raw.trim() {
            "" => format!("column_{}", index + 1),
            name => name.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

/// Missing trailing cells become empty strings; cells past the header are dropped.
fn to_record(columns: &[String], cells: impl Iterator<Item = String>) -> Record {
    let mut cells = cells;
    columns
        .iter()
        .map(|column| (column.clone(), cells.next().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension_regardless_of_size() {
        assert_eq!(validate_upload("data.txt", 10), Err(ValidationError::InvalidFormat));
        assert_eq!(
            validate_upload("data.txt", 6 * 1024 * 1024),
            Err(ValidationError::InvalidFormat)
        );
        assert_eq!(validate_upload("csv", 10), Err(ValidationError::InvalidFormat));
    }

    #[test]
    fn rejects_oversized_csv() {
        let size = 6 * 1024 * 1024;
        assert_eq!(
            validate_upload("data.csv", size),
            Err(ValidationError::FileTooLarge { size })
        );
    }

    #[test]
    fn accepts_small_csv_and_xlsx() {
        assert_eq!(validate_upload("data.csv", 1024), Ok(UploadFormat::Csv));
        assert_eq!(validate_upload("Report.XLSX", 1024), Ok(UploadFormat::Xlsx));
        assert_eq!(validate_upload("limit.csv", MAX_UPLOAD_BYTES), Ok(UploadFormat::Csv));
    }

    #[test]
    fn storage_key_is_namespaced_and_strips_directories() {
        let user_id = Uuid::nil();
        let object_id = Uuid::new_v4();
        assert_eq!(
            storage_key(user_id, object_id, "../../etc/sales.csv"),
            format!("uploads/{}/{}/sales.csv", user_id, object_id)
        );
        assert_eq!(sanitize_file_name("C:\\data\\q1.xlsx"), "q1.xlsx");
        assert_eq!(validate_upload("dir/", 10), Err(ValidationError::InvalidFormat));
    }

    #[test]
    fn parses_csv_with_header_inference() {
        let csv = b"\xEF\xBB\xBFregion,amount\nnorth,10\n\nsouth,20\n";
        let dataset = parse_dataset(UploadFormat::Csv, csv).unwrap();
        assert_eq!(dataset.columns, vec!["region", "amount"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.rows[1]["region"], "south");
        assert_eq!(dataset.rows[1]["amount"], "20");
    }

    #[test]
    fn csv_values_stay_raw_text() {
        let dataset = parse_dataset(UploadFormat::Csv, b"id,price\n007,1.50\n").unwrap();
        assert_eq!(dataset.rows[0]["id"], "007");
        assert_eq!(dataset.rows[0]["price"], "1.50");
    }

    #[test]
    fn ragged_rows_keep_the_header_column_set() {
        let dataset = parse_dataset(UploadFormat::Csv, b"a,b,c\n1\n1,2,3,4\n").unwrap();
        assert_eq!(dataset.columns, vec!["a", "b", "c"]);
        for row in &dataset.rows {
            assert_eq!(row.keys().cloned().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        }
        assert_eq!(dataset.rows[0]["c"], "");
        assert_eq!(dataset.rows[1]["c"], "3");
    }

    #[test]
    fn duplicate_and_blank_headers_are_disambiguated() {
        let dataset = parse_dataset(UploadFormat::Csv, b"name,name,\nx,y,z\n").unwrap();
        assert_eq!(dataset.columns, vec!["name", "name_1", "column_3"]);
        assert_eq!(dataset.rows[0]["name_1"], "y");
        assert_eq!(dataset.rows[0]["column_3"], "z");
    }

    #[test]
    fn empty_csv_has_no_header() {
        assert!(matches!(
            parse_dataset(UploadFormat::Csv, b""),
            Err(DatasetError::MissingHeader)
        ));
    }

    #[test]
    fn parses_first_xlsx_sheet_as_text() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "region").unwrap();
        sheet.write_string(0, 1, "amount").unwrap();
        sheet.write_string(1, 0, "north").unwrap();
        sheet.write_number(1, 1, 10.0).unwrap();
        // Row 2 stays blank.
        sheet.write_string(3, 0, "south").unwrap();
        sheet.write_number(3, 1, 2.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = parse_dataset(UploadFormat::Xlsx, &bytes).unwrap();
        assert_eq!(dataset.columns, vec!["region", "amount"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.rows[0]["region"], "north");
        assert_eq!(dataset.rows[0]["amount"], "10");
        assert_eq!(dataset.rows[1]["region"], "south");
        assert_eq!(dataset.rows[1]["amount"], "2.5");
    }

    #[test]
    fn invalid_xlsx_bytes_are_an_error() {
        assert!(parse_dataset(UploadFormat::Xlsx, b"not a zip archive").is_err());
    }
}
