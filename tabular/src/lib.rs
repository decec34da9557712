use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use data_model::{CellValue, FileFormat, Row};

// Largest magnitude a f64 can hold without losing integer precision.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("corrupt xlsx: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("workbook has no worksheets")]
    NoWorksheet,
}

/// Decode `bytes` as `format`. Rows come back in file order, each row
/// keyed by the header row in source column order.
pub fn parse(format: FileFormat, bytes: &[u8]) -> Result<Vec<Row>, Error> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Xlsx => parse_xlsx(bytes),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Row>, Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), csv_cell(field));
        }
        rows.push(row);
    }
    Ok(rows)
}

// The csv reader only yields strings, so numbers and booleans are
// recovered lexically. Empty cells become null, not "".
fn csv_cell(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        if f.is_finite() {
            return CellValue::Float(f);
        }
    }
    match field {
        "true" => CellValue::Bool(true),
        "false" => CellValue::Bool(false),
        _ => CellValue::Text(field.to_string()),
    }
}

fn parse_xlsx(bytes: &[u8]) -> Result<Vec<Row>, Error> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(Error::NoWorksheet)??;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(header_text).collect();

    let mut rows = Vec::new();
    for record in sheet_rows {
        let mut row = Row::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), xlsx_cell(cell));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn xlsx_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Integer(*i),
        // Spreadsheets store most integers as floats. Keep them
        // integral when they fit exactly.
        Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => {
            CellValue::Integer(*f as i64)
        }
        Data::Float(f) => CellValue::Float(*f),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Null,
    }
}
