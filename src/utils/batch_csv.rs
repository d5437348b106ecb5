use csv::{ReaderBuilder, Trim, Writer};

use crate::errors::ServiceError;
use crate::models::{BatchRowDto, BatchShortenDto, UrlMapping};

pub const ORIGIN_URL_COLUMN: &str = "origin_url";

/// Reads an uploaded CSV into a batch. The header row must name an
/// `origin_url` column; other columns are ignored.
///
/// Blank cells become rows without a URL so the batch validation can report
/// them by row number.
pub fn read_batch(body: &[u8]) -> Result<BatchShortenDto, ServiceError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body);

    let column = reader
        .headers()
        .map_err(|e| ServiceError::MalformedInput(format!("Unreadable CSV header: {}", e)))?
        .iter()
        .position(|name| name == ORIGIN_URL_COLUMN)
        .ok_or_else(|| {
            ServiceError::MalformedInput(format!(
                "CSV file must contain '{}' column",
                ORIGIN_URL_COLUMN
            ))
        })?;

    let mut urls = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| ServiceError::MalformedInput(format!("Row {}: {}", row, e)))?;
        urls.push(BatchRowDto {
            origin_url: record
                .get(column)
                .filter(|cell| !cell.is_empty())
                .map(str::to_string),
        });
    }

    Ok(BatchShortenDto { urls })
}

/// `short_code,origin_url` rows in the order given.
pub fn write_mappings(mappings: &[UrlMapping]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(["short_code", ORIGIN_URL_COLUMN])
        .map_err(|e| ServiceError::Internal(format!("Failed to write CSV: {}", e)))?;

    for mapping in mappings {
        writer
            .write_record([mapping.short_code.as_str(), mapping.origin_url.as_str()])
            .map_err(|e| ServiceError::Internal(format!("Failed to write CSV: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::Internal(format!("Failed to flush CSV: {}", e)))
}
