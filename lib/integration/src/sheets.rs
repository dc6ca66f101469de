//! Spreadsheet rows fetched through the CSV export endpoint.

use crate::client::{join_url, send};
use crate::error::request_failure;
use async_trait::async_trait;
use merlinflow_workflow::{CollaboratorError, SheetFetcher};
use reqwest::Client as HttpClient;
use rootcause::prelude::Report;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

const SERVICE: &str = "google-sheets";

/// Pulls the document ID out of a spreadsheet link.
///
/// Links look like `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0`.
#[must_use]
pub fn extract_sheet_id(link: &str) -> Option<&str> {
    let (_, rest) = link.split_once("/d/")?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// Parses CSV text into one JSON object per row, keyed by the header row.
///
/// Every value stays a string. Rows with no non-empty field are skipped, and
/// short rows only carry the columns they have.
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn parse_csv_rows(text: &str) -> Result<Vec<JsonValue>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Map<String, JsonValue> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), JsonValue::String(value.to_string())))
            .collect();
        rows.push(JsonValue::Object(row));
    }
    Ok(rows)
}

/// Fetches sheet rows over HTTP.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    http: HttpClient,
    export_base_url: String,
}

impl GoogleSheetsClient {
    #[must_use]
    pub fn new(http: HttpClient, export_base_url: impl Into<String>) -> Self {
        Self {
            http,
            export_base_url: export_base_url.into(),
        }
    }

    /// Returns the CSV export URL of the first worksheet.
    #[must_use]
    pub fn export_url(&self, sheet_id: &str) -> String {
        join_url(
            &self.export_base_url,
            &format!("spreadsheets/d/{sheet_id}/export?format=csv&gid=0"),
        )
    }
}

#[async_trait]
impl SheetFetcher for GoogleSheetsClient {
    #[instrument(skip(self))]
    async fn fetch_rows(&self, link: &str) -> Result<Vec<JsonValue>, Report<CollaboratorError>> {
        let sheet_id = extract_sheet_id(link).ok_or_else(|| CollaboratorError::InvalidRequest {
            service: SERVICE.to_string(),
            details: format!("no sheet ID in link '{link}'"),
        })?;

        let response = send(SERVICE, self.http.get(self.export_url(sheet_id))).await?;
        let text = response
            .text()
            .await
            .map_err(|err| request_failure(SERVICE, &err))?;
        let rows = parse_csv_rows(&text).map_err(|err| CollaboratorError::InvalidResponse {
            service: SERVICE.to_string(),
            details: err.to_string(),
        })?;

        debug!(sheet_id, rows = rows.len(), "Fetched sheet rows");
        Ok(rows)
    }
}
