// # Google Sheets Tabular Store
//
// This crate provides a Google Sheets implementation of `TabularStore` for
// storewatch, talking to the Sheets v4 REST API.
//
// ## Purpose
//
// The tracked-packages worksheet lives in a shared spreadsheet. Every run
// reads it once and writes back in a handful of batched calls:
//
// | operation               | API call                                        |
// |-------------------------|-------------------------------------------------|
// | `read_rows`             | GET `values/'<sheet>'`                          |
// | `apply_cell_mutations`  | POST `values:batchUpdate`                       |
// | `apply_style_mutations` | POST `:batchUpdate` with `repeatCell` requests  |
// | `append_log_rows`       | POST `values/'<log>'!A1:append`                 |
// | `set_cell`              | PUT `values/'<sheet>'!<cell>`                   |
//
// The change log worksheet is created on first append, with its header
// row, when the spreadsheet does not have it yet.
//
// ## Security Requirements
//
// - Tokens and private keys NEVER appear in logs
// - Credentials are supplied through the environment only
// - With a service-account key, tokens are minted and refreshed by
//   [`TokenSource`] so a long-running daemon never runs on an expired one
//
// ## API Reference
//
// - Sheets API v4: https://developers.google.com/sheets/api/reference/rest

mod auth;

pub use auth::{SHEETS_SCOPE, TokenSource};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use storewatch_core::ComponentRegistry;
use storewatch_core::address::CellAddress;
use storewatch_core::config::StoreConfig;
use storewatch_core::credentials::Credentials;
use storewatch_core::traits::{
    CellMutation, LOG_HEADER, LogRow, SheetRow, StyleMutation, TabularStore, TabularStoreFactory,
};
use storewatch_core::{Error, Result};

/// Sheets API base URL
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Grid size of a freshly created change log worksheet
const LOG_SHEET_ROWS: u32 = 1000;

/// Google Sheets tabular store
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose tokens or keys.
pub struct GoogleSheetsStore {
    /// API base URL (overridable for tests)
    api_base: String,

    /// Spreadsheet key
    spreadsheet_id: String,

    /// Worksheet holding the tracked packages
    worksheet: String,

    /// Worksheet receiving the change log
    log_worksheet: String,

    /// Source of bearer tokens
    tokens: TokenSource,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for GoogleSheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsStore")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet", &self.worksheet)
            .field("log_worksheet", &self.log_worksheet)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl GoogleSheetsStore {
    /// Create a new Sheets store
    ///
    /// # Parameters
    ///
    /// - `spreadsheet_id`: Key from the spreadsheet URL
    /// - `worksheet`: Title of the tracked-packages worksheet
    /// - `log_worksheet`: Title of the change log worksheet
    /// - `credentials`: Bearer token or service-account key with
    ///   spreadsheet scope
    pub fn new(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        log_worksheet: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;
        let tokens = TokenSource::new(credentials, client.clone())?;

        let store = Self {
            api_base: SHEETS_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            log_worksheet: log_worksheet.into(),
            tokens,
            client,
        };

        tracing::debug!(
            "Sheets store for spreadsheet {} as {}",
            store.spreadsheet_id,
            store.tokens.credentials().identity()
        );
        Ok(store)
    }

    /// Point the store at another API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Build `<api_base>/<spreadsheet_id>/<segments...>`
    ///
    /// The first segment may carry a `:method` suffix for the
    /// spreadsheet itself, e.g. `":batchUpdate"`.
    fn endpoint(&self, suffix: &str, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| Error::config(format!("Invalid Sheets API base URL: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::config("Sheets API base URL cannot hold a path"))?;
            path.pop_if_empty();
            path.push(&format!("{}{}", self.spreadsheet_id, suffix));
            path.extend(segments);
        }
        Ok(url)
    }

    /// Send a request and decode the JSON answer
    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<Value> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 401 {
                self.tokens.invalidate().await;
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "{} rejected: invalid or expired access token, or no access to spreadsheet. Status: {}",
                    action, status
                )),
                404 => Error::not_found(format!(
                    "{}: spreadsheet {} not found",
                    action, self.spreadsheet_id
                )),
                429 => Error::rate_limited(format!(
                    "{}: Sheets API quota exceeded. Status: {}",
                    action, status
                )),
                500..=599 => Error::tabular_store(format!(
                    "{}: Sheets API server error (transient): {} - {}",
                    action, status, error_text
                )),
                _ => Error::tabular_store(format!(
                    "{} failed: {} - {}",
                    action, status, error_text
                )),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::tabular_store(format!("{}: failed to parse response: {}", action, e)))
    }

    /// Titles and numeric ids of every worksheet
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /<id>?fields=sheets.properties
    /// ```
    async fn worksheets(&self) -> Result<Vec<(String, i64)>> {
        let url = self.endpoint("", &[])?;
        let json = self
            .send(
                self.client
                    .get(url)
                    .query(&[("fields", "sheets.properties")]),
                "Worksheet lookup",
            )
            .await?;

        let sheets = json["sheets"].as_array().ok_or_else(|| {
            Error::tabular_store("Invalid response format: sheets is not an array")
        })?;

        Ok(sheets
            .iter()
            .filter_map(|sheet| {
                let properties = &sheet["properties"];
                Some((
                    properties["title"].as_str()?.to_string(),
                    properties["sheetId"].as_i64()?,
                ))
            })
            .collect())
    }

    /// Numeric id of the tracked worksheet
    async fn worksheet_id(&self) -> Result<i64> {
        self.worksheets()
            .await?
            .into_iter()
            .find(|(title, _)| *title == self.worksheet)
            .map(|(_, id)| id)
            .ok_or_else(|| Error::not_found(format!("Worksheet not found: {}", self.worksheet)))
    }

    /// Create the change log worksheet and its header if it is missing
    async fn ensure_log_worksheet(&self) -> Result<()> {
        let exists = self
            .worksheets()
            .await?
            .iter()
            .any(|(title, _)| *title == self.log_worksheet);
        if exists {
            return Ok(());
        }

        tracing::info!("Creating change log worksheet '{}'", self.log_worksheet);

        let url = self.endpoint(":batchUpdate", &[])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.log_worksheet,
                        "gridProperties": {
                            "rowCount": LOG_SHEET_ROWS,
                            "columnCount": LOG_HEADER.len(),
                        }
                    }
                }
            }]
        });
        self.send(self.client.post(url).json(&body), "Change log creation")
            .await?;

        let header_range = quoted_range(&self.log_worksheet, "A1");
        let url = self.endpoint("", &["values", &header_range])?;
        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "values": [LOG_HEADER] })),
            "Change log header",
        )
        .await?;

        Ok(())
    }
}

/// A1 range on a named worksheet, with the title quoted
fn quoted_range(worksheet: &str, range: &str) -> String {
    let title = format!("'{}'", worksheet.replace('\'', "''"));
    if range.is_empty() {
        title
    } else {
        format!("{}!{}", title, range)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsStore {
    /// # API Call
    ///
    /// ```http
    /// GET /<id>/values/'Sheet1'?majorDimension=ROWS
    /// ```
    async fn read_rows(&self) -> Result<Vec<SheetRow>> {
        let range = quoted_range(&self.worksheet, "");
        let url = self.endpoint("", &["values", &range])?;
        let json = self
            .send(
                self.client.get(url).query(&[("majorDimension", "ROWS")]),
                "Worksheet read",
            )
            .await?;

        // An empty worksheet has no "values" at all
        let Some(values) = json.get("values").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        let rows = values
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, row)| {
                let cells = row
                    .as_array()
                    .map(|cells| cells.iter().map(cell_text).collect())
                    .unwrap_or_default();
                SheetRow::new(i as u32 + 1, cells)
            })
            .collect::<Vec<_>>();

        tracing::debug!("Read {} row(s) from '{}'", rows.len(), self.worksheet);
        Ok(rows)
    }

    /// # API Call
    ///
    /// ```http
    /// POST /<id>/values:batchUpdate
    /// {
    ///   "valueInputOption": "RAW",
    ///   "data": [{ "range": "'Sheet1'!D2", "values": [["ready"]] }]
    /// }
    /// ```
    async fn apply_cell_mutations(&self, cells: &[CellMutation]) -> Result<()> {
        let data: Vec<Value> = cells
            .iter()
            .map(|cell| {
                json!({
                    "range": quoted_range(&self.worksheet, &cell.address().to_string()),
                    "values": [[cell.value]],
                })
            })
            .collect();

        let url = self.endpoint("", &["values:batchUpdate"])?;
        let body = json!({
            "valueInputOption": "RAW",
            "data": data,
        });
        self.send(self.client.post(url).json(&body), "Cell update")
            .await?;
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// POST /<id>:batchUpdate
    /// { "requests": [{ "repeatCell": { ... backgroundColor ... } }] }
    /// ```
    async fn apply_style_mutations(&self, styles: &[StyleMutation]) -> Result<()> {
        let sheet_id = self.worksheet_id().await?;

        let requests: Vec<Value> = styles
            .iter()
            .map(|style| {
                let (red, green, blue) = style.indicator.rgb();
                json!({
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startRowIndex": style.row.saturating_sub(1),
                            "endRowIndex": style.row,
                            "startColumnIndex": style.column,
                            "endColumnIndex": style.column + 1,
                        },
                        "cell": {
                            "userEnteredFormat": {
                                "backgroundColor": { "red": red, "green": green, "blue": blue }
                            }
                        },
                        "fields": "userEnteredFormat.backgroundColor",
                    }
                })
            })
            .collect();

        let url = self.endpoint(":batchUpdate", &[])?;
        self.send(
            self.client.post(url).json(&json!({ "requests": requests })),
            "Format update",
        )
        .await?;
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// POST /<id>/values/'Changes Log'!A1:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS
    /// ```
    async fn append_log_rows(&self, rows: &[LogRow]) -> Result<()> {
        self.ensure_log_worksheet().await?;

        let values: Vec<Vec<String>> = rows.iter().map(LogRow::to_cells).collect();
        let range = format!("{}:append", quoted_range(&self.log_worksheet, "A1"));
        let url = self.endpoint("", &["values", &range])?;

        self.send(
            self.client
                .post(url)
                .query(&[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&json!({ "values": values })),
            "Change log append",
        )
        .await?;
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /<id>/values/'Sheet1'!J2?valueInputOption=RAW
    /// ```
    async fn set_cell(&self, address: &CellAddress, value: &str) -> Result<()> {
        let range = quoted_range(&self.worksheet, &address.to_string());
        let url = self.endpoint("", &["values", &range])?;

        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "values": [[value]] })),
            "Cell write",
        )
        .await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "google_sheets"
    }
}

/// Factory for creating Google Sheets stores
pub struct GoogleSheetsFactory;

#[async_trait]
impl TabularStoreFactory for GoogleSheetsFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>> {
        match config {
            StoreConfig::GoogleSheets {
                spreadsheet_id,
                worksheet,
                log_worksheet,
                credentials,
            } => Ok(Box::new(GoogleSheetsStore::new(
                spreadsheet_id,
                worksheet,
                log_worksheet,
                credentials.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Google Sheets store")),
        }
    }
}

/// Register the Google Sheets store with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_store("google_sheets", Box::new(GoogleSheetsFactory));
}
