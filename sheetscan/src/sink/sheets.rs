use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SheetConfig;
use crate::error::{Result, ScanError};

use super::{RowSink, SheetRow};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Appends rows to a Google Sheets spreadsheet via `values:append`.
///
/// Authentication is a caller-supplied OAuth2 bearer token; acquiring and
/// refreshing it is an external concern. Transient failures (429, 5xx,
/// connection errors) are retried with exponential backoff; auth failures
/// are terminal.
#[derive(Clone, Debug)]
pub struct SheetsSink {
    client: Client,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct AppendRequest {
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<UpdateSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    updated_rows: Option<u32>,
}

impl SheetsSink {
    pub fn new(config: &SheetConfig) -> Result<Self> {
        let spreadsheet_id = config.spreadsheet_id.clone().ok_or_else(|| {
            ScanError::SinkUnavailable("SHEET_SPREADSHEET_ID not set".to_string())
        })?;
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| ScanError::SinkUnavailable("SHEET_ACCESS_TOKEN not set".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Sink(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            spreadsheet_id,
            sheet_name: config.sheet_name.clone(),
            access_token,
            base_url,
            max_retries: config.max_retries,
        })
    }

    fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url, self.spreadsheet_id, self.sheet_name
        )
    }

    async fn make_request(&self, request: &AppendRequest) -> Result<()> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(self.append_url())
                .query(&[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .header("Authorization", format!("Bearer {}", self.access_token))
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let append: AppendResponse = resp.json().await.map_err(|e| {
                            ScanError::Sink(format!("failed to parse append response: {e}"))
                        })?;
                        let rows = append
                            .updates
                            .and_then(|u| u.updated_rows)
                            .unwrap_or_default();
                        debug!(rows, "Row appended to sheet");
                        return Ok(());
                    } else if status.as_u16() == 401 || status.as_u16() == 403 {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(ScanError::SinkAuth(format!("{status} - {body}")));
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        retries += 1;
                        if retries >= self.max_retries {
                            return Err(ScanError::Sink(format!(
                                "append failed after {} retries: {status}",
                                self.max_retries
                            )));
                        }
                        warn!(%status, retries, "Transient sheet error; backing off");
                        let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                        tokio::time::sleep(delay).await;
                        continue;
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(ScanError::Sink(format!(
                            "append failed: {status} - {body}"
                        )));
                    }
                }
                Err(e) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(ScanError::Sink(format!(
                            "append failed after {} retries: {e}",
                            self.max_retries
                        )));
                    }
                    warn!(error = %e, retries, "Sheet request error; backing off");
                    let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn append(&self, row: SheetRow) -> Result<()> {
        let request = AppendRequest {
            values: vec![row.values()],
        };
        self.make_request(&request).await
    }
}
