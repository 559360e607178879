//! Row delivery.
//!
//! Extracted text leaves the pipeline through a [`RowSink`]. The real sink
//! appends a row to a Google Sheets spreadsheet; when the sheet is not
//! configured the pipeline falls back to [`LogSink`], which records rows in
//! the log instead of delivering them.

mod sheets;

pub use sheets::SheetsSink;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::SheetConfig;
use crate::error::Result;

/// One spreadsheet row. Rows are keyed by append order; there is no upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub captured_at: DateTime<Utc>,
    pub text: String,
    pub source: String,
}

impl SheetRow {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            captured_at: Utc::now(),
            text: text.into(),
            source: source.into(),
        }
    }

    /// Cell values in sheet column order: timestamp, text, source file.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.captured_at.to_rfc3339(),
            self.text.clone(),
            self.source.clone(),
        ]
    }
}

/// Durable delivery of one row to an external tabular store.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append(&self, row: SheetRow) -> Result<()>;
}

/// Log-only sink: the fallback when no spreadsheet is configured. Rows are
/// recorded at info level and considered delivered.
pub struct LogSink;

#[async_trait]
impl RowSink for LogSink {
    async fn append(&self, row: SheetRow) -> Result<()> {
        info!(
            source = %row.source,
            text = %row.text,
            "Sheet not configured; row logged only"
        );
        Ok(())
    }
}

/// Build the configured sink, degrading to [`LogSink`] with a warning when
/// the spreadsheet id or access token is missing.
pub fn from_config(config: &SheetConfig) -> Arc<dyn RowSink> {
    match SheetsSink::new(config) {
        Ok(sink) => {
            info!(
                spreadsheet = config.spreadsheet_id.as_deref().unwrap_or_default(),
                sheet = %config.sheet_name,
                "Sheets sink initialized"
            );
            Arc::new(sink)
        }
        Err(e) => {
            warn!("Sheets sink unavailable: {e} - rows will be logged only");
            Arc::new(LogSink)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_values_order() {
        let row = SheetRow::new("INVOICE 42", "1700000000000.jpg");
        let values = row.values();

        assert_eq!(values.len(), 3);
        assert_eq!(values[1], "INVOICE 42");
        assert_eq!(values[2], "1700000000000.jpg");
        // First cell is an RFC 3339 timestamp.
        assert!(DateTime::parse_from_rfc3339(&values[0]).is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_rows() {
        let sink = LogSink;
        assert!(sink.append(SheetRow::new("text", "file.jpg")).await.is_ok());
    }

    #[test]
    fn test_unconfigured_sheet_falls_back_to_log_sink() {
        let config = SheetConfig {
            spreadsheet_id: None,
            sheet_name: "Sheet1".to_string(),
            access_token: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 3,
        };
        // Must not error; the fallback is the original stub behavior.
        let _sink = from_config(&config);
    }
}
