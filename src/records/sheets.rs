use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use regex::Regex;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info};

use super::{SourceError, Table, TableSource};
use crate::config::SourceConfig;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

static SHEET_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").ok());

/// Pull the spreadsheet id out of a sharing URL such as
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0`.
pub fn extract_sheet_id(url: &str) -> Option<&str> {
    let pattern = SHEET_ID.as_ref()?;
    pattern
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads the first worksheet of a Google Sheet through the Sheets v4 values
/// endpoint, rate limited so dashboard refreshes cannot exhaust the quota.
#[derive(Debug)]
pub struct SheetsTableSource {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
    sheet_id: String,
    range: String,
    api_key: String,
}

impl SheetsTableSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let sheet_id = extract_sheet_id(&config.sheet_url)
            .ok_or_else(|| SourceError::InvalidSheetUrl(config.sheet_url.clone()))?
            .to_string();
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                SourceError::NotConfigured(
                    "source.api_key is required for Google Sheets".to_string(),
                )
            })?;

        Self::new(
            SHEETS_API_BASE,
            sheet_id,
            config.range.clone(),
            api_key,
            config.requests_per_minute,
        )
    }

    pub fn new(
        base_url: impl Into<String>,
        sheet_id: impl Into<String>,
        range: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_minute: u32,
    ) -> Result<Self, SourceError> {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            rate_limiter,
            base_url: base_url.into(),
            sheet_id: sheet_id.into(),
            range: range.into(),
            api_key: api_key.into(),
        })
    }

    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    fn values_url(&self) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url.trim_end_matches('/'),
            self.sheet_id,
            self.range
        )
    }
}

#[async_trait]
impl TableSource for SheetsTableSource {
    fn name(&self) -> &str {
        "Google Sheets"
    }

    async fn fetch(&self) -> Result<Table, SourceError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        debug!(sheet_id = %self.sheet_id, range = %self.range, "Requesting sheet values");
        let response = self
            .client
            .get(self.values_url())
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let body: ValueRange = response.json().await?;
        info!(
            sheet_id = %self.sheet_id,
            rows = body.values.len(),
            "Fetched Google Sheet values"
        );
        Table::from_values(body.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sheet_id_from_sharing_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-d_9xYz/edit#gid=0";
        assert_eq!(extract_sheet_id(url), Some("1AbC-d_9xYz"));
    }

    #[test]
    fn test_extract_sheet_id_rejects_other_urls() {
        assert_eq!(extract_sheet_id("https://example.com/d/abc"), None);
        assert_eq!(extract_sheet_id(""), None);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = SourceConfig {
            kind: crate::config::SourceKind::GoogleSheets,
            sheet_url: "https://docs.google.com/spreadsheets/d/abc123/edit".to_string(),
            api_key: None,
            ..SourceConfig::default()
        };
        let err = SheetsTableSource::from_config(&config).unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(_)));
    }

    #[test]
    fn test_values_url_uses_range() {
        let source =
            SheetsTableSource::new("https://sheets.test/v4/spreadsheets/", "abc", "Sheet1", "k", 60)
                .unwrap();
        assert_eq!(source.values_url(), "https://sheets.test/v4/spreadsheets/abc/values/Sheet1");
        assert_eq!(source.sheet_id(), "abc");
    }

    #[test]
    fn test_value_range_tolerates_missing_values() {
        let body: ValueRange = serde_json::from_str(r#"{"range":"Sheet1!A1:Z1000"}"#).unwrap();
        assert!(body.values.is_empty());
    }
}
