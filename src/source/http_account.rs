//! HTTP account reader backed by `reqwest`.

use std::time::Duration;

use reqwest::StatusCode;

use super::{AccountReadError, AccountReader};
use crate::domain::PairAccount;

/// Reads pair accounts from `GET {base_url}/pairs/{pair_key}`.
///
/// The endpoint is expected to return the decoded account as JSON in the
/// shape of [`PairAccount`].
#[derive(Debug, Clone)]
pub struct HttpAccountReader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccountReader {
    /// Creates a reader with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AccountReadError::Transient`] if the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccountReadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccountReadError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, pair_key: &str) -> String {
        format!("{}/pairs/{pair_key}", self.base_url)
    }
}

#[async_trait::async_trait]
impl AccountReader for HttpAccountReader {
    async fn fetch_pair_account(&self, pair_key: &str) -> Result<PairAccount, AccountReadError> {
        let response = self
            .client
            .get(self.url(pair_key))
            .send()
            .await
            .map_err(|e| AccountReadError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AccountReadError::NotFound(pair_key.to_string()));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AccountReadError::Transient(format!("{status} for {pair_key}")));
        }
        if !status.is_success() {
            return Err(AccountReadError::Malformed(format!("{status} for {pair_key}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AccountReadError::Transient(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| AccountReadError::Malformed(e.to_string()))
    }
}
