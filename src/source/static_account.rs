//! Account reader over a fixed set of accounts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use super::{AccountReadError, AccountReader};
use crate::domain::PairAccount;

/// [`AccountReader`] answering from an in-process map.
///
/// Used in tests and for offline replays where account data was exported
/// alongside the event log.
#[derive(Debug, Default)]
pub struct StaticAccountReader {
    accounts: RwLock<HashMap<String, PairAccount>>,
}

impl StaticAccountReader {
    /// Creates an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON object mapping pair keys to accounts.
    ///
    /// # Errors
    ///
    /// Returns [`AccountReadError::Malformed`] if the file cannot be read
    /// or decoded.
    pub async fn from_file(path: &Path) -> Result<Self, AccountReadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AccountReadError::Malformed(format!("{}: {e}", path.display())))?;
        let accounts: HashMap<String, PairAccount> = serde_json::from_slice(&bytes)
            .map_err(|e| AccountReadError::Malformed(format!("{}: {e}", path.display())))?;
        Ok(Self {
            accounts: RwLock::new(accounts),
        })
    }

    /// Registers or replaces an account.
    pub fn insert(&self, pair_key: &str, account: PairAccount) {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pair_key.to_string(), account);
    }
}

#[async_trait::async_trait]
impl AccountReader for StaticAccountReader {
    async fn fetch_pair_account(&self, pair_key: &str) -> Result<PairAccount, AccountReadError> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pair_key)
            .cloned()
            .ok_or_else(|| AccountReadError::NotFound(pair_key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_registered_account() {
        let reader = StaticAccountReader::new();
        reader.insert(
            "pair-1",
            PairAccount {
                ticker: "ATT".to_string(),
                ..PairAccount::default()
            },
        );
        let Ok(account) = reader.fetch_pair_account("pair-1").await else {
            panic!("expected account");
        };
        assert_eq!(account.ticker, "ATT");
        assert_eq!(
            reader.fetch_pair_account("pair-2").await,
            Err(AccountReadError::NotFound("pair-2".to_string()))
        );
    }

    #[tokio::test]
    async fn loads_accounts_from_json_file() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = tmp.path().join("accounts.json");
        let body = r#"{"pair-1": {"name": "Attention", "ticker": "ATT", "requestConfigs": [{"price": 5, "description": "slot"}]}}"#;
        assert!(std::fs::write(&path, body).is_ok());

        let Ok(reader) = StaticAccountReader::from_file(&path).await else {
            panic!("load failed");
        };
        let Ok(account) = reader.fetch_pair_account("pair-1").await else {
            panic!("expected account");
        };
        assert_eq!(account.request_configs.len(), 1);
        assert_eq!(account.website, "");
    }
}
