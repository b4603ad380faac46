//! HTTP ledger client
//!
//! Talks to a PostgREST-style API in front of the credits database. Balance
//! moves and ledger rows are written together by the `append_credit_entry`
//! RPC, which deduplicates on the idempotency key.
//!
//! # Architecture
//!
//! - Credentials stored in keychain via `creditsync_common::security`
//! - Structured tracing on every request
//! - Request timeout on all API calls; retries are the caller's concern

use std::time::Duration;

use async_trait::async_trait;
use creditsync_common::security::KeychainProvider;
use creditsync_core::ports::LedgerClient;
use creditsync_domain::constants::LEDGER_API_KEY_ACCOUNT;
use creditsync_domain::{
    AccountException, AppendOutcome, Identity, LedgerConfig, LedgerEntry, LedgerError,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::InfraError;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Where the API key comes from.
#[derive(Debug, Clone)]
enum ApiKeySource {
    Keychain(KeychainProvider),
    Static(String),
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    credits: i64,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    created: bool,
}

/// [`LedgerClient`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
    api_key: ApiKeySource,
}

impl HttpLedgerClient {
    /// Build a client that reads its API key from the keychain service named
    /// in `config`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if the base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let keychain = KeychainProvider::new(&config.keychain_service);
        Self::build(config, ApiKeySource::Keychain(keychain))
    }

    /// Build a client with a fixed API key (no keychain access).
    pub fn with_api_key(config: &LedgerConfig, api_key: impl Into<String>) -> Result<Self, LedgerError> {
        Self::build(config, ApiKeySource::Static(api_key.into()))
    }

    fn build(config: &LedgerConfig, api_key: ApiKeySource) -> Result<Self, LedgerError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| LedgerError::Config(format!("invalid ledger URL {}: {e}", config.base_url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(LedgerError::Config(format!(
                "unsupported ledger URL scheme: {}",
                base_url.scheme()
            )));
        }
        // Url::join drops the last path segment unless it ends in '/'
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LedgerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url, timeout: config.request_timeout(), api_key })
    }

    /// Store the API key in the keychain.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if the client was built with a fixed key
    /// or the keychain write fails.
    pub fn set_api_key(&self, api_key: &str) -> Result<(), LedgerError> {
        match &self.api_key {
            ApiKeySource::Keychain(keychain) => keychain
                .set_secret(LEDGER_API_KEY_ACCOUNT, api_key)
                .map_err(|e| InfraError::from(e).into()),
            ApiKeySource::Static(_) => {
                Err(LedgerError::Config("client was built with a fixed API key".into()))
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn api_key(&self) -> Result<String, LedgerError> {
        match &self.api_key {
            ApiKeySource::Keychain(keychain) => keychain
                .get_secret(LEDGER_API_KEY_ACCOUNT)
                .map_err(|e| InfraError::from(e).into()),
            ApiKeySource::Static(key) => Ok(key.clone()),
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap, LedgerError> {
        let key = self.api_key()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&key)
                .map_err(|_| LedgerError::Config("API key is not a valid header value".into()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| LedgerError::Config("API key is not a valid header value".into()))?,
        );
        Ok(headers)
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base_url
            .join(path)
            .map_err(|e| LedgerError::Config(format!("invalid ledger path {path}: {e}")))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, LedgerError> {
        Ok(self.http.get(self.endpoint(path)?).headers(self.auth_headers()?))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, LedgerError> {
        request.send().await.map_err(|e| InfraError::from(e).into())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LedgerError> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "ledger request rejected");
            return Err(LedgerError::from_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| LedgerError::from(InfraError::from(e)))?;
        serde_json::from_slice(&body).map_err(|e| InfraError::from(e).into())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    async fn read_balance(&self, identity: &Identity) -> Result<i64, LedgerError> {
        let request = self.get("user_credits")?.query(&[
            ("user_id", format!("eq.{}", identity.user_id)),
            ("select", "credits".to_string()),
        ]);

        let rows: Vec<BalanceRow> = self.fetch(request).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Malformed("no credit row for user".into()))?;

        debug!(credits = row.credits, "balance read");
        Ok(row.credits)
    }

    #[instrument(skip_all, fields(entry_type = %entry.entry_type, key = idempotency_key))]
    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome, LedgerError> {
        let mut request = self
            .http
            .post(self.endpoint("rpc/append_credit_entry")?)
            .headers(self.auth_headers()?)
            .json(entry);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }

        let response = self.send(request).await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            debug!("idempotency key already recorded");
            return Ok(AppendOutcome::Duplicate);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "ledger append rejected");
            return Err(LedgerError::from_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| LedgerError::from(InfraError::from(e)))?;
        let result: AppendResponse =
            serde_json::from_slice(&body).map_err(|e| LedgerError::from(InfraError::from(e)))?;

        let outcome = AppendOutcome::from_created(result.created);
        match outcome {
            AppendOutcome::Created => info!(change = entry.credits_change, "ledger entry created"),
            AppendOutcome::Duplicate => debug!("ledger entry already exists (idempotent)"),
        }
        Ok(outcome)
    }

    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    async fn read_exceptions(&self, identity: &Identity) -> Result<Vec<AccountException>, LedgerError> {
        let Some(email) = identity.email.as_deref() else {
            return Ok(Vec::new());
        };

        let request = self.get("account_exceptions")?.query(&[
            ("user_email", format!("eq.{email}")),
            ("is_active", "eq.true".to_string()),
        ]);
        let rows: Vec<AccountException> = self.fetch(request).await?;

        debug!(count = rows.len(), "exception rows read");
        Ok(rows)
    }

    #[instrument(skip_all, fields(user_id = %identity.user_id, limit))]
    async fn read_history(&self, identity: &Identity, limit: usize) -> Result<Vec<LedgerEntry>, LedgerError> {
        let request = self.get("credit_transactions")?.query(&[
            ("user_id", format!("eq.{}", identity.user_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let entries: Vec<LedgerEntry> = self.fetch(request).await?;

        debug!(count = entries.len(), "history read");
        Ok(entries)
    }
}
