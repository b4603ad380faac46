//! Remote credits ledger adapters

pub mod http_client;

pub use http_client::HttpLedgerClient;
