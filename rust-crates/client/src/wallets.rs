//! The wallet extension as seen from the client.
//!
//! Signing happens inside the extension; the client only hands it a
//! descriptor and relays the resulting payload.

use crate::{
    address::AccountAddress,
    tx::TransactionDescriptor,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct WalletError(pub String);

impl WalletError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Body of the extension's `send_transaction` request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SendRequest {
    pub data: Value,
    pub from: AccountAddress,
    pub to: AccountAddress,
    pub chain_id: u64,
    pub value: u64,
}

pub trait WalletCapability: Send + Sync {
    fn connect(&self) -> impl Future<Output = Result<(), WalletError>> + Send;

    fn account(
        &self,
    ) -> impl Future<Output = Result<Option<AccountAddress>, WalletError>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64, WalletError>> + Send;

    fn create_raw_transaction_data(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;

    fn send_transaction(
        &self,
        request: SendRequest,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;
}

/// Stands in for the wallet type of a read-only session.
#[derive(Clone, Copy, Debug)]
pub enum NoWallet {}

impl WalletCapability for NoWallet {
    async fn connect(&self) -> Result<(), WalletError> {
        match *self {}
    }

    async fn account(&self) -> Result<Option<AccountAddress>, WalletError> {
        match *self {}
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        match *self {}
    }

    async fn create_raw_transaction_data(
        &self,
        _descriptor: &TransactionDescriptor,
    ) -> Result<Value, WalletError> {
        match *self {}
    }

    async fn send_transaction(&self, _request: SendRequest) -> Result<Value, WalletError> {
        match *self {}
    }
}

/// Accepts a bare hash string or an object with a non-empty `hash` string.
pub fn extract_hash(response: &Value) -> Option<String> {
    let hash = match response {
        Value::String(hash) => hash,
        Value::Object(fields) => fields.get("hash")?.as_str()?,
        _ => return None,
    };
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_hash__accepts_string_and_hash_object() {
        assert_eq!(extract_hash(&json!("0xabc")), Some("0xabc".to_string()));
        assert_eq!(
            extract_hash(&json!({ "hash": "0xdef", "status": "pending" })),
            Some("0xdef".to_string())
        );
    }

    #[test]
    fn extract_hash__rejects_empty_or_non_string() {
        assert_eq!(extract_hash(&json!("")), None);
        assert_eq!(extract_hash(&json!({ "hash": "" })), None);
        assert_eq!(extract_hash(&json!({ "hash": 12 })), None);
        assert_eq!(extract_hash(&json!(null)), None);
        assert_eq!(extract_hash(&json!(42)), None);
    }
}
