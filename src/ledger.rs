//! Wire types for the pet contract and the ledger RPC surface, plus the
//! HTTP JSON-RPC client used against a real network.

use async_trait::async_trait;
use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFunction {
    Create,
    GetPet,
    GetCoins,
    Feed,
    Play,
    Work,
    Sleep,
    MintGlasses,
    RemovePet,
}

impl ContractFunction {
    pub fn name(self) -> &'static str {
        match self {
            ContractFunction::Create => "create",
            ContractFunction::GetPet => "get_pet",
            ContractFunction::GetCoins => "get_coins",
            ContractFunction::Feed => "feed",
            ContractFunction::Play => "play",
            ContractFunction::Work => "work",
            ContractFunction::Sleep => "sleep",
            ContractFunction::MintGlasses => "mint_glasses",
            ContractFunction::RemovePet => "remove_pet",
        }
    }
}

impl fmt::Display for ContractFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single invocation of the pet contract on behalf of `owner`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract_id: String,
    pub function: ContractFunction,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ContractCall {
    pub fn new(
        contract_id: impl Into<String>,
        function: ContractFunction,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            function,
            owner: owner.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Pet record as stored by the contract.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub name: String,
    pub birthdate: u64,
    pub last_updated: u64,
    pub is_alive: bool,
    pub hunger: u32,
    pub happiness: u32,
    pub energy: u32,
    pub has_glasses: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub source: String,
    pub sequence: u64,
    pub call: ContractCall,
}

impl UnsignedTransaction {
    pub fn envelope(&self) -> Result<String, LedgerError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| LedgerError::Encode(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }

    /// Bytes a wallet signs: network id (sha256 of the passphrase) followed by
    /// the envelope.
    pub fn signature_payload(&self, network_passphrase: &str) -> Result<Vec<u8>, LedgerError> {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let mut payload = network_id.to_vec();
        payload.extend_from_slice(self.envelope()?.as_bytes());
        Ok(payload)
    }

    pub fn from_envelope(envelope: &str) -> Result<Self, LedgerError> {
        let bytes = BASE64
            .decode(envelope)
            .map_err(|e| LedgerError::Decode(format!("envelope is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Decode(format!("envelope is not a transaction: {e}")))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub envelope: String,
    pub signature: String,
    pub public_key: String,
}

impl SignedTransaction {
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.envelope.as_bytes());
        hasher.update(self.signature.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Error,
    Pending,
    Duplicate,
    TryAgainLater,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: SendStatus,
    pub hash: String,
    #[serde(default)]
    pub error_result: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GetStatus {
    Success,
    Failed,
    NotFound,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: GetStatus,
    #[serde(default)]
    pub result_meta: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Transport(String),
    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("contract call failed: {0}")]
    Contract(String),
    #[error("failed to decode ledger response: {0}")]
    Decode(String),
    #[error("failed to encode transaction: {0}")]
    Encode(String),
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Next sequence number to use for transactions from `address`.
    async fn account_sequence(&self, address: &str) -> Result<u64, LedgerError>;

    /// Runs `call` without committing it and returns the contract's result.
    async fn simulate(&self, call: &ContractCall) -> Result<Value, LedgerError>;

    async fn send_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<SendTransactionResponse, LedgerError>;

    async fn get_transaction(&self, hash: &str)
    -> Result<GetTransactionResponse, LedgerError>;
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct AccountResult {
    sequence: u64,
}

#[derive(Deserialize)]
struct SimulateResult {
    result: Option<Value>,
    error: Option<String>,
}

pub struct RpcLedger {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(LedgerError::Transport(format!(
                "{method} returned HTTP {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }
        decode_rpc_response(method, &bytes)
    }
}

fn decode_rpc_response<R: DeserializeOwned>(
    method: &str,
    bytes: &[u8],
) -> Result<R, LedgerError> {
    let response: RpcResponse<R> = serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?;
    match (response.result, response.error) {
        (_, Some(err)) => Err(LedgerError::Rpc {
            code: err.code,
            message: err.message,
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Err(LedgerError::Decode(format!(
            "{method}: response carried neither result nor error"
        ))),
    }
}

#[async_trait]
impl LedgerRpc for RpcLedger {
    async fn account_sequence(&self, address: &str) -> Result<u64, LedgerError> {
        let account: AccountResult =
            self.call("getAccount", json!({ "address": address })).await?;
        Ok(account.sequence + 1)
    }

    async fn simulate(&self, call: &ContractCall) -> Result<Value, LedgerError> {
        let sim: SimulateResult = self
            .call("simulateTransaction", json!({ "call": call }))
            .await?;
        match (sim.error, sim.result) {
            (Some(err), _) => Err(LedgerError::Contract(err)),
            (None, Some(value)) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }

    async fn send_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<SendTransactionResponse, LedgerError> {
        self.call(
            "sendTransaction",
            json!({
                "transaction": tx.envelope,
                "signature": tx.signature,
                "publicKey": tx.public_key,
            }),
        )
        .await
    }

    async fn get_transaction(
        &self,
        hash: &str,
    ) -> Result<GetTransactionResponse, LedgerError> {
        self.call("getTransaction", json!({ "hash": hash })).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn sample_tx() -> UnsignedTransaction {
        UnsignedTransaction {
            source: "0xabc".to_string(),
            sequence: 7,
            call: ContractCall::new("pets", ContractFunction::Create, "0xabc")
                .with_name("Rex"),
        }
    }

    #[test]
    fn envelope__decodes_back_to_the_same_transaction() {
        let tx = sample_tx();
        let envelope = tx.envelope().unwrap();
        assert_eq!(tx, UnsignedTransaction::from_envelope(&envelope).unwrap());
    }

    #[test]
    fn signature_payload__depends_on_network_passphrase() {
        let tx = sample_tx();
        let testnet = tx.signature_payload("Test SDF Network ; September 2015").unwrap();
        let other = tx.signature_payload("Standalone Network").unwrap();
        assert_ne!(testnet, other);
    }

    #[test]
    fn decode_rpc_response__maps_error_object_to_rpc_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad"}}"#;
        let err = decode_rpc_response::<Value>("getTransaction", body).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Rpc {
                code: -32600,
                message: "bad".to_string()
            }
        );
    }

    #[test]
    fn decode_rpc_response__unknown_status_is_a_decode_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"status":"WHAT"}}"#;
        let err =
            decode_rpc_response::<GetTransactionResponse>("getTransaction", body).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[test]
    fn decode_rpc_response__reads_send_status() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"status":"PENDING","hash":"ab"}}"#;
        let res =
            decode_rpc_response::<SendTransactionResponse>("sendTransaction", body).unwrap();
        assert_eq!(res.status, SendStatus::Pending);
        assert_eq!(res.hash, "ab");
        assert_eq!(res.error_result, None);
    }
}
