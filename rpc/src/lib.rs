//! JSON-RPC plumbing for substrate-based nodes.
//!
//! The [`Transport`] trait is the only thing a node connection has to
//! implement; [`Rpc`] puts a typed surface on top of it for the methods the
//! client consumes. All SCALE payloads travel as `0x`-prefixed hex strings.

use async_trait::async_trait;
use futures::Stream;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sp_core::H256;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to (de-)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport does not support subscriptions")]
    SubscriptionsUnsupported,
    #[error("subscription was closed by the node")]
    SubscriptionClosed,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid hex in response: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl TransportError {
    /// Whether the node rejected the request because it does not know the
    /// method (JSON-RPC code -32601).
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, TransportError::Rpc { code: -32601, .. })
    }
}

/// A connection to a node.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue>;
    /// Opens a subscription. Dropping the returned [`Subscription`] makes the
    /// transport call `unsubscribe_method`.
    async fn subscribe(
        &self,
        method: &str,
        params: Vec<JsonValue>,
        unsubscribe_method: &str,
    ) -> Result<Subscription>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue> {
        (**self).request(method, params).await
    }
    async fn subscribe(
        &self,
        method: &str,
        params: Vec<JsonValue>,
        unsubscribe_method: &str,
    ) -> Result<Subscription> {
        (**self).subscribe(method, params, unsubscribe_method).await
    }
}

/// Stream of notifications of a single subscription.
///
/// The unsubscribe signal is sent exactly once, when the subscription is
/// dropped. Transports listen on the other end and perform the unsubscribe
/// round-trip.
#[derive(Debug)]
pub struct Subscription {
    notifications: mpsc::UnboundedReceiver<Result<JsonValue>>,
    unsubscribe: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(
        notifications: mpsc::UnboundedReceiver<Result<JsonValue>>,
        unsubscribe: oneshot::Sender<()>,
    ) -> Self {
        Subscription {
            notifications,
            unsubscribe: Some(unsubscribe),
        }
    }
    /// Waits for the next notification. `None` once the node closed the
    /// subscription.
    pub async fn next(&mut self) -> Option<Result<JsonValue>> {
        self.notifications.recv().await
    }
    /// Releases a subscription the node already ended, without unsubscribing.
    pub fn finish(mut self) {
        self.unsubscribe.take();
    }
}

impl Stream for Subscription {
    type Item = Result<JsonValue>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.notifications.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            // The transport might be gone already, nothing to do then.
            let _ = unsubscribe.send(());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest<'a, T> {
    pub id: u64,
    pub jsonrpc: &'a str,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T> RpcRequest<'a, T> {
    pub fn new(id: u64, method: &'a str, params: T) -> Self {
        RpcRequest {
            id,
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    pub id: u64,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<JsonValue> {
        match self.error {
            Some(err) => Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    BlockHash,
    Header,
    Block,
    RuntimeVersion,
    Metadata,
    StateCall,
    Storage,
    AccountNextIndex,
    SubmitExtrinsic,
    SubmitAndWatchExtrinsic,
    UnwatchExtrinsic,
    DryRun,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::BlockHash => "chain_getBlockHash",
            RpcMethod::Header => "chain_getHeader",
            RpcMethod::Block => "chain_getBlock",
            RpcMethod::RuntimeVersion => "state_getRuntimeVersion",
            RpcMethod::Metadata => "state_getMetadata",
            RpcMethod::StateCall => "state_call",
            RpcMethod::Storage => "state_getStorage",
            RpcMethod::AccountNextIndex => "system_accountNextIndex",
            RpcMethod::SubmitExtrinsic => "author_submitExtrinsic",
            RpcMethod::SubmitAndWatchExtrinsic => "author_submitAndWatchExtrinsic",
            RpcMethod::UnwatchExtrinsic => "author_unwatchExtrinsic",
            RpcMethod::DryRun => "system_dryRun",
        }
    }
}

/// Plain HTTP transport. Every request is a separate POST, so subscriptions
/// are not available.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new<U: Into<String>>(url: U) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let resp = self
            .client
            .post(&self.url)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await?
            .json::<RpcResponse>()
            .await?;

        if resp.id != id {
            return Err(TransportError::InvalidResponse(format!(
                "expected response to request {}, got {}",
                id, resp.id
            )));
        }

        resp.into_result()
    }
    async fn subscribe(
        &self,
        _method: &str,
        _params: Vec<JsonValue>,
        _unsubscribe_method: &str,
    ) -> Result<Subscription> {
        Err(TransportError::SubscriptionsUnsupported)
    }
}

/// Response when calling `chain_getHeader`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub digest: JsonValue,
    #[serde(rename = "extrinsicsRoot")]
    pub extrinsics_root: H256,
    pub number: String,
    #[serde(rename = "parentHash")]
    pub parent_hash: H256,
    #[serde(rename = "stateRoot")]
    pub state_root: H256,
}

impl Header {
    /// The block number, which the node reports as a hex string.
    pub fn number(&self) -> Result<u32> {
        let number = self.number.strip_prefix("0x").unwrap_or(&self.number);
        u32::from_str_radix(number, 16).map_err(|err| {
            TransportError::InvalidResponse(format!("invalid block number {}: {}", self.number, err))
        })
    }
}

/// Response when calling `chain_getBlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    #[serde(default)]
    pub justifications: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    /// Hex encoded extrinsics.
    pub extrinsics: Vec<String>,
}

impl Block {
    pub fn extrinsics(&self) -> Result<Vec<Vec<u8>>> {
        self.extrinsics.iter().map(|ext| from_hex(ext)).collect()
    }
}

/// Response when calling `state_getRuntimeVersion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    #[serde(default)]
    pub apis: Vec<(String, u32)>,
    #[serde(rename = "authoringVersion")]
    pub authoring_version: u32,
    #[serde(rename = "implName")]
    pub impl_name: String,
    #[serde(rename = "implVersion")]
    pub impl_version: u32,
    #[serde(rename = "specName")]
    pub spec_name: String,
    #[serde(rename = "specVersion")]
    pub spec_version: u32,
    #[serde(rename = "transactionVersion", default)]
    pub transaction_version: u32,
}

pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex(hex: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(hex.strip_prefix("0x").unwrap_or(hex))?)
}

fn at(hash: Option<H256>) -> JsonValue {
    match hash {
        Some(hash) => json!(hash),
        None => JsonValue::Null,
    }
}

/// Typed access to the node methods used by the client.
#[derive(Debug, Clone)]
pub struct Rpc<T> {
    transport: T,
}

impl<T: Transport> Rpc<T> {
    pub fn new(transport: T) -> Self {
        Rpc { transport }
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
    /// Convenience function for executing a RPC call.
    async fn call<R: DeserializeOwned>(&self, method: RpcMethod, params: Vec<JsonValue>) -> Result<R> {
        log::debug!("RPC request {}: {:?}", method.as_str(), params);

        let result = self.transport.request(method.as_str(), params).await?;
        log::trace!("RPC response {}: {}", method.as_str(), result);

        Ok(serde_json::from_value(result)?)
    }
    async fn call_hex(&self, method: RpcMethod, params: Vec<JsonValue>) -> Result<Vec<u8>> {
        let hex: String = self.call(method, params).await?;
        from_hex(&hex)
    }
    /// Hash of the block at `number`, or of the best block if `None`.
    pub async fn block_hash(&self, number: Option<u32>) -> Result<Option<H256>> {
        let params = match number {
            Some(number) => vec![json!(number)],
            None => vec![],
        };

        self.call(RpcMethod::BlockHash, params).await
    }
    pub async fn header(&self, hash: Option<H256>) -> Result<Option<Header>> {
        self.call(RpcMethod::Header, vec![at(hash)]).await
    }
    pub async fn block(&self, hash: Option<H256>) -> Result<Option<SignedBlock>> {
        self.call(RpcMethod::Block, vec![at(hash)]).await
    }
    pub async fn runtime_version(&self, hash: Option<H256>) -> Result<RuntimeVersion> {
        self.call(RpcMethod::RuntimeVersion, vec![at(hash)]).await
    }
    /// Raw metadata, including the `meta` magic number.
    pub async fn metadata(&self, hash: Option<H256>) -> Result<Vec<u8>> {
        self.call_hex(RpcMethod::Metadata, vec![at(hash)]).await
    }
    /// Calls the runtime API `function` with SCALE encoded `data`.
    pub async fn state_call(&self, function: &str, data: &[u8], hash: Option<H256>) -> Result<Vec<u8>> {
        self.call_hex(
            RpcMethod::StateCall,
            vec![json!(function), json!(to_hex(data)), at(hash)],
        )
        .await
    }
    pub async fn storage(&self, key: &[u8], hash: Option<H256>) -> Result<Option<Vec<u8>>> {
        let value: Option<String> = self
            .call(RpcMethod::Storage, vec![json!(to_hex(key)), at(hash)])
            .await?;

        value.map(|hex| from_hex(&hex)).transpose()
    }
    /// Next nonce of the SS58 encoded `account`, including pool transactions.
    pub async fn account_next_index(&self, account: &str) -> Result<u64> {
        self.call(RpcMethod::AccountNextIndex, vec![json!(account)])
            .await
    }
    pub async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<H256> {
        self.call(RpcMethod::SubmitExtrinsic, vec![json!(to_hex(extrinsic))])
            .await
    }
    pub async fn submit_and_watch_extrinsic(&self, extrinsic: &[u8]) -> Result<Subscription> {
        log::debug!("RPC subscribe {}", RpcMethod::SubmitAndWatchExtrinsic.as_str());

        self.transport
            .subscribe(
                RpcMethod::SubmitAndWatchExtrinsic.as_str(),
                vec![json!(to_hex(extrinsic))],
                RpcMethod::UnwatchExtrinsic.as_str(),
            )
            .await
    }
    /// SCALE encoded `ApplyExtrinsicResult` of the extrinsic applied on top
    /// of `hash`.
    pub async fn dry_run(&self, extrinsic: &[u8], hash: Option<H256>) -> Result<Vec<u8>> {
        self.call_hex(RpcMethod::DryRun, vec![json!(to_hex(extrinsic)), at(hash)])
            .await
    }
}
