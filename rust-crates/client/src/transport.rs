use crate::{
    address::AccountAddress,
    error::{
        ClientError,
        NormalizationError,
        Result,
    },
    tx::{
        EntryFunction,
        Expiry,
        TransactionDescriptor,
    },
    wallets::{
        NoWallet,
        SendRequest,
        WalletCapability,
        extract_hash,
    },
};
use serde::Serialize;
use serde_json::Value;
use std::{
    fmt,
    future::Future,
    sync::Arc,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Body of a `POST /rpc/v1/view` call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl ViewRequest {
    pub fn new(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read and write access to the ledger node.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Address the game modules are published under.
    fn module_address(&self) -> AccountAddress;

    /// One view call. The raw JSON comes back uninterpreted.
    fn read(&self, request: ViewRequest) -> impl Future<Output = Result<Value>> + Send;

    /// Sign and relay `call` through the wallet.
    fn submit(
        &self,
        call: EntryFunction,
        expiry: Expiry,
    ) -> impl Future<Output = Result<TxHash>> + Send;
}

/// HTTP transport against a ledger node, with an optional wallet for writes.
pub struct LedgerTransport<W = NoWallet> {
    node_url: String,
    http: reqwest::Client,
    module_address: AccountAddress,
    wallet: Option<Arc<W>>,
}

impl<W> Clone for LedgerTransport<W> {
    fn clone(&self) -> Self {
        Self {
            node_url: self.node_url.clone(),
            http: self.http.clone(),
            module_address: self.module_address,
            wallet: self.wallet.clone(),
        }
    }
}

impl LedgerTransport<NoWallet> {
    pub fn read_only(
        node_url: impl Into<String>,
        module_address: AccountAddress,
    ) -> Result<Self> {
        Self::new(node_url, module_address, None)
    }
}

impl<W: WalletCapability> LedgerTransport<W> {
    pub fn new(
        node_url: impl Into<String>,
        module_address: AccountAddress,
        wallet: Option<W>,
    ) -> Result<Self> {
        let node_url = node_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().build().map_err(|e| {
            ClientError::NetworkFailure(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            node_url,
            http,
            module_address,
            wallet: wallet.map(Arc::new),
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }
}

impl<W: WalletCapability + 'static> Transport for LedgerTransport<W> {
    fn module_address(&self) -> AccountAddress {
        self.module_address
    }

    async fn read(&self, request: ViewRequest) -> Result<Value> {
        let url = format!("{}/rpc/v1/view", self.node_url);
        debug!(function = %request.function, "view call");
        let res = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::NetworkFailure(format!("view request failed: {e}")))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            ClientError::NetworkFailure(format!("failed to read view response body: {e}"))
        })?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(ClientError::NetworkFailure(format!(
                "node responded with {status} for {}: {body}",
                request.function
            )));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| NormalizationError::InvalidJson(e.to_string()).into())
    }

    async fn submit(&self, call: EntryFunction, expiry: Expiry) -> Result<TxHash> {
        submit_with_wallet(self.wallet.as_deref(), &call, expiry).await
    }
}

/// The write path shared by every transport: resolve the account, build the
/// descriptor, let the wallet sign and send it.
pub async fn submit_with_wallet<W: WalletCapability>(
    wallet: Option<&W>,
    call: &EntryFunction,
    expiry: Expiry,
) -> Result<TxHash> {
    let wallet = wallet.ok_or(ClientError::WalletUnavailable)?;
    let sender = resolve_account(wallet)
        .await
        .ok_or(ClientError::NoAccountConnected)?;

    let descriptor = TransactionDescriptor::build(sender, call, expiry);
    let data = wallet
        .create_raw_transaction_data(&descriptor)
        .await
        .map_err(|e| ClientError::rejected(format!("payload creation failed: {e}")))?;
    let chain_id = wallet
        .chain_id()
        .await
        .map_err(|e| ClientError::rejected(format!("chain id unavailable: {e}")))?;
    let response = wallet
        .send_transaction(SendRequest {
            data,
            from: sender,
            to: call.module_address,
            chain_id,
            value: 0,
        })
        .await
        .map_err(|e| ClientError::rejected(e.to_string()))?;

    let hash = extract_hash(&response).ok_or_else(|| {
        ClientError::rejected(format!("wallet returned no transaction hash: {response}"))
    })?;
    info!(
        function = %call.function_id(),
        sender = %sender.short(),
        %hash,
        "transaction submitted"
    );
    Ok(TxHash(hash))
}

async fn resolve_account<W: WalletCapability>(wallet: &W) -> Option<AccountAddress> {
    match wallet.account().await {
        Ok(Some(account)) => return Some(account),
        Ok(None) => {}
        Err(e) => warn!("wallet account lookup failed: {e}"),
    }
    if let Err(e) = wallet.connect().await {
        warn!("wallet connect failed: {e}");
        return None;
    }
    wallet.account().await.ok().flatten()
}
