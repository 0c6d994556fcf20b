use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use serde_json::{json, Value};

pub use crate::rpc::EXECUTION_REVERTED;
use crate::{
    abi::VoteTransaction,
    errors::VoteError,
    rpc::{http_provider, RpcError},
};

/// EIP-1193 provider error codes.
pub const USER_REJECTED: i64 = 4001;
pub const UNAUTHORIZED: i64 = 4100;
pub const UNSUPPORTED_METHOD: i64 = 4200;
pub const DISCONNECTED: i64 = 4900;
pub const CHAIN_DISCONNECTED: i64 = 4901;

/// The signer. Requests are keyed by method name, the way an injected
/// browser provider works. Private keys never pass through this crate.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// A wallet reachable over HTTP JSON-RPC (a signer daemon, a bridge to a
/// browser wallet, or a dev node with unlocked accounts).
#[derive(Debug)]
pub struct HttpWallet {
    provider: Provider<Http>,
}

impl HttpWallet {
    /// No client-side timeout: a wallet prompt may stay open for as long as
    /// the user takes.
    pub fn new(url: &str) -> Result<Self, VoteError> {
        let provider = http_provider(url, None).map_err(classify)?;
        Ok(HttpWallet { provider })
    }
}

#[async_trait]
impl WalletProvider for HttpWallet {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        Ok(self.provider.request(method, params).await?)
    }
}

pub async fn request_accounts(wallet: &dyn WalletProvider) -> Result<Vec<String>, VoteError> {
    let v = wallet
        .request("eth_requestAccounts", vec![])
        .await
        .map_err(classify_access)?;
    parse_accounts(v)
}

pub async fn accounts(wallet: &dyn WalletProvider) -> Result<Vec<String>, VoteError> {
    let v = wallet
        .request("eth_accounts", vec![])
        .await
        .map_err(classify_access)?;
    parse_accounts(v)
}

/// Returns the transaction hash.
pub async fn send_transaction(
    wallet: &dyn WalletProvider,
    tx: &VoteTransaction,
) -> Result<String, VoteError> {
    let params = serde_json::to_value(tx).map_err(|e| VoteError::InvalidJson(e.to_string()))?;
    let v = wallet
        .request("eth_sendTransaction", vec![params])
        .await
        .map_err(classify)?;
    as_string(v, "transaction hash")
}

/// Returns the signature.
pub async fn sign(wallet: &dyn WalletProvider, from: &str, text: &str) -> Result<String, VoteError> {
    let v = wallet
        .request("eth_sign", vec![json!(from), json!(format!("0x{}", hex::encode(text)))])
        .await
        .map_err(classify)?;
    as_string(v, "signature")
}

/// Maps a wallet failure during submission onto the vote error taxonomy.
pub fn classify(err: RpcError) -> VoteError {
    let revert = err.revert_reason();
    match err {
        RpcError::Transport(e) => VoteError::ProviderUnavailable(e),
        RpcError::Decode(e) => VoteError::InvalidResponse(e),
        RpcError::Rpc { code, message, .. } => match code {
            USER_REJECTED => VoteError::ProviderRejected(message),
            UNAUTHORIZED | UNSUPPORTED_METHOD | DISCONNECTED | CHAIN_DISCONNECTED => {
                VoteError::ProviderUnavailable(message)
            }
            _ => match revert {
                Some(reason) if reason.to_lowercase().contains("already voted") => {
                    VoteError::AlreadyVoted(reason)
                }
                Some(reason) => VoteError::LedgerRejected(reason),
                None => VoteError::ProviderRejected(message),
            },
        },
    }
}

/// Account access has no ledger in the loop, so every refusal means the
/// wallet is not usable for this session.
fn classify_access(err: RpcError) -> VoteError {
    match err {
        RpcError::Decode(e) => VoteError::InvalidResponse(e),
        RpcError::Rpc { message, .. } => VoteError::ProviderUnavailable(message),
        RpcError::Transport(e) => VoteError::ProviderUnavailable(e),
    }
}

fn parse_accounts(v: Value) -> Result<Vec<String>, VoteError> {
    serde_json::from_value::<Vec<String>>(v)
        .map_err(|e| VoteError::InvalidResponse(format!("account list: {e}")))
}

fn as_string(v: Value, what: &str) -> Result<String, VoteError> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(VoteError::InvalidResponse(format!("{what}: expected a string, got {other}"))),
    }
}
