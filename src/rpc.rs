use std::time::Duration;

use ethers::providers::{Http, Provider, ProviderError, RpcError as _};
use serde_json::Value;
use thiserror::Error;

use crate::abi;

/// JSON-RPC code nodes use for `execution reverted`.
pub const EXECUTION_REVERTED: i64 = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The request never got a JSON-RPC answer.
    #[error("transport: {0}")]
    Transport(String),
    /// The server answered with an error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// The answer was not valid JSON-RPC.
    #[error("decode: {0}")]
    Decode(String),
}

impl RpcError {
    /// Reason of an `execution reverted` error response: the decoded
    /// `Error(string)` payload when one is attached, else the message text.
    pub fn revert_reason(&self) -> Option<String> {
        let RpcError::Rpc {
            code,
            message,
            data,
        } = self
        else {
            return None;
        };
        let decoded = data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok())
            .and_then(|b| abi::revert_reason(&b));
        if decoded.is_some() {
            return decoded;
        }
        if *code == EXECUTION_REVERTED || message.to_lowercase().contains("revert") {
            let reason = message
                .split_once("reverted:")
                .map(|(_, r)| r.trim())
                .filter(|r| !r.is_empty())
                .unwrap_or(message);
            return Some(reason.to_string());
        }
        None
    }
}

impl From<ProviderError> for RpcError {
    fn from(e: ProviderError) -> Self {
        if let Some(err) = e.as_error_response() {
            return RpcError::Rpc {
                code: err.code,
                message: err.message.clone(),
                data: err.data.clone(),
            };
        }
        if let Some(err) = e.as_serde_error() {
            return RpcError::Decode(err.to_string());
        }
        RpcError::Transport(e.to_string())
    }
}

/// JSON-RPC over HTTP POST. `timeout` of `None` waits as long as the
/// server does.
pub fn http_provider(url: &str, timeout: Option<Duration>) -> Result<Provider<Http>, RpcError> {
    let endpoint = reqwest::Url::parse(url)
        .map_err(|e| RpcError::Transport(format!("invalid rpc url {url}: {e}")))?;
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| RpcError::Transport(format!("failed to build http client: {e}")))?;
    log::debug!("json-rpc provider for {endpoint}");
    Ok(Provider::new(Http::new_with_client(endpoint, client)))
}
