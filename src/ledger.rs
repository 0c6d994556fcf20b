use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    contract::ContractError,
    providers::{Http, Provider, ProviderError},
    types::{Address, U256},
};

use crate::{
    abi::{self, ClubVoting},
    errors::VoteError,
    rpc::{http_provider, RpcError},
};

/// Read side of the voting contract. Writes go through the wallet.
///
/// A read the contract itself refuses fails with `LedgerRejected`; a node or
/// network problem fails with `NetworkFailure`.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_club_votes(&self, option_id: u32) -> Result<u64, VoteError>;

    async fn has_voted(&self, voter: &Address) -> Result<bool, VoteError>;

    /// Name and count of the option at `option_id`, as fixed when the
    /// contract was deployed.
    async fn club(&self, option_id: u32) -> Result<(String, u64), VoteError>;
}

type NodeClient = Provider<Http>;

/// Reads the contract with `eth_call` through the generated binding.
#[derive(Debug)]
pub struct RpcLedger {
    contract: ClubVoting<NodeClient>,
}

impl RpcLedger {
    pub fn new(rpc_endpoint: &str, contract: Address, timeout: Duration) -> Result<Self, VoteError> {
        let provider = http_provider(rpc_endpoint, Some(timeout))
            .map_err(|e| VoteError::NetworkFailure(e.to_string()))?;
        Ok(RpcLedger {
            contract: ClubVoting::new(contract, Arc::new(provider)),
        })
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_club_votes(&self, option_id: u32) -> Result<u64, VoteError> {
        let votes = self
            .contract
            .get_club_votes(U256::from(option_id))
            .call()
            .await
            .map_err(read_error)?;
        abi::count(votes)
    }

    async fn has_voted(&self, voter: &Address) -> Result<bool, VoteError> {
        self.contract
            .has_voted(*voter)
            .call()
            .await
            .map_err(read_error)
    }

    async fn club(&self, option_id: u32) -> Result<(String, u64), VoteError> {
        let (name, votes) = self
            .contract
            .clubs(U256::from(option_id))
            .call()
            .await
            .map_err(read_error)?;
        Ok((name, abi::count(votes)?))
    }
}

fn read_error(e: ContractError<NodeClient>) -> VoteError {
    if let Some(reason) = e.decode_revert::<String>() {
        return VoteError::LedgerRejected(reason);
    }
    if e.is_revert() {
        return VoteError::LedgerRejected("execution reverted".into());
    }
    match e {
        ContractError::MiddlewareError { e } => node_error(e),
        ContractError::ProviderError { e } => node_error(e),
        other => VoteError::InvalidResponse(other.to_string()),
    }
}

/// Some nodes report a revert only in the error message, with no payload.
fn node_error(e: ProviderError) -> VoteError {
    let e = RpcError::from(e);
    match e.revert_reason() {
        Some(reason) => VoteError::LedgerRejected(reason),
        None => VoteError::NetworkFailure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::{
        abi::AbiEncode,
        providers::{HttpClientError, JsonRpcError},
        utils::id,
    };

    fn node_reply(code: i64, message: &str) -> ProviderError {
        ProviderError::JsonRpcClientError(Box::new(HttpClientError::JsonRpcError(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        })))
    }

    #[tokio::test]
    async fn unreachable_node_is_network_failure() {
        let ledger =
            RpcLedger::new("http://127.0.0.1:1", Address::zero(), Duration::from_millis(500)).unwrap();
        let e = ledger.get_club_votes(0).await.unwrap_err();
        assert!(matches!(e, VoteError::NetworkFailure(_)), "{e:?}");
    }

    #[test]
    fn revert_payload_is_ledger_rejection() {
        let mut payload = id("Error(string)").to_vec();
        payload.extend(AbiEncode::encode("Invalid club ID.".to_string()));
        let e = read_error(ContractError::Revert(payload.into()));
        assert!(matches!(e, VoteError::LedgerRejected(ref r) if r == "Invalid club ID."), "{e:?}");

        // Array bounds panic: a revert, but not an Error(string).
        let mut panic = id("Panic(uint256)").to_vec();
        panic.extend(AbiEncode::encode(U256::from(0x32)));
        assert!(matches!(
            read_error(ContractError::Revert(panic.into())),
            VoteError::LedgerRejected(_)
        ));
    }

    #[test]
    fn node_errors() {
        let e = read_error(ContractError::MiddlewareError {
            e: node_reply(3, "execution reverted: Invalid club ID."),
        });
        assert!(matches!(e, VoteError::LedgerRejected(ref r) if r == "Invalid club ID."), "{e:?}");
        let e = read_error(ContractError::MiddlewareError {
            e: node_reply(-32000, "header not found"),
        });
        assert!(matches!(e, VoteError::NetworkFailure(_)), "{e:?}");
    }
}
