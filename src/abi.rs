//! Bindings for the club voting contract, and the wallet payloads built
//! from them.

use ethers::{
    abi::{AbiDecode, AbiEncode},
    contract::{abigen, EthError},
    types::{Address, Bytes, U256},
    utils::to_checksum,
};
use serde::Serialize;

use crate::errors::VoteError;

abigen!(
    ClubVoting,
    r#"[
        function vote(uint256 clubId) external
        function getClubVotes(uint256 clubId) external view returns (uint256)
        function hasVoted(address voter) external view returns (bool)
        function clubs(uint256 index) external view returns (string name, uint256 votes)
    ]"#
);

pub fn vote_calldata(option_id: u32) -> Bytes {
    VoteCall {
        club_id: U256::from(option_id),
    }
    .encode()
    .into()
}

pub fn decode_call(data: &[u8]) -> Result<ClubVotingCalls, VoteError> {
    ClubVotingCalls::decode(data).map_err(|e| VoteError::InvalidResponse(format!("calldata: {e}")))
}

/// Option id carried in a `uint256` argument, if it is one we can address.
pub fn option_id(value: U256) -> Option<u32> {
    (value.bits() <= 32).then(|| value.low_u32())
}

pub fn count(value: U256) -> Result<u64, VoteError> {
    if value.bits() > 64 {
        return Err(VoteError::InvalidResponse(format!("vote count {value} does not fit in u64")));
    }
    Ok(value.low_u64())
}

/// Reason string of a standard `Error(string)` revert payload.
pub fn revert_reason(data: &[u8]) -> Option<String> {
    <String as EthError>::decode_with_selector(data)
}

/// Parameters of `eth_sendTransaction` for a vote. The gas ceiling goes out
/// under both `gasLimit` and the standard `gas` key.
#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteTransaction {
    pub from: String,
    pub to: String,
    pub data: String,
    pub gas_limit: String,
    pub gas: String,
    pub chain_id: String,
}

impl VoteTransaction {
    pub fn new(from: &Address, to: &Address, option_id: u32, gas_limit: u64, chain_id: u64) -> Self {
        let gas = format!("{gas_limit:#x}");
        VoteTransaction {
            from: to_checksum(from, None),
            to: to_checksum(to, None),
            data: format!("0x{}", hex::encode(vote_calldata(option_id))),
            gas_limit: gas.clone(),
            gas,
            chain_id: format!("{chain_id:#x}"),
        }
    }
}

/// What gets handed to the wallet for one vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VotePayload {
    Transaction(VoteTransaction),
    /// `eth_sign` over the UTF-8 text, for deployments without a contract.
    Message { from: String, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::id;

    #[test]
    fn vote_calldata_layout() {
        let data = vote_calldata(1);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &id("vote(uint256)"));
        assert_eq!(data[35], 1);
        assert!(matches!(
            decode_call(&data).unwrap(),
            ClubVotingCalls::Vote(VoteCall { club_id }) if club_id == U256::from(1)
        ));
    }

    #[test]
    fn read_selectors_match_signatures() {
        let has_voted = HasVotedCall { voter: Address::zero() }.encode();
        assert_eq!(&has_voted[..4], &id("hasVoted(address)"));
        let clubs = ClubsCall { index: U256::zero() }.encode();
        assert_eq!(&clubs[..4], &id("clubs(uint256)"));
        let votes = GetClubVotesCall { club_id: U256::zero() }.encode();
        assert_eq!(&votes[..4], &id("getClubVotes(uint256)"));
    }

    #[test]
    fn decode_call_rejects_garbage() {
        assert!(decode_call(&[0u8; 3]).is_err());
        let mut data = vote_calldata(0).to_vec();
        data[0] ^= 0xff;
        assert!(decode_call(&data).is_err());
    }

    #[test]
    fn argument_ranges() {
        assert_eq!(option_id(U256::from(2)), Some(2));
        assert_eq!(option_id(U256::from(u64::from(u32::MAX) + 1)), None);
        assert_eq!(count(U256::from(5)).unwrap(), 5);
        assert!(matches!(count(U256::MAX), Err(VoteError::InvalidResponse(_))));
    }

    #[test]
    fn error_string_reverts() {
        let mut payload = id("Error(string)").to_vec();
        payload.extend(AbiEncode::encode("Already voted.".to_string()));
        assert_eq!(revert_reason(&payload).as_deref(), Some("Already voted."));
        assert_eq!(revert_reason(&[0xde, 0xad, 0xbe, 0xef]), None);
    }

    #[test]
    fn vote_transaction_fields() {
        let from: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
        let to: Address = "0x00000000000000000000000000000000000000c0".parse().unwrap();
        let tx = VoteTransaction::new(&from, &to, 2, 300_000, 137);
        assert_eq!(tx.gas_limit, "0x493e0");
        assert_eq!(tx.chain_id, "0x89");
        let data = hex::decode(tx.data.trim_start_matches("0x")).unwrap();
        assert!(matches!(
            decode_call(&data).unwrap(),
            ClubVotingCalls::Vote(VoteCall { club_id }) if club_id == U256::from(2)
        ));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["gasLimit"], "0x493e0");
        assert_eq!(json["gas"], "0x493e0");
        assert_eq!(json["chainId"], "0x89");
        assert_eq!(
            json["to"].as_str().unwrap().to_lowercase(),
            "0x00000000000000000000000000000000000000c0"
        );
    }
}
