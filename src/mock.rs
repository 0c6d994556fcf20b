//! Deterministic in-memory wallet and contract for tests and offline runs.
//!
//! `MockWallet` executes `vote` transactions against a `MockLedger` the way
//! the deployed contract does, including its duplicate-vote revert.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::{types::Address, utils::keccak256};
use serde_json::{json, Value};
use tokio::sync::Barrier;

use crate::{
    abi::{self, decode_call, ClubVotingCalls, VoteCall},
    errors::VoteError,
    ledger::Ledger,
    rpc::RpcError,
    wallet::{WalletProvider, EXECUTION_REVERTED, UNAUTHORIZED, UNSUPPORTED_METHOD, USER_REJECTED},
};

pub const MOCK_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Debug)]
pub struct MockLedger {
    contract: Address,
    names: Vec<String>,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    votes: Vec<u64>,
    voted: HashSet<Address>,
    reads: usize,
    offline: bool,
    reads_left: Option<usize>,
    nonce: u64,
}

impl MockLedger {
    pub fn new<S: AsRef<str>>(names: &[S], votes: &[u64]) -> Self {
        let mut counts = votes.to_vec();
        counts.resize(names.len(), 0);
        MockLedger {
            contract: MOCK_CONTRACT.parse().unwrap_or_default(),
            names: names.iter().map(|s| s.as_ref().to_string()).collect(),
            state: Mutex::new(LedgerState {
                votes: counts,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().expect("mutex poisoned")
    }

    pub fn address(&self) -> Address {
        self.contract
    }

    pub fn votes(&self) -> Vec<u64> {
        self.state().votes.clone()
    }

    pub fn set_votes(&self, option_id: u32, count: u64) {
        if let Some(c) = self.state().votes.get_mut(option_id as usize) {
            *c = count;
        }
    }

    /// Records a vote cast outside this session. Ignores unparseable input.
    pub fn mark_voted(&self, voter: &str) {
        if let Ok(a) = voter.parse::<Address>() {
            self.state().voted.insert(a);
        }
    }

    pub fn has_voted_now(&self, voter: &Address) -> bool {
        self.state().voted.contains(voter)
    }

    pub fn fail_reads(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Lets `n` more reads through, then fails every read after.
    pub fn fail_reads_after(&self, n: usize) {
        self.state().reads_left = Some(n);
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.state().reads
    }

    /// Runs a state-changing call. Returns the transaction hash, or the
    /// revert reason.
    pub fn execute(&self, from: &Address, data: &[u8]) -> Result<String, String> {
        let call = decode_call(data).map_err(|e| e.to_string())?;
        let ClubVotingCalls::Vote(VoteCall { club_id }) = call else {
            return Err("not a state-changing call".to_string());
        };
        let mut s = self.state();
        if s.voted.contains(from) {
            return Err("Already voted.".to_string());
        }
        let slot = match abi::option_id(club_id) {
            Some(id) => s.votes.get_mut(id as usize),
            None => None,
        };
        let Some(count) = slot else {
            return Err("Invalid club ID.".to_string());
        };
        *count += 1;
        s.voted.insert(*from);
        s.nonce += 1;
        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(data);
        preimage.extend_from_slice(&s.nonce.to_be_bytes());
        Ok(to_hex(&keccak256(&preimage)))
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, VoteError> {
        let mut s = self.state();
        let exhausted = match s.reads_left.as_mut() {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        };
        if s.offline || exhausted {
            return Err(VoteError::NetworkFailure("mock ledger offline".into()));
        }
        s.reads += 1;
        Ok(s)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        MockLedger::new(&["Club A", "Club B", "Club C"], &[])
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn get_club_votes(&self, option_id: u32) -> Result<u64, VoteError> {
        let s = self.read()?;
        s.votes
            .get(option_id as usize)
            .copied()
            .ok_or_else(|| VoteError::LedgerRejected("Invalid club ID.".into()))
    }

    async fn has_voted(&self, voter: &Address) -> Result<bool, VoteError> {
        let s = self.read()?;
        Ok(s.voted.contains(voter))
    }

    async fn club(&self, option_id: u32) -> Result<(String, u64), VoteError> {
        let s = self.read()?;
        let i = option_id as usize;
        match (self.names.get(i), s.votes.get(i)) {
            (Some(name), Some(votes)) => Ok((name.clone(), *votes)),
            _ => Err(VoteError::LedgerRejected("execution reverted".into())),
        }
    }
}

#[derive(Debug)]
pub struct MockWallet {
    ledger: Option<Arc<MockLedger>>,
    send_barrier: Option<Arc<Barrier>>,
    state: Mutex<WalletState>,
}

#[derive(Debug, Default)]
struct WalletState {
    accounts: Vec<String>,
    calls: HashMap<String, usize>,
    deny_access: bool,
    offline: bool,
    reject_next: Option<(i64, String)>,
}

impl MockWallet {
    pub fn new(accounts: &[&str]) -> Self {
        MockWallet {
            ledger: None,
            send_barrier: None,
            state: Mutex::new(WalletState {
                accounts: accounts.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }),
        }
    }

    /// Transactions are executed against `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<MockLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Holds each `eth_sendTransaction` until `n` of them are waiting, to
    /// line up concurrent submissions.
    pub fn with_send_barrier(mut self, n: usize) -> Self {
        self.send_barrier = Some(Arc::new(Barrier::new(n)));
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WalletState> {
        self.state.lock().expect("mutex poisoned")
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        self.state().accounts = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn deny_access(&self) {
        self.state().deny_access = true;
    }

    pub fn go_offline(&self) {
        self.state().offline = true;
    }

    /// The next signing request fails with this provider error.
    pub fn reject_next_with(&self, code: i64, message: &str) {
        self.state().reject_next = Some((code, message.to_string()));
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or_default()
    }

    fn take_rejection(&self) -> Result<(), RpcError> {
        match self.state().reject_next.take() {
            Some((code, message)) => Err(RpcError::Rpc {
                code,
                message,
                data: None,
            }),
            None => Ok(()),
        }
    }

    fn send_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let tx = params
            .first()
            .ok_or_else(|| invalid_params("missing transaction"))?;
        let field = |k: &str| {
            tx.get(k)
                .and_then(Value::as_str)
                .ok_or_else(|| invalid_params(&format!("missing {k}")))
        };
        let from = field("from")?
            .parse::<Address>()
            .map_err(|e| invalid_params(&e.to_string()))?;
        let to = field("to")?
            .parse::<Address>()
            .map_err(|e| invalid_params(&e.to_string()))?;
        let data = hex::decode(field("data")?.trim_start_matches("0x"))
            .map_err(|e| invalid_params(&e.to_string()))?;
        if !self.state().accounts.iter().any(|a| a.parse::<Address>().ok() == Some(from)) {
            return Err(RpcError::Rpc {
                code: UNAUTHORIZED,
                message: "from is not an authorized account".into(),
                data: None,
            });
        }
        match &self.ledger {
            Some(ledger) if ledger.address() == to => match ledger.execute(&from, &data) {
                Ok(hash) => Ok(json!(hash)),
                Err(reason) => Err(RpcError::Rpc {
                    code: EXECUTION_REVERTED,
                    message: format!("execution reverted: {reason}"),
                    data: None,
                }),
            },
            Some(_) => Err(RpcError::Rpc {
                code: EXECUTION_REVERTED,
                message: "execution reverted".into(),
                data: None,
            }),
            None => Ok(json!(to_hex(&keccak256(&data)))),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let (offline, deny, accounts) = {
            let mut s = self.state();
            *s.calls.entry(method.to_string()).or_default() += 1;
            (s.offline, s.deny_access, s.accounts.clone())
        };
        if offline {
            return Err(RpcError::Transport("wallet unreachable".into()));
        }
        match method {
            "eth_requestAccounts" if deny => Err(RpcError::Rpc {
                code: USER_REJECTED,
                message: "User rejected the request.".into(),
                data: None,
            }),
            "eth_requestAccounts" => Ok(json!(accounts)),
            "eth_accounts" if deny => Ok(json!([])),
            "eth_accounts" => Ok(json!(accounts)),
            "eth_sendTransaction" => {
                self.take_rejection()?;
                if let Some(barrier) = &self.send_barrier {
                    barrier.wait().await;
                }
                self.send_transaction(&params)
            }
            "eth_sign" => {
                self.take_rejection()?;
                let mut preimage = Vec::new();
                for p in &params {
                    preimage.extend_from_slice(p.as_str().unwrap_or_default().as_bytes());
                }
                Ok(json!(to_hex(&keccak256(&preimage))))
            }
            _ => Err(RpcError::Rpc {
                code: UNSUPPORTED_METHOD,
                message: format!("{method} is not supported"),
                data: None,
            }),
        }
    }
}

fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn invalid_params(message: &str) -> RpcError {
    RpcError::Rpc {
        code: -32602,
        message: message.to_string(),
        data: None,
    }
}
