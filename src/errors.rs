use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Wallet returned no account")]
    NoIdentity,
    #[error("Already voted: {0}")]
    AlreadyVoted(String),
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Wallet rejected the request: {0}")]
    ProviderRejected(String),
    #[error("Ledger rejected the vote: {0}")]
    LedgerRejected(String),
    #[error("Ledger read failed: {0}")]
    NetworkFailure(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

impl VoteError {
    /// Expected outcomes of a vote attempt, as opposed to faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VoteError::AlreadyVoted(_) | VoteError::LedgerRejected(_) | VoteError::ProviderRejected(_)
        )
    }
}
