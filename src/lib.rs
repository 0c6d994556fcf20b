mod config;
mod coordinator;
mod election;
mod encoder;
mod errors;
mod guard;
mod identity;
mod ledger;
mod rpc;
mod session;
mod submitter;
mod tally;

pub mod abi;
pub mod mock;
pub mod wallet;

pub use abi::{ClubVoting, VotePayload, VoteTransaction};
pub use config::{SubmissionMode, VoteConfig};
pub use coordinator::VoteCoordinator;
pub use election::{ClubOption, Election};
pub use encoder::VoteEncoder;
pub use errors::VoteError;
pub use guard::DuplicateVoteGuard;
pub use identity::{Identity, IdentityResolver};
pub use ledger::{Ledger, RpcLedger};
pub use rpc::RpcError;
pub use session::{SessionSnapshot, SessionState, Tally, VotePhase, VoteRecord};
pub use submitter::{SubmissionKind, SubmissionResult, TransactionSubmitter};
pub use tally::TallyReconciler;
pub use wallet::{HttpWallet, WalletProvider};

pub type Result<T, E = VoteError> = std::result::Result<T, E>;
