use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    abi::VotePayload,
    election::ClubOption,
    errors::VoteError,
    identity::Identity,
    session::SessionState,
    wallet::{self, WalletProvider},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SubmissionKind {
    Transaction,
    SignedMessage,
}

/// What the wallet handed back for a vote. Display only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub identity: Identity,
    pub option: ClubOption,
    /// Transaction hash or signature.
    pub reference: String,
    pub kind: SubmissionKind,
}

pub struct TransactionSubmitter {
    wallet: Arc<dyn WalletProvider>,
    session: Arc<RwLock<SessionState>>,
}

impl TransactionSubmitter {
    pub fn new(wallet: Arc<dyn WalletProvider>, session: Arc<RwLock<SessionState>>) -> Self {
        TransactionSubmitter { wallet, session }
    }

    /// Sends the vote through the wallet. On success the identity is marked
    /// and its option counted once; on any failure the session is untouched.
    pub async fn submit(
        &self,
        identity: &Identity,
        option: &ClubOption,
        payload: VotePayload,
    ) -> Result<SubmissionResult> {
        let (reference, kind) = match &payload {
            VotePayload::Transaction(tx) => (
                wallet::send_transaction(&*self.wallet, tx).await?,
                SubmissionKind::Transaction,
            ),
            VotePayload::Message { from, text } => (
                wallet::sign(&*self.wallet, from, text).await?,
                SubmissionKind::SignedMessage,
            ),
        };
        let result = SubmissionResult {
            identity: identity.clone(),
            option: option.clone(),
            reference,
            kind,
        };

        let mut session = self.session.write().await;
        if !session.record_vote(result.clone()) {
            // A concurrent attempt got here first. This transaction is still
            // broadcast and the contract will revert it.
            log::warn!(
                "{identity} already recorded, ignoring duplicate submission {}",
                result.reference
            );
            return Err(VoteError::AlreadyVoted(identity.to_string()));
        }
        log::info!("Vote for {} by {identity} submitted: {}", option.label, result.reference);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abi::VoteTransaction,
        election::Election,
        mock::{MockLedger, MockWallet},
    };
    use ethers::types::Address;

    const VOTER: &str = "0x00000000000000000000000000000000000000a1";

    struct Fixture {
        wallet: Arc<MockWallet>,
        session: Arc<RwLock<SessionState>>,
        submitter: TransactionSubmitter,
        election: Election,
        contract: Address,
    }

    fn fixture() -> Fixture {
        let election = Election::new("clubs", &["Club A", "Club B", "Club C"]).unwrap();
        let ledger = Arc::new(MockLedger::new(&["Club A", "Club B", "Club C"], &[2, 5, 1]));
        let wallet = Arc::new(MockWallet::new(&[VOTER]).with_ledger(ledger.clone()));
        let session = Arc::new(RwLock::new(SessionState::new(&election)));
        let submitter = TransactionSubmitter::new(wallet.clone(), session.clone());
        Fixture {
            wallet,
            session,
            submitter,
            election,
            contract: ledger.address(),
        }
    }

    fn payload(f: &Fixture, option: &ClubOption) -> VotePayload {
        let from = Identity::new(VOTER).address().unwrap();
        VotePayload::Transaction(VoteTransaction::new(&from, &f.contract, option.id, 300_000, 137))
    }

    #[tokio::test]
    async fn success_counts_exactly_once() {
        let f = fixture();
        let b = f.election.option("Club B").unwrap().clone();
        let r = f.submitter.submit(&Identity::new(VOTER), &b, payload(&f, &b)).await.unwrap();
        assert_eq!(r.kind, SubmissionKind::Transaction);
        assert!(r.reference.starts_with("0x"));
        let s = f.session.read().await;
        assert_eq!(s.tally.iter().collect::<Vec<_>>(), vec![(0, 0), (1, 1), (2, 0)]);
        assert_eq!(s.voted.len(), 1);
        assert_eq!(s.last_submission.as_ref(), Some(&r));
    }

    #[tokio::test]
    async fn user_cancel_changes_nothing() {
        let f = fixture();
        f.wallet.reject_next_with(crate::wallet::USER_REJECTED, "User rejected the request.");
        let a = f.election.option("Club A").unwrap().clone();
        let e = f.submitter.submit(&Identity::new(VOTER), &a, payload(&f, &a)).await.unwrap_err();
        assert!(matches!(e, VoteError::ProviderRejected(_)));
        let s = f.session.read().await;
        assert_eq!(s.tally.total(), 0);
        assert!(s.voted.is_empty());
        assert!(s.last_submission.is_none());
    }

    #[tokio::test]
    async fn signed_message_variant() {
        let f = fixture();
        let c = f.election.option("Club C").unwrap().clone();
        let r = f
            .submitter
            .submit(
                &Identity::new(VOTER),
                &c,
                VotePayload::Message {
                    from: VOTER.into(),
                    text: "Vote Club C".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(r.kind, SubmissionKind::SignedMessage);
        assert_eq!(f.wallet.calls("eth_sign"), 1);
        assert_eq!(f.session.read().await.tally.get(c.id), 1);
    }
}
