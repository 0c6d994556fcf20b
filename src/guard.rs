use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{identity::Identity, ledger::Ledger, session::SessionState, Result};

/// Pre-submission duplicate check.
///
/// The local set only catches repeats within this session. Two attempts in
/// flight at once can both pass it, and the contract's own revert is what
/// stops the second one.
pub struct DuplicateVoteGuard {
    session: Arc<RwLock<SessionState>>,
    ledger: Option<Arc<dyn Ledger>>,
}

impl DuplicateVoteGuard {
    pub fn new(session: Arc<RwLock<SessionState>>, ledger: Option<Arc<dyn Ledger>>) -> Self {
        DuplicateVoteGuard { session, ledger }
    }

    pub async fn has_already_voted(&self, identity: &Identity) -> Result<bool> {
        if self.session.read().await.has_voted(identity) {
            return Ok(true);
        }
        let Some(ledger) = &self.ledger else {
            return Ok(false);
        };
        let address = identity.address()?;
        match ledger.has_voted(&address).await {
            Ok(voted) => Ok(voted),
            Err(e) => {
                log::warn!("hasVoted({identity}) unavailable, relying on the contract: {e}");
                Ok(false)
            }
        }
    }
}
