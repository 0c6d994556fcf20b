use std::sync::Arc;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{errors::VoteError, session::SessionState, wallet, wallet::WalletProvider, Result};

/// An account address as the wallet reports it. Compared exactly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(address: &str) -> Self {
        Identity(address.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn address(&self) -> Result<Address> {
        self.0
            .parse::<Address>()
            .map_err(|e| VoteError::InvalidIdentity(format!("{}: {e}", self.0)))
    }

    /// Short form for display: the first 8 characters and an ellipsis.
    pub fn truncated(&self) -> String {
        if self.0.chars().count() > 8 {
            let head: String = self.0.chars().take(8).collect();
            format!("{head}...")
        } else {
            self.0.clone()
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct IdentityResolver {
    wallet: Arc<dyn WalletProvider>,
    session: Arc<RwLock<SessionState>>,
}

impl IdentityResolver {
    pub fn new(wallet: Arc<dyn WalletProvider>, session: Arc<RwLock<SessionState>>) -> Self {
        IdentityResolver { wallet, session }
    }

    /// Asks for account access, then reads the account list into the session.
    /// Safe to call again while connected.
    pub async fn connect(&self) -> Result<Vec<Identity>> {
        wallet::request_accounts(&*self.wallet).await?;
        let accounts: Vec<Identity> = wallet::accounts(&*self.wallet)
            .await?
            .into_iter()
            .map(Identity)
            .collect();
        log::info!("Connected {} account(s)", accounts.len());
        self.session.write().await.accounts = accounts.clone();
        Ok(accounts)
    }

    /// The active account, connecting first if the session has none yet.
    pub async fn resolve(&self) -> Result<Identity> {
        let connected = !self.session.read().await.accounts.is_empty();
        if !connected {
            self.connect().await?;
        }
        // The wallet may have switched accounts since connect.
        let accounts: Vec<Identity> = wallet::accounts(&*self.wallet)
            .await?
            .into_iter()
            .map(Identity)
            .collect();
        let current = accounts.first().cloned().ok_or(VoteError::NoIdentity)?;
        self.session.write().await.accounts = accounts;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWallet;

    fn resolver(wallet: Arc<MockWallet>) -> (IdentityResolver, Arc<RwLock<SessionState>>) {
        let session = Arc::new(RwLock::new(SessionState::default()));
        (IdentityResolver::new(wallet, session.clone()), session)
    }

    #[test]
    fn truncation() {
        assert_eq!(Identity::new("0x1234567890ab").truncated(), "0x123456...");
        assert_eq!(Identity::new("0x1234").truncated(), "0x1234");
        assert_eq!(Identity::new("0x123456").truncated(), "0x123456");
    }

    #[test]
    fn address_parsing() {
        let id = Identity::new("0x00000000000000000000000000000000000000a1");
        assert_eq!(id.address().unwrap().as_bytes()[19], 0xa1);
        assert!(matches!(Identity::new("alice").address(), Err(VoteError::InvalidIdentity(_))));
    }

    #[tokio::test]
    async fn connect_fills_session_and_is_repeatable() {
        let wallet = Arc::new(MockWallet::new(&["0xa1", "0xb2"]));
        let (r, session) = resolver(wallet.clone());
        let first = r.connect().await.unwrap();
        let second = r.connect().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(session.read().await.accounts, first);
        assert_eq!(wallet.calls("eth_requestAccounts"), 2);
    }

    #[tokio::test]
    async fn denied_access_surfaces() {
        let wallet = Arc::new(MockWallet::new(&["0xa1"]));
        wallet.deny_access();
        let (r, session) = resolver(wallet);
        assert!(matches!(r.connect().await, Err(VoteError::ProviderUnavailable(_))));
        assert!(session.read().await.accounts.is_empty());
    }

    #[tokio::test]
    async fn resolve_connects_on_first_use() {
        let wallet = Arc::new(MockWallet::new(&["0xa1"]));
        let (r, session) = resolver(wallet.clone());
        assert_eq!(r.resolve().await.unwrap(), Identity::new("0xa1"));
        assert_eq!(wallet.calls("eth_requestAccounts"), 1);
        r.resolve().await.unwrap();
        assert_eq!(wallet.calls("eth_requestAccounts"), 1);
        assert_eq!(session.read().await.accounts.len(), 1);
    }

    #[tokio::test]
    async fn empty_wallet_is_no_identity() {
        let wallet = Arc::new(MockWallet::new(&[]));
        let (r, _) = resolver(wallet);
        assert!(matches!(r.resolve().await, Err(VoteError::NoIdentity)));
    }
}
