use std::{sync::Arc, time::Duration};

use tokio::{sync::RwLock, task::JoinHandle};

use crate::{
    config::{SubmissionMode, VoteConfig},
    election::Election,
    encoder::VoteEncoder,
    errors::VoteError,
    guard::DuplicateVoteGuard,
    identity::{Identity, IdentityResolver},
    ledger::{Ledger, RpcLedger},
    session::{SessionSnapshot, SessionState, Tally, VotePhase},
    submitter::{SubmissionResult, TransactionSubmitter},
    tally::TallyReconciler,
    wallet::{HttpWallet, WalletProvider},
    Result,
};

/// Owns the session and drives a vote from click to tally.
///
/// Session writes never span a wallet or ledger round trip, so the UI can
/// read a consistent snapshot at any time.
pub struct VoteCoordinator {
    session: Arc<RwLock<SessionState>>,
    identity: IdentityResolver,
    guard: DuplicateVoteGuard,
    encoder: VoteEncoder,
    submitter: TransactionSubmitter,
    tally: Arc<TallyReconciler>,
}

impl VoteCoordinator {
    pub fn new(
        config: &VoteConfig,
        wallet: Arc<dyn WalletProvider>,
        ledger: Option<Arc<dyn Ledger>>,
    ) -> Result<Self> {
        config.validate()?;
        if config.mode == SubmissionMode::Transaction && ledger.is_none() {
            return Err(VoteError::Config("transaction mode needs a ledger".into()));
        }
        let encoder = VoteEncoder::new(config)?;
        let election = encoder.election().clone();
        let session = Arc::new(RwLock::new(SessionState::new(&election)));
        Ok(VoteCoordinator {
            identity: IdentityResolver::new(wallet.clone(), session.clone()),
            guard: DuplicateVoteGuard::new(session.clone(), ledger.clone()),
            submitter: TransactionSubmitter::new(wallet, session.clone()),
            tally: Arc::new(TallyReconciler::new(election, ledger, session.clone())),
            encoder,
            session,
        })
    }

    /// Wallet and node over HTTP JSON-RPC. In `sign` mode the contract is
    /// not consulted and tallies are local only.
    pub fn connect_http(config: &VoteConfig) -> Result<Self> {
        config.validate()?;
        let wallet: Arc<dyn WalletProvider> = Arc::new(HttpWallet::new(&config.wallet_url)?);
        let ledger: Option<Arc<dyn Ledger>> = match config.mode {
            SubmissionMode::Transaction => Some(Arc::new(RpcLedger::new(
                &config.rpc_endpoint,
                config.contract()?,
                Duration::from_millis(config.rpc_timeout_ms),
            )?)),
            SubmissionMode::Sign => None,
        };
        VoteCoordinator::new(config, wallet, ledger)
    }

    pub fn election(&self) -> &Election {
        self.encoder.election()
    }

    /// Checks the option list against the contract and seeds the tally.
    /// Only a mismatched option list is fatal.
    pub async fn initialize(&self) -> Result<()> {
        match self.tally.verify_options().await {
            Ok(()) => {}
            Err(e @ VoteError::Config(_)) => return Err(e),
            Err(e) => log::warn!("Could not check options against the contract: {e}"),
        }
        if let Err(e) = self.tally.refresh().await {
            log::warn!("Initial tally refresh failed, showing zero counts: {e}");
        }
        Ok(())
    }

    pub async fn connect(&self) -> Result<Vec<Identity>> {
        self.identity.connect().await
    }

    /// One vote attempt for the option labelled `label`. Not retried on
    /// failure; the reason is kept for display.
    pub async fn vote(&self, label: &str) -> Result<SubmissionResult> {
        let outcome = self.attempt(label).await;
        let mut session = self.session.write().await;
        session.phase = VotePhase::Idle;
        if let Err(e) = &outcome {
            if e.is_rejection() {
                log::warn!("Vote for {label} rejected: {e}");
            } else {
                log::error!("Vote for {label} failed: {e}");
            }
            session.last_rejection = Some(e.to_string());
        }
        outcome
    }

    async fn attempt(&self, label: &str) -> Result<SubmissionResult> {
        self.set_phase(VotePhase::Resolving).await;
        let identity = self.identity.resolve().await?;

        self.set_phase(VotePhase::Guarding).await;
        if self.guard.has_already_voted(&identity).await? {
            return Err(VoteError::AlreadyVoted(identity.to_string()));
        }

        self.set_phase(VotePhase::Encoding).await;
        let (option, payload) = self.encoder.encode(&identity, label)?;

        self.set_phase(VotePhase::Submitting).await;
        self.submitter.submit(&identity, &option, payload).await
    }

    async fn set_phase(&self, phase: VotePhase) {
        self.session.write().await.phase = phase;
    }

    pub async fn refresh(&self) -> Result<Tally> {
        self.tally.refresh().await
    }

    pub fn spawn_refresh_loop(&self, period: Duration) -> JoinHandle<()> {
        self.tally.clone().spawn_refresh_loop(period)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot(self.election())
    }
}
