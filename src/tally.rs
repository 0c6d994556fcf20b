use std::{sync::Arc, time::Duration};

use futures::future::try_join_all;
use tokio::{sync::RwLock, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    election::Election,
    errors::VoteError,
    ledger::Ledger,
    session::{SessionState, Tally},
    Result,
};

/// Keeps the displayed counts in line with the contract.
///
/// A refresh replaces the whole tally, so any optimistic increment not yet
/// visible on the ledger is dropped in favour of the ledger's value.
pub struct TallyReconciler {
    election: Election,
    ledger: Option<Arc<dyn Ledger>>,
    session: Arc<RwLock<SessionState>>,
}

impl TallyReconciler {
    pub fn new(
        election: Election,
        ledger: Option<Arc<dyn Ledger>>,
        session: Arc<RwLock<SessionState>>,
    ) -> Self {
        TallyReconciler {
            election,
            ledger,
            session,
        }
    }

    /// Reads every option's count, then publishes them together. If any read
    /// fails the published tally is left as it was.
    pub async fn refresh(&self) -> Result<Tally> {
        let Some(ledger) = &self.ledger else {
            return Ok(self.session.read().await.tally.clone());
        };
        let options = self.election.options();
        let counts = try_join_all(options.iter().map(|o| ledger.get_club_votes(o.id))).await?;
        let tally = {
            let mut session = self.session.write().await;
            session.tally.overwrite(options.iter().map(|o| o.id).zip(counts));
            session.tally.clone()
        };
        log::info!("Tally refreshed: {} vote(s)", tally.total());
        Ok(tally)
    }

    /// Checks the configured labels against the contract's own list: same
    /// names at the same ids, and nothing past the last configured one.
    pub async fn verify_options(&self) -> Result<()> {
        let Some(ledger) = &self.ledger else {
            return Ok(());
        };
        let options = self.election.options();
        let clubs = try_join_all(options.iter().map(|o| ledger.club(o.id)))
            .await
            .map_err(|e| match e {
                VoteError::LedgerRejected(reason) => VoteError::Config(format!(
                    "contract has fewer than {} options: {reason}",
                    options.len()
                )),
                e => e,
            })?;
        for (option, (name, _)) in options.iter().zip(clubs) {
            if option.label != name {
                return Err(VoteError::Config(format!(
                    "option {} is '{}' locally but '{name}' on the contract",
                    option.id, option.label
                )));
            }
        }
        let past_end = options.last().map_or(0, |o| o.id.saturating_add(1));
        match ledger.club(past_end).await {
            Ok((name, _)) => Err(VoteError::Config(format!(
                "contract option {past_end} '{name}' is not configured"
            ))),
            Err(VoteError::LedgerRejected(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Refreshes on a fixed period until the handle is aborted. Failures keep
    /// the last known tally and are retried on the next tick.
    pub fn spawn_refresh_loop(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    log::warn!("Tally refresh failed, keeping last known counts: {e}");
                }
            }
        })
    }
}
