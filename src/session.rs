use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    election::{ClubOption, Election},
    identity::Identity,
    submitter::SubmissionResult,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub identity: Identity,
    pub option: ClubOption,
}

/// Vote count per option id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally(BTreeMap<u32, u64>);

impl Tally {
    pub fn zeroed(election: &Election) -> Self {
        Tally(election.options().iter().map(|o| (o.id, 0)).collect())
    }

    pub fn get(&self, option_id: u32) -> u64 {
        self.0.get(&option_id).copied().unwrap_or_default()
    }

    pub fn increment(&mut self, option_id: u32) {
        let c = self.0.entry(option_id).or_default();
        *c = c.saturating_add(1);
    }

    /// Replaces every count at once with ledger values.
    pub fn overwrite(&mut self, counts: impl IntoIterator<Item = (u32, u64)>) {
        self.0 = counts.into_iter().collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |a, b| a.saturating_add(*b))
    }
}

/// Where the current vote attempt is. An attempt always ends back at
/// `Idle`; its outcome is kept in `last_submission` or `last_rejection`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum VotePhase {
    #[default]
    Idle,
    Resolving,
    Guarding,
    Encoding,
    Submitting,
}

/// Everything the coordinator knows for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub accounts: Vec<Identity>,
    pub voted: BTreeMap<Identity, VoteRecord>,
    pub tally: Tally,
    pub last_submission: Option<SubmissionResult>,
    pub last_rejection: Option<String>,
    pub phase: VotePhase,
}

impl SessionState {
    pub fn new(election: &Election) -> Self {
        SessionState {
            tally: Tally::zeroed(election),
            ..Default::default()
        }
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.voted.contains_key(identity)
    }

    /// Records the vote, bumps its option by one and keeps the result.
    /// Returns false and changes nothing if the identity already has a record.
    pub fn record_vote(&mut self, result: SubmissionResult) -> bool {
        if self.has_voted(&result.identity) {
            return false;
        }
        self.voted.insert(
            result.identity.clone(),
            VoteRecord {
                identity: result.identity.clone(),
                option: result.option.clone(),
            },
        );
        self.tally.increment(result.option.id);
        self.last_submission = Some(result);
        self.last_rejection = None;
        true
    }

    pub fn snapshot(&self, election: &Election) -> SessionSnapshot {
        SessionSnapshot {
            connected: self.accounts.first().map(Identity::truncated),
            tallies: election
                .options()
                .iter()
                .map(|o| (o.label.clone(), self.tally.get(o.id)))
                .collect(),
            voted: self.voted.keys().cloned().collect(),
            last_submission: self.last_submission.clone(),
            last_rejection: self.last_rejection.clone(),
            phase: self.phase,
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Truncated active account, `None` until connected.
    pub connected: Option<String>,
    /// Counts in option order.
    pub tallies: Vec<(String, u64)>,
    pub voted: Vec<Identity>,
    pub last_submission: Option<SubmissionResult>,
    pub last_rejection: Option<String>,
    pub phase: VotePhase,
}
