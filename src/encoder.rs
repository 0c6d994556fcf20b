use ethers::types::Address;

use crate::{
    abi::{VotePayload, VoteTransaction},
    config::{SubmissionMode, VoteConfig},
    election::{ClubOption, Election},
    identity::Identity,
    Result,
};

/// Turns a label chosen in the UI into the payload the wallet signs.
#[derive(Clone, Debug)]
pub struct VoteEncoder {
    election: Election,
    mode: SubmissionMode,
    contract: Address,
    gas_limit: u64,
    chain_id: u64,
}

impl VoteEncoder {
    pub fn new(config: &VoteConfig) -> Result<Self> {
        Ok(VoteEncoder {
            election: config.election()?,
            mode: config.mode,
            contract: config.contract()?,
            gas_limit: config.gas_limit,
            chain_id: config.chain_id()?,
        })
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn mode(&self) -> SubmissionMode {
        self.mode
    }

    /// Fails with `UnknownOption` for any label outside the enumeration.
    pub fn encode(&self, identity: &Identity, label: &str) -> Result<(ClubOption, VotePayload)> {
        let option = self.election.option(label)?.clone();
        let payload = match self.mode {
            SubmissionMode::Transaction => VotePayload::Transaction(VoteTransaction::new(
                &identity.address()?,
                &self.contract,
                option.id,
                self.gas_limit,
                self.chain_id,
            )),
            SubmissionMode::Sign => VotePayload::Message {
                from: identity.as_str().to_string(),
                text: format!("Vote {}", option.label),
            },
        };
        Ok((option, payload))
    }
}
