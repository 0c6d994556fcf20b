use serde::{Deserialize, Serialize};

use crate::errors::VoteError;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct ClubOption {
    pub id: u32,
    pub label: String,
}

impl ClubOption {
    pub fn new(id: u32, label: &str) -> Self {
        ClubOption {
            id,
            label: label.to_string(),
        }
    }
}

/// The fixed, ordered set of options for one voting round.
///
/// An option's id is its position in the list, which must match the order
/// the ledger contract was constructed with.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Election {
    pub name: String,
    options: Vec<ClubOption>,
}

impl Election {
    pub fn new<S: AsRef<str>>(name: &str, labels: &[S]) -> Result<Election, VoteError> {
        if labels.is_empty() {
            return Err(VoteError::Config("option list is empty".into()));
        }
        let mut options: Vec<ClubOption> = Vec::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            let label = label.as_ref();
            if label.trim().is_empty() {
                return Err(VoteError::Config(format!("option {i} has an empty label")));
            }
            if options.iter().any(|o| o.label == label) {
                return Err(VoteError::Config(format!("duplicate option label '{label}'")));
            }
            let id = u32::try_from(i)
                .map_err(|_| VoteError::Config("too many options".into()))?;
            options.push(ClubOption::new(id, label));
        }
        Ok(Election {
            name: name.to_string(),
            options,
        })
    }

    pub fn from_json(json: &str) -> Result<Election, VoteError> {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            options: Vec<String>,
        }
        let raw: Raw =
            serde_json::from_str(json).map_err(|e| VoteError::InvalidJson(e.to_string()))?;
        Election::new(&raw.name, raw.options.as_slice())
    }

    pub fn options(&self) -> &[ClubOption] {
        &self.options
    }

    /// Exact, case-sensitive lookup by display label.
    pub fn option(&self, label: &str) -> Result<&ClubOption, VoteError> {
        self.options
            .iter()
            .find(|o| o.label == label)
            .ok_or_else(|| VoteError::UnknownOption(label.to_string()))
    }

    pub fn option_by_id(&self, id: u32) -> Option<&ClubOption> {
        self.options.get(id as usize)
    }
}
