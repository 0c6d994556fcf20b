use std::path::Path;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::{election::Election, errors::VoteError, Result};

pub const DEFAULT_WALLET_URL: &str = "https://wallet.intmax.io";
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_OPTIONS: [&str; 3] = ["Club A", "Club B", "Club C"];
pub const DEFAULT_ELECTION_NAME: &str = "Club vote";

/// How a vote reaches the wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// `eth_sendTransaction` calling `vote(uint256)` on the contract.
    #[default]
    Transaction,
    /// `eth_sign` over "Vote <label>", with no contract write.
    Sign,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteConfig {
    pub wallet_url: String,
    /// CAIP-2 chain reference, e.g. `eip155:137`.
    pub network_id: String,
    pub contract_address: String,
    pub rpc_endpoint: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default = "default_election_name")]
    pub election_name: String,
    #[serde(default = "default_options")]
    pub options: Vec<String>,
    #[serde(default)]
    pub mode: SubmissionMode,
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_election_name() -> String {
    DEFAULT_ELECTION_NAME.to_string()
}

fn default_options() -> Vec<String> {
    DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect()
}

impl VoteConfig {
    /// Reads `VOTE_*` variables, loading a `.env` file from the working
    /// directory first if there is one.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|k| dotenv::var(k).ok())
    }

    pub fn from_env_file(path: &Path) -> Result<Self> {
        dotenv::from_path(path)
            .map_err(|e| VoteError::Config(format!("cannot load {}: {e}", path.display())))?;
        Self::from_lookup(|k| dotenv::var(k).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let var = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |k: &str| var(k).ok_or_else(|| VoteError::Config(format!("{k} is not set")));
        let number = |k: &str, default: u64| -> Result<u64> {
            match var(k) {
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|e| VoteError::Config(format!("{k}={v}: {e}"))),
                None => Ok(default),
            }
        };

        let mode = match var("VOTE_MODE").as_deref() {
            None | Some("transaction") => SubmissionMode::Transaction,
            Some("sign") => SubmissionMode::Sign,
            Some(other) => {
                return Err(VoteError::Config(format!(
                    "VOTE_MODE must be 'transaction' or 'sign', got '{other}'"
                )))
            }
        };
        let options = match var("VOTE_OPTIONS") {
            Some(v) => v.split(',').map(|s| s.trim().to_string()).collect(),
            None => default_options(),
        };

        let config = VoteConfig {
            wallet_url: var("VOTE_WALLET_URL").unwrap_or_else(|| DEFAULT_WALLET_URL.to_string()),
            network_id: required("VOTE_NETWORK_ID")?,
            contract_address: required("VOTE_CONTRACT_ADDRESS")?,
            rpc_endpoint: required("VOTE_RPC_ENDPOINT")?,
            gas_limit: number("VOTE_GAS_LIMIT", DEFAULT_GAS_LIMIT)?,
            rpc_timeout_ms: number("VOTE_RPC_TIMEOUT_MS", DEFAULT_RPC_TIMEOUT_MS)?,
            election_name: var("VOTE_ELECTION_NAME").unwrap_or_else(default_election_name),
            options,
            mode,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: VoteConfig =
            serde_json::from_str(json).map_err(|e| VoteError::InvalidJson(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_url("wallet_url", &self.wallet_url)?;
        check_url("rpc_endpoint", &self.rpc_endpoint)?;
        self.chain_id()?;
        self.contract()?;
        if self.gas_limit == 0 {
            return Err(VoteError::Config("gas_limit must be > 0".into()));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(VoteError::Config("rpc_timeout_ms must be > 0".into()));
        }
        self.election()?;
        Ok(())
    }

    pub fn chain_id(&self) -> Result<u64> {
        let reference = self
            .network_id
            .strip_prefix("eip155:")
            .ok_or_else(|| VoteError::Config(format!("network_id '{}' is not eip155:<chain id>", self.network_id)))?;
        match reference.parse::<u64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(VoteError::Config(format!("invalid chain id in '{}'", self.network_id))),
        }
    }

    pub fn contract(&self) -> Result<Address> {
        let address = self
            .contract_address
            .parse::<Address>()
            .map_err(|e| VoteError::Config(format!("contract_address '{}': {e}", self.contract_address)))?;
        if address.is_zero() {
            return Err(VoteError::Config("contract_address is zero".into()));
        }
        Ok(address)
    }

    pub fn election(&self) -> Result<Election> {
        Election::new(&self.election_name, self.options.as_slice())
    }
}

fn check_url(field: &str, url: &str) -> Result<()> {
    let uri = url
        .parse::<http::Uri>()
        .map_err(|e| VoteError::Config(format!("{field} '{url}': {e}")))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => return Err(VoteError::Config(format!("{field} '{url}' must be http(s)"))),
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(VoteError::Config(format!("{field} '{url}' has no host")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut m: HashMap<String, String> = [
            ("VOTE_NETWORK_ID", "eip155:137"),
            ("VOTE_CONTRACT_ADDRESS", CONTRACT),
            ("VOTE_RPC_ENDPOINT", "https://polygon-mainnet.example/v3/key"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.to_string());
        }
        m
    }

    fn load(m: &HashMap<String, String>) -> Result<VoteConfig> {
        VoteConfig::from_lookup(|k| m.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = load(&env(&[])).unwrap();
        assert_eq!(c.wallet_url, DEFAULT_WALLET_URL);
        assert_eq!(c.gas_limit, 300_000);
        assert_eq!(c.chain_id().unwrap(), 137);
        assert_eq!(c.mode, SubmissionMode::Transaction);
        let election = c.election().unwrap();
        assert_eq!(election.name, DEFAULT_ELECTION_NAME);
        assert_eq!(election.options().len(), 3);
    }

    #[test]
    fn each_required_field_fails_fast() {
        for key in ["VOTE_NETWORK_ID", "VOTE_CONTRACT_ADDRESS", "VOTE_RPC_ENDPOINT"] {
            let mut m = env(&[]);
            m.remove(key);
            match load(&m) {
                Err(VoteError::Config(msg)) => assert!(msg.contains(key), "{msg}"),
                other => panic!("{key}: {other:?}"),
            }
            // Blank counts as missing.
            let m = env(&[(key, "  ")]);
            assert!(matches!(load(&m), Err(VoteError::Config(_))));
        }
    }

    #[test]
    fn invalid_values() {
        let bad = [
            ("VOTE_WALLET_URL", "wallet.intmax.io"),
            ("VOTE_RPC_ENDPOINT", "ftp://node"),
            ("VOTE_NETWORK_ID", "137"),
            ("VOTE_NETWORK_ID", "eip155:polygon"),
            ("VOTE_NETWORK_ID", "eip155:0"),
            ("VOTE_CONTRACT_ADDRESS", "0x1234"),
            ("VOTE_CONTRACT_ADDRESS", "0x0000000000000000000000000000000000000000"),
            ("VOTE_GAS_LIMIT", "0"),
            ("VOTE_GAS_LIMIT", "lots"),
            ("VOTE_OPTIONS", "Club A,,Club B"),
            ("VOTE_OPTIONS", "Club A,Club A"),
            ("VOTE_MODE", "smoke-signal"),
        ];
        for (k, v) in bad {
            assert!(matches!(load(&env(&[(k, v)])), Err(VoteError::Config(_))), "{k}={v}");
        }
    }

    #[test]
    fn overrides() {
        let c = load(&env(&[
            ("VOTE_OPTIONS", "Reds, Blues"),
            ("VOTE_MODE", "sign"),
            ("VOTE_GAS_LIMIT", "120000"),
            ("VOTE_ELECTION_NAME", "Derby day"),
        ]))
        .unwrap();
        assert_eq!(c.election().unwrap().name, "Derby day");
        assert_eq!(c.options, vec!["Reds", "Blues"]);
        assert_eq!(c.mode, SubmissionMode::Sign);
        assert_eq!(c.gas_limit, 120_000);
    }

    #[test]
    fn json() {
        let c = VoteConfig::from_json(&format!(
            r#"{{"wallet_url":"https://wallet.intmax.io","network_id":"eip155:11155111",
                "contract_address":"{CONTRACT}","rpc_endpoint":"http://localhost:8545"}}"#
        ))
        .unwrap();
        assert_eq!(c.chain_id().unwrap(), 11_155_111);
        assert_eq!(c.options.len(), 3);
        assert_eq!(c.election_name, DEFAULT_ELECTION_NAME);
        assert!(matches!(
            VoteConfig::from_json(r#"{"wallet_url":"x"}"#),
            Err(VoteError::InvalidJson(_))
        ));
    }

    #[test]
    fn env_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            "VOTE_NETWORK_ID=eip155:80002\nVOTE_CONTRACT_ADDRESS={CONTRACT}\nVOTE_RPC_ENDPOINT=http://127.0.0.1:8545\n"
        )
        .unwrap();
        let c = VoteConfig::from_env_file(f.path()).unwrap();
        assert_eq!(c.chain_id().unwrap(), 80002);
        assert!(VoteConfig::from_env_file(Path::new("/nonexistent/.env")).is_err());
    }
}
