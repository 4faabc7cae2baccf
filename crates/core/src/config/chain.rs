//! Chain section of the snapshot configuration.

use serde::{Deserialize, Serialize};

/// Chain the snapshot is taken on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name, used as the collateral asset prefix ("ethereum:0x...")
    #[serde(default = "default_chain_name")]
    pub name: String,
    /// Expected chain ID (checked against the node on connect)
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// HTTP RPC endpoint, `${VAR}` expanded
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
}

fn default_chain_name() -> String {
    "ethereum".to_string()
}

fn default_chain_id() -> u64 {
    1
}

fn default_rpc_url() -> String {
    "${ETH_RPC_URL}".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: default_chain_name(),
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
        }
    }
}

impl ChainConfig {
    /// Expand environment variables in config values.
    pub fn expand_env_vars(&mut self) {
        self.rpc_url = expand_env(&self.rpc_url);
    }

    /// True when the RPC URL still holds an unexpanded `${VAR}`.
    pub fn has_unresolved_rpc(&self) -> bool {
        self.rpc_url.contains("${")
    }
}

/// Expand ${VAR_NAME} patterns with environment variable values.
///
/// Unset variables are left in place.
pub(crate) fn expand_env(s: &str) -> String {
    let mut result = s.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env() {
        // Unique var names, tests run in parallel
        std::env::set_var("SNAPSHOT_CHAIN_TEST_VAR", "test_value");
        assert_eq!(expand_env("${SNAPSHOT_CHAIN_TEST_VAR}"), "test_value");
        assert_eq!(
            expand_env("https://node/${SNAPSHOT_CHAIN_TEST_VAR}/rpc"),
            "https://node/test_value/rpc"
        );
        assert_eq!(expand_env("no_vars"), "no_vars");
        std::env::remove_var("SNAPSHOT_CHAIN_TEST_VAR");
    }

    #[test]
    fn test_unset_var_left_in_place() {
        let mut chain = ChainConfig {
            rpc_url: "${SNAPSHOT_CHAIN_UNSET_VAR}".to_string(),
            ..Default::default()
        };
        chain.expand_env_vars();
        assert!(chain.has_unresolved_rpc());
    }

    #[test]
    fn test_defaults() {
        let chain = ChainConfig::default();
        assert_eq!(chain.name, "ethereum");
        assert_eq!(chain.chain_id, 1);
        assert_eq!(chain.rpc_url, "${ETH_RPC_URL}");
    }
}
