use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Ledger network the anchor client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
    Localnet,
}

impl Cluster {
    /// Public RPC endpoint for the cluster.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::Localnet => "http://127.0.0.1:8899",
        }
    }
}

/// Confirmation level requested from the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    /// Parse a `confirmationStatus` value reported by the ledger.
    pub fn from_status(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "confirmed" => Some(Self::Confirmed),
            "finalized" => Some(Self::Finalized),
            _ => None,
        }
    }
}

/// Configuration for the JSON-RPC ledger client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's public RPC endpoint.
    pub rpc_url: Option<String>,
    /// Base URL of the public block explorer.
    pub explorer_url: String,
    /// Payer keypair file (64-byte JSON array). Required for anchoring,
    /// not for verification.
    pub keypair_path: Option<PathBuf>,
    pub commitment: Commitment,
    /// Wait for the anchoring transaction to reach `commitment` before
    /// reporting success.
    pub confirm: bool,
    pub confirm_timeout_secs: u64,
    pub confirm_poll_millis: u64,
    pub request_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: None,
            explorer_url: "https://explorer.solana.com".into(),
            keypair_path: None,
            commitment: Commitment::Confirmed,
            confirm: true,
            confirm_timeout_secs: 60,
            confirm_poll_millis: 500,
            request_timeout_secs: 10,
        }
    }
}

impl LedgerConfig {
    /// The RPC endpoint actually used.
    pub fn rpc_endpoint(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.default_rpc_url())
    }

    /// Explorer URL for a transaction on this cluster.
    pub fn transaction_url(&self, tx_signature: &str) -> String {
        let base = format!(
            "{}/tx/{}",
            self.explorer_url.trim_end_matches('/'),
            tx_signature
        );
        let params: Vec<(&str, &str)> = match (self.cluster, self.rpc_url.as_deref()) {
            (Cluster::MainnetBeta, None) => vec![],
            (Cluster::Devnet, None) => vec![("cluster", "devnet")],
            (Cluster::Testnet, None) => vec![("cluster", "testnet")],
            _ => vec![("cluster", "custom"), ("customUrl", self.rpc_endpoint())],
        };
        if params.is_empty() {
            return base;
        }
        match reqwest::Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert_eq!(c.cluster, Cluster::Devnet);
        assert_eq!(c.rpc_endpoint(), "https://api.devnet.solana.com");
        assert_eq!(c.commitment, Commitment::Confirmed);
        assert!(c.confirm);
        assert!(c.keypair_path.is_none());
    }

    #[test]
    fn rpc_override_wins() {
        let c = LedgerConfig {
            rpc_url: Some("http://localhost:9000".into()),
            ..Default::default()
        };
        assert_eq!(c.rpc_endpoint(), "http://localhost:9000");
    }

    #[test]
    fn devnet_explorer_url() {
        let c = LedgerConfig::default();
        assert_eq!(
            c.transaction_url("abc"),
            "https://explorer.solana.com/tx/abc?cluster=devnet"
        );
    }

    #[test]
    fn mainnet_explorer_url_has_no_query() {
        let c = LedgerConfig {
            cluster: Cluster::MainnetBeta,
            ..Default::default()
        };
        assert_eq!(c.transaction_url("abc"), "https://explorer.solana.com/tx/abc");
    }

    #[test]
    fn custom_endpoint_is_encoded() {
        let c = LedgerConfig {
            cluster: Cluster::Localnet,
            ..Default::default()
        };
        let url = c.transaction_url("abc");
        assert!(url.starts_with("https://explorer.solana.com/tx/abc?cluster=custom&customUrl="));
        assert!(url.contains("http%3A%2F%2F127.0.0.1%3A8899"));
    }

    #[test]
    fn commitment_ordering() {
        assert!(Commitment::Finalized > Commitment::Confirmed);
        assert_eq!(Commitment::from_status("confirmed"), Some(Commitment::Confirmed));
        assert_eq!(Commitment::from_status("bogus"), None);
    }

    #[test]
    fn toml_uses_kebab_case_cluster() {
        let c: LedgerConfig = toml::from_str("cluster = \"mainnet-beta\"").unwrap();
        assert_eq!(c.cluster, Cluster::MainnetBeta);
        assert_eq!(c.request_timeout_secs, 10);
    }
}
