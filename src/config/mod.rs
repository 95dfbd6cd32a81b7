//! Configuration for the swap executor

pub mod rpc;

use crate::tokens::{addresses, chains};
use crate::wallet::GasConfig;
use crate::{Error, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub use rpc::RpcConfig;

/// Environment variable holding the signing key unless configured otherwise
pub const DEFAULT_CREDENTIAL_ENV: &str = "PRIVATE_KEY";

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Ethereum,
    Arbitrum,
    Optimism,
    Polygon,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Ethereum,
        Network::Arbitrum,
        Network::Optimism,
        Network::Polygon,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => chains::ETHEREUM,
            Network::Arbitrum => chains::ARBITRUM,
            Network::Optimism => chains::OPTIMISM,
            Network::Polygon => chains::POLYGON,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Arbitrum => "arbitrum",
            Network::Optimism => "optimism",
            Network::Polygon => "polygon",
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|n| n.name() == lower || (lower == "mainnet" && *n == Network::Ethereum))
            .ok_or_else(|| Error::Config(format!("unsupported network: {}", s)))
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Uniswap V3 periphery contracts the executor talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub router: Address,
    pub quoter: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            router: addresses::UNISWAP_V3_ROUTER,
            quoter: addresses::UNISWAP_V3_QUOTER,
        }
    }
}

/// Which node answers quotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QuoteEndpoint {
    #[default]
    SameAsExecution,
    /// Quotes come from a different node, possibly a different network.
    /// Minimum outputs are then derived from state the swap will not execute
    /// against, so this must be acknowledged explicitly.
    Separate {
        url: String,
        #[serde(default)]
        acknowledge_state_divergence: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EndpointConfig {
    /// Overrides the `RpcConfig` resolution for the configured network
    #[serde(default)]
    pub execution_url: Option<String>,
    #[serde(default)]
    pub quote: QuoteEndpoint,
}

/// Endpoint URLs after env resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub execution: String,
    pub quote: String,
    /// Quote and execution state may differ
    pub divergent: bool,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: Network,
    /// Router and quoter overrides; canonical deployments when absent
    pub contracts: Option<ContractAddresses>,
    pub endpoints: EndpointConfig,
    pub gas: GasConfig,
    pub deadline_seconds: u64,
    pub confirmation_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    /// Simulate the swap with `eth_call` before signing
    pub preflight: bool,
    /// Name of the env var holding the signing key (the key itself is never in config)
    pub credential_env: String,
    /// Path to audit log file (JSONL)
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            contracts: None,
            endpoints: EndpointConfig::default(),
            gas: GasConfig::default(),
            deadline_seconds: 900,
            confirmation_timeout_seconds: 180,
            poll_interval_ms: 2_000,
            preflight: false,
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deadline_seconds == 0 {
            return Err(Error::Config("deadline_seconds must be positive".into()));
        }
        if self.gas.gas_limit() == 0 {
            return Err(Error::Config("gas limit must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.credential_env.trim().is_empty() {
            return Err(Error::Config("credential_env must name a variable".into()));
        }
        if let Some(url) = &self.endpoints.execution_url {
            check_url(url)?;
        }
        if let QuoteEndpoint::Separate {
            url,
            acknowledge_state_divergence,
        } = &self.endpoints.quote
        {
            check_url(url)?;
            if !acknowledge_state_divergence {
                return Err(Error::Config(
                    "quote endpoint differs from execution endpoint; set \
                     acknowledge_state_divergence to accept minimum outputs derived \
                     from another node's state"
                        .into(),
                ));
            }
        }
        Ok(())
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts.unwrap_or_default()
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    pub fn deadline_window(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resolve execution and quote URLs, falling back to `rpc` for execution
    pub fn resolve_endpoints(&self, rpc: &RpcConfig) -> Result<ResolvedEndpoints> {
        self.validate()?;

        let execution = match &self.endpoints.execution_url {
            Some(url) => url.clone(),
            None => rpc
                .resolve(self.chain_id())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Config(format!("no RPC endpoint for {}", self.network))
                })?,
        };

        let (quote, divergent) = match &self.endpoints.quote {
            QuoteEndpoint::SameAsExecution => (execution.clone(), false),
            QuoteEndpoint::Separate { url, .. } => (url.clone(), *url != execution),
        };

        Ok(ResolvedEndpoints {
            execution,
            quote,
            divergent,
        })
    }

    /// Copy safe to print: endpoint URLs reduced to scheme and host
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.endpoints.execution_url = copy.endpoints.execution_url.as_deref().map(redact_url);
        if let QuoteEndpoint::Separate { url, .. } = &mut copy.endpoints.quote {
            *url = redact_url(url);
        }
        copy
    }
}

fn check_url(raw: &str) -> Result<()> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("invalid endpoint URL ({}): {}", redact_url(raw), e)))
}

/// Hosted RPC URLs embed API keys in the path; keep only scheme and host
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => format!("{}://{}/…", url.scheme(), host),
            None => "<redacted>".to_string(),
        },
        Err(_) => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    fn rpc() -> RpcConfig {
        let mut urls = HashMap::new();
        urls.insert(chains::ETHEREUM, "https://eth.example/v2/secret".to_string());
        RpcConfig::with_urls(urls)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network, Network::Ethereum);
        assert_eq!(config.deadline_window(), Duration::from_secs(900));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.contracts().router, addresses::UNISWAP_V3_ROUTER);
        assert_eq!(config.gas.gas_limit(), 4_300_000);
        assert!(!config.preflight);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let value = serde_json::json!({
            "network": "arbitrum",
            "preflight": true,
            "gas": { "type": "eip1559", "gas_limit": 500000,
                     "max_fee_per_gas": 100, "max_priority_fee_per_gas": 1 }
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.network.chain_id(), 42161);
        assert!(parsed.preflight);
        assert_eq!(parsed.gas.gas_limit(), 500_000);
        assert_eq!(parsed.confirmation_timeout_seconds, 180);
        assert_eq!(parsed.endpoints.quote, QuoteEndpoint::SameAsExecution);
    }

    #[test]
    fn test_cross_network_requires_acknowledgement() {
        let mut config = Config::default();
        config.endpoints.quote = QuoteEndpoint::Separate {
            url: "https://other.example".into(),
            acknowledge_state_divergence: false,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.resolve_endpoints(&rpc()).is_err());

        config.endpoints.quote = QuoteEndpoint::Separate {
            url: "https://other.example".into(),
            acknowledge_state_divergence: true,
        };
        let resolved = config.resolve_endpoints(&rpc()).unwrap();
        assert!(resolved.divergent);
        assert_eq!(resolved.execution, "https://eth.example/v2/secret");
        assert_eq!(resolved.quote, "https://other.example");
    }

    #[test]
    fn test_same_endpoint_is_not_divergent() {
        let resolved = Config::default().resolve_endpoints(&rpc()).unwrap();
        assert!(!resolved.divergent);
        assert_eq!(resolved.quote, resolved.execution);
    }

    #[test]
    fn test_missing_rpc_is_config_error() {
        let mut config = Config::default();
        config.network = Network::Polygon;
        assert!(matches!(
            config.resolve_endpoints(&rpc()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.deadline_seconds = 0;
        assert_err!(config.validate());

        let mut config = Config::default();
        config.gas = GasConfig::Legacy {
            gas_limit: 0,
            gas_price: 1,
        };
        assert_err!(config.validate());

        let mut config = Config::default();
        config.endpoints.execution_url = Some("not a url".into());
        assert_err!(config.validate());
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "network": "optimism", "deadline_seconds": 60 }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network, Network::Optimism);
        assert_eq!(config.deadline_seconds, 60);

        assert_err!(Config::from_file("/nonexistent/config.json"));
    }

    #[test]
    fn test_from_file_with_gas_sections() {
        let mut legacy = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            legacy,
            r#"{{ "gas": {{ "type": "legacy", "gas_limit": 300000, "gas_price": 5000000000 }} }}"#
        )
        .unwrap();
        let config = assert_ok!(Config::from_file(legacy.path()));
        assert_eq!(
            config.gas,
            GasConfig::Legacy {
                gas_limit: 300_000,
                gas_price: 5_000_000_000,
            }
        );

        let mut dynamic = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            dynamic,
            r#"{{ "network": "arbitrum", "gas": {{ "type": "eip1559", "gas_limit": 500000,
                "max_fee_per_gas": 100000000, "max_priority_fee_per_gas": 1000000 }} }}"#
        )
        .unwrap();
        let config = assert_ok!(Config::from_file(dynamic.path()));
        assert_eq!(config.network, Network::Arbitrum);
        assert_eq!(
            config.gas,
            GasConfig::Eip1559 {
                gas_limit: 500_000,
                max_fee_per_gas: 100_000_000,
                max_priority_fee_per_gas: 1_000_000,
            }
        );
    }

    #[test]
    fn test_redaction_hides_url_paths() {
        let mut config = Config::default();
        config.endpoints.execution_url =
            Some("https://eth-mainnet.g.alchemy.com/v2/abc123secret".into());
        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("abc123secret"));
        assert!(shown.contains("eth-mainnet.g.alchemy.com"));
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("Polygon".parse::<Network>().unwrap(), Network::Polygon);
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Ethereum);
        assert!("base".parse::<Network>().is_err());
        assert_eq!(Network::from_chain_id(10), Some(Network::Optimism));
    }
}
