//! RPC endpoint configuration
//!
//! Each supported chain resolves its endpoint independently, following the
//! usual Ethereum tooling conventions:
//! 1. Per-chain env vars (ETH_RPC_URL, ARBITRUM_RPC_URL, ...) - highest priority
//! 2. Provider API keys (ALCHEMY_API_KEY, then INFURA_API_KEY)
//! 3. Public RPC fallbacks - rate limited, for testing only
//!
//! # Examples
//!
//! ```bash
//! # Per-chain URL (recommended for production)
//! export ETH_RPC_URL="https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY"
//!
//! # Or a single provider key for every chain
//! export ALCHEMY_API_KEY="YOUR_KEY"
//! ```

use crate::tokens::chains;
use std::collections::HashMap;

/// Environment variable names
mod env_vars {
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const ARBITRUM_RPC_URL: &str = "ARBITRUM_RPC_URL";
    pub const OPTIMISM_RPC_URL: &str = "OPTIMISM_RPC_URL";
    pub const POLYGON_RPC_URL: &str = "POLYGON_RPC_URL";

    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
}

mod public_rpcs {
    pub const ETHEREUM: &str = "https://eth.llamarpc.com";
    pub const ARBITRUM: &str = "https://arb1.arbitrum.io/rpc";
    pub const OPTIMISM: &str = "https://mainnet.optimism.io";
    pub const POLYGON: &str = "https://polygon-rpc.com";
}

/// Where a chain's URL came from; logged, never the URL itself (it may embed a key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    ChainEnv,
    Alchemy,
    Infura,
    Public,
}

struct ChainRpc {
    chain_id: u64,
    env_var: &'static str,
    alchemy_subdomain: &'static str,
    infura_subdomain: &'static str,
    public: &'static str,
}

const CHAINS: [ChainRpc; 4] = [
    ChainRpc {
        chain_id: chains::ETHEREUM,
        env_var: env_vars::ETH_RPC_URL,
        alchemy_subdomain: "eth-mainnet",
        infura_subdomain: "mainnet",
        public: public_rpcs::ETHEREUM,
    },
    ChainRpc {
        chain_id: chains::ARBITRUM,
        env_var: env_vars::ARBITRUM_RPC_URL,
        alchemy_subdomain: "arb-mainnet",
        infura_subdomain: "arbitrum-mainnet",
        public: public_rpcs::ARBITRUM,
    },
    ChainRpc {
        chain_id: chains::OPTIMISM,
        env_var: env_vars::OPTIMISM_RPC_URL,
        alchemy_subdomain: "opt-mainnet",
        infura_subdomain: "optimism-mainnet",
        public: public_rpcs::OPTIMISM,
    },
    ChainRpc {
        chain_id: chains::POLYGON,
        env_var: env_vars::POLYGON_RPC_URL,
        alchemy_subdomain: "polygon-mainnet",
        infura_subdomain: "polygon-mainnet",
        public: public_rpcs::POLYGON,
    },
];

/// RPC configuration for the supported chains
#[derive(Debug, Clone)]
pub struct RpcConfig {
    urls: HashMap<u64, (String, UrlSource)>,
}

impl RpcConfig {
    /// Resolve every supported chain from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Resolve every supported chain from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let alchemy = lookup(env_vars::ALCHEMY_API_KEY);
        let infura = lookup(env_vars::INFURA_API_KEY);

        let urls = CHAINS
            .iter()
            .map(|chain| {
                let resolved = if let Some(url) = lookup(chain.env_var) {
                    (url, UrlSource::ChainEnv)
                } else if let Some(key) = &alchemy {
                    (
                        format!("https://{}.g.alchemy.com/v2/{}", chain.alchemy_subdomain, key),
                        UrlSource::Alchemy,
                    )
                } else if let Some(key) = &infura {
                    (
                        format!("https://{}.infura.io/v3/{}", chain.infura_subdomain, key),
                        UrlSource::Infura,
                    )
                } else {
                    (chain.public.to_string(), UrlSource::Public)
                };
                (chain.chain_id, resolved)
            })
            .collect();

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self {
            urls: urls
                .into_iter()
                .map(|(chain_id, url)| (chain_id, (url, UrlSource::ChainEnv)))
                .collect(),
        }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|(url, _)| url.as_str())
    }

    pub fn source(&self, chain_id: u64) -> Option<UrlSource> {
        self.urls.get(&chain_id).map(|(_, source)| *source)
    }

    /// Get RPC URL for a chain, warning when only the public fallback is available
    pub fn resolve(&self, chain_id: u64) -> Option<&str> {
        match self.urls.get(&chain_id) {
            Some((url, UrlSource::Public)) => {
                tracing::warn!(
                    chain_id,
                    "No RPC configured, using public RPC (rate limited)"
                );
                Some(url.as_str())
            }
            Some((url, source)) => {
                tracing::debug!(chain_id, ?source, "Using configured RPC");
                Some(url.as_str())
            }
            None => None,
        }
    }

    /// Check if a chain is configured
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
