//! Shared token and contract registry
//!
//! Centralizes well-known addresses (tokens, Uniswap V3 periphery) so the CLI can
//! accept symbols and human-readable amounts.

use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::{address, Address, U256};
use std::collections::HashMap;

/// Token metadata
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    /// Token symbol (e.g., "USDC", "WETH")
    pub symbol: &'static str,
    /// Number of decimals
    pub decimals: u8,
}

impl TokenInfo {
    pub const fn new(symbol: &'static str, decimals: u8) -> Self {
        Self { symbol, decimals }
    }
}

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const ARBITRUM: u64 = 42161;
    pub const OPTIMISM: u64 = 10;
    pub const POLYGON: u64 = 137;
}

/// Well-known addresses per chain
pub mod addresses {
    use super::*;

    // === Uniswap V3 periphery (same address on every supported chain) ===
    pub const UNISWAP_V3_ROUTER: Address = address!("e592427a0aece92de3edee1f18e0157c05861564");
    pub const UNISWAP_V3_QUOTER: Address = address!("b27308f9f90d607463bb33ea1bebb41c27ce5ab6");

    // === Ethereum Mainnet ===
    pub const USDC_ETH: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    pub const USDT_ETH: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");
    pub const DAI_ETH: Address = address!("6b175474e89094c44da98b954eedeac495271d0f");
    pub const WETH_ETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    pub const WBTC_ETH: Address = address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599");
    pub const UNI_ETH: Address = address!("1f9840a85d5af5bf1d1762f925bdaddc4201f984");

    // === Arbitrum ===
    pub const USDC_ARB: Address = address!("af88d065e77c8cc2239327c5edb3a432268e5831");
    pub const USDT_ARB: Address = address!("fd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9");
    pub const DAI_ARB: Address = address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1");
    pub const WETH_ARB: Address = address!("82af49447d8a07e3bd95bd0d56f35241523fbab1");

    // === Optimism ===
    pub const USDC_OPT: Address = address!("0b2c639c533813f4aa9d7837caf62653d097ff85");
    pub const USDT_OPT: Address = address!("94b008aa00579c1307b0ef2c499ad98a8ce58e58");
    pub const WETH_OPT: Address = address!("4200000000000000000000000000000000000006");

    // === Polygon PoS ===
    pub const USDC_POLYGON: Address = address!("3c499c542cef5e3811e1192ce70d8cc03d5c3359");
    pub const DAI_POLYGON: Address = address!("8f3cf7ad23cd3cadbd9735aff958023239c6a063");
    pub const WETH_POLYGON: Address = address!("7ceb23fd6bc0add59e62ac25578270cff1b9f619");
    pub const WMATIC_POLYGON: Address = address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270");
}

/// Token registry providing symbol and decimals lookups
pub struct TokenRegistry {
    /// Token info by address (addresses are unique across supported chains)
    tokens: HashMap<Address, TokenInfo>,
    /// Symbol lookup per chain
    symbols: HashMap<(u64, &'static str), Address>,
}

impl TokenRegistry {
    /// Create a new token registry with all known tokens
    pub fn new() -> Self {
        use addresses::*;

        let entries: [(u64, Address, TokenInfo); 17] = [
            (chains::ETHEREUM, USDC_ETH, TokenInfo::new("USDC", 6)),
            (chains::ETHEREUM, USDT_ETH, TokenInfo::new("USDT", 6)),
            (chains::ETHEREUM, DAI_ETH, TokenInfo::new("DAI", 18)),
            (chains::ETHEREUM, WETH_ETH, TokenInfo::new("WETH", 18)),
            (chains::ETHEREUM, WBTC_ETH, TokenInfo::new("WBTC", 8)),
            (chains::ETHEREUM, UNI_ETH, TokenInfo::new("UNI", 18)),
            (chains::ARBITRUM, USDC_ARB, TokenInfo::new("USDC", 6)),
            (chains::ARBITRUM, USDT_ARB, TokenInfo::new("USDT", 6)),
            (chains::ARBITRUM, DAI_ARB, TokenInfo::new("DAI", 18)),
            (chains::ARBITRUM, WETH_ARB, TokenInfo::new("WETH", 18)),
            (chains::OPTIMISM, USDC_OPT, TokenInfo::new("USDC", 6)),
            (chains::OPTIMISM, USDT_OPT, TokenInfo::new("USDT", 6)),
            (chains::OPTIMISM, WETH_OPT, TokenInfo::new("WETH", 18)),
            (chains::POLYGON, USDC_POLYGON, TokenInfo::new("USDC", 6)),
            (chains::POLYGON, DAI_POLYGON, TokenInfo::new("DAI", 18)),
            (chains::POLYGON, WETH_POLYGON, TokenInfo::new("WETH", 18)),
            (chains::POLYGON, WMATIC_POLYGON, TokenInfo::new("WMATIC", 18)),
        ];

        let mut tokens = HashMap::new();
        let mut symbols = HashMap::new();
        for (chain_id, addr, info) in entries {
            tokens.insert(addr, info);
            symbols.insert((chain_id, info.symbol), addr);
        }

        Self { tokens, symbols }
    }

    /// Get token info by address
    pub fn get(&self, address: &Address) -> Option<&TokenInfo> {
        self.tokens.get(address)
    }

    /// Resolve a token argument: a hex address, or a known symbol on the chain
    pub fn resolve(&self, chain_id: u64, token: &str) -> Option<Address> {
        if let Ok(addr) = token.parse::<Address>() {
            return Some(addr);
        }
        let symbol = token.to_ascii_uppercase();
        self.symbols
            .iter()
            .find(|((chain, sym), _)| *chain == chain_id && *sym == symbol)
            .map(|(_, addr)| *addr)
    }

    /// Scale a human-readable amount ("1.5") by the token's decimals
    ///
    /// Returns None for unknown tokens, negative or unparseable amounts.
    pub fn to_base_units(&self, token: &Address, amount: &str) -> Option<U256> {
        let info = self.tokens.get(token)?;
        match parse_units(amount, info.decimals).ok()? {
            ParseUnits::U256(value) => Some(value),
            ParseUnits::I256(_) => None,
        }
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global token registry (lazy initialized)
static REGISTRY: std::sync::OnceLock<TokenRegistry> = std::sync::OnceLock::new();

/// Get the global token registry
pub fn registry() -> &'static TokenRegistry {
    REGISTRY.get_or_init(TokenRegistry::new)
}
