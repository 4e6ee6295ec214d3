use serde::{Deserialize, Serialize};

/// Chains a session can settle to.
///
/// Registry data (chain id, USDC token address, CCTP domain) mirrors the
/// deployed token contracts on each network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Chain {
    Ethereum,
    #[default]
    Polygon,
    Arbitrum,
    Base,
    Sepolia,
    ArcTestnet,
}

impl Chain {
    /// All supported settlement targets
    pub fn all() -> [Chain; 6] {
        [
            Chain::Ethereum,
            Chain::Polygon,
            Chain::Arbitrum,
            Chain::Base,
            Chain::Sepolia,
            Chain::ArcTestnet,
        ]
    }

    /// Get display name for the chain
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Polygon => "Polygon",
            Chain::Arbitrum => "Arbitrum One",
            Chain::Base => "Base",
            Chain::Sepolia => "Sepolia (Testnet)",
            Chain::ArcTestnet => "Arc Testnet",
        }
    }

    /// Registry key, matching the wire/profile-record spelling
    pub fn key(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Sepolia => "sepolia",
            Chain::ArcTestnet => "arcTestnet",
        }
    }

    /// Parse a registry key; `None` for unknown chains
    pub fn from_key(key: &str) -> Option<Chain> {
        match key {
            "ethereum" => Some(Chain::Ethereum),
            "polygon" => Some(Chain::Polygon),
            "arbitrum" => Some(Chain::Arbitrum),
            "base" => Some(Chain::Base),
            "sepolia" => Some(Chain::Sepolia),
            "arcTestnet" => Some(Chain::ArcTestnet),
            _ => None,
        }
    }

    /// EVM chain id
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Polygon => 137,
            Chain::Arbitrum => 42161,
            Chain::Base => 8453,
            Chain::Sepolia => 11155111,
            Chain::ArcTestnet => 5042002,
        }
    }

    /// USDC token contract on this chain
    pub fn usdc_address(&self) -> &'static str {
        match self {
            Chain::Ethereum => "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            Chain::Polygon => "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359",
            Chain::Arbitrum => "0xaf88d065e77c8cc2239327c5edb3a432268e5831",
            Chain::Base => "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
            Chain::Sepolia => "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238",
            Chain::ArcTestnet => "0x3600000000000000000000000000000000000000",
        }
    }

    /// CCTP message-passing domain for burn/mint routing
    pub fn cctp_domain(&self) -> u32 {
        match self {
            Chain::Ethereum => 0,
            Chain::Polygon => 7,
            Chain::Arbitrum => 3,
            Chain::Base => 6,
            Chain::Sepolia => 0,
            Chain::ArcTestnet => 26,
        }
    }

    /// Block-explorer URL for a transaction reference
    pub fn explorer_tx_url(&self, tx: &str) -> String {
        let prefix = match self {
            Chain::Ethereum => "https://etherscan.io/tx/",
            Chain::Polygon => "https://polygonscan.com/tx/",
            Chain::Arbitrum => "https://arbiscan.io/tx/",
            Chain::Base => "https://basescan.org/tx/",
            Chain::Sepolia => "https://sepolia.etherscan.io/tx/",
            Chain::ArcTestnet => "https://testnet.arcscan.app/tx/",
        };
        format!("{prefix}{tx}")
    }

    /// Advisory bridge-duration estimate for UX display only; never used
    /// to bound settlement success or failure.
    pub fn bridge_estimate(source: Chain, destination: Chain) -> &'static str {
        if source == Chain::ArcTestnet || destination == Chain::ArcTestnet {
            "< 1 minute"
        } else {
            "10-20 minutes"
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
