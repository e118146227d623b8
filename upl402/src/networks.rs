//! Well-known Solana clusters and their public RPC endpoints.

/// Metadata for a known Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Cluster name as it appears in payment requirements (e.g. `devnet`).
    pub name: &'static str,
    /// Default public JSON-RPC endpoint.
    pub rpc_url: &'static str,
}

/// The Solana clusters this SDK knows out of the box.
///
/// A caller-supplied RPC URL always takes precedence; this table only
/// provides fallbacks for the standard cluster names.
pub static SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "mainnet-beta",
        rpc_url: "https://api.mainnet-beta.solana.com",
    },
    NetworkInfo {
        name: "devnet",
        rpc_url: "https://api.devnet.solana.com",
    },
    NetworkInfo {
        name: "testnet",
        rpc_url: "https://api.testnet.solana.com",
    },
];

/// Returns the default RPC endpoint for a known cluster name.
#[must_use]
pub fn default_rpc_url(network: &str) -> Option<&'static str> {
    SOLANA_NETWORKS
        .iter()
        .find(|n| n.name == network)
        .map(|n| n.rpc_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_clusters_resolve() {
        assert_eq!(
            default_rpc_url("mainnet-beta"),
            Some("https://api.mainnet-beta.solana.com")
        );
        assert_eq!(
            default_rpc_url("devnet"),
            Some("https://api.devnet.solana.com")
        );
    }

    #[test]
    fn test_unknown_cluster_is_none() {
        assert_eq!(default_rpc_url("localnet"), None);
    }
}
