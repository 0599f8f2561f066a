//! Network selection.
//!
//! Address prefixes and WIF version bytes depend on the network, so every
//! component takes a `NetworkConfig` at construction instead of reading
//! process-wide state.

use std::fmt;
use std::str::FromStr;

use bitcoin::{Network, NetworkKind};

use crate::{HtlcError, Result};

/// The network a contract is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkConfig {
    network: Network,
}

impl NetworkConfig {
    /// Wraps a rust-bitcoin network.
    #[must_use]
    pub const fn new(network: Network) -> Self {
        Self { network }
    }

    /// Bitcoin mainnet.
    #[must_use]
    pub const fn mainnet() -> Self {
        Self::new(Network::Bitcoin)
    }

    /// Bitcoin testnet3.
    #[must_use]
    pub const fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    /// Local regtest.
    #[must_use]
    pub const fn regtest() -> Self {
        Self::new(Network::Regtest)
    }

    /// The underlying network.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Mainnet or test, as encoded in WIF keys.
    #[must_use]
    pub fn kind(&self) -> NetworkKind {
        NetworkKind::from(self.network)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl From<Network> for NetworkConfig {
    fn from(network: Network) -> Self {
        Self::new(network)
    }
}

impl FromStr for NetworkConfig {
    type Err = HtlcError;

    fn from_str(s: &str) -> Result<Self> {
        let network = match s.to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" => Network::Bitcoin,
            "testnet" => Network::Testnet,
            "signet" => Network::Signet,
            "regtest" => Network::Regtest,
            _ => return Err(HtlcError::UnknownNetwork(s.to_string())),
        };
        Ok(Self::new(network))
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.network {
            Network::Bitcoin => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
            _ => "unknown",
        };
        f.write_str(name)
    }
}
