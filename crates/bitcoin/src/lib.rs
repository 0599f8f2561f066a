//! P2WSH hash time-locked contracts on Bitcoin.
//!
//! Builds the two-branch HTLC redeem script and its P2WSH funding address,
//! and assembles claim or refund spends with a BIP143 signature over the
//! redeem script and the funded amount.

use thiserror::Error;

pub mod anchor;
pub mod htlc;
pub mod network;
pub mod spend;
pub mod witness;

pub use anchor::Anchor;
pub use htlc::{Contract, ContractScriptBuilder};
pub use network::NetworkConfig;
pub use spend::{SignedSpend, SpendAssembler, SpendIntent, SpendPlan, SpendRequest, WitnessMode};

/// Errors that can occur while building or spending a contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HtlcError {
    /// Signing key is not valid WIF for the configured network.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Funding reference is not a `txid:index:amount` triple.
    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),

    /// Redeem script could not be decoded.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Identity public key has the wrong length.
    #[error("invalid {role} identity length: expected 33 or 65 bytes, got {len}")]
    InvalidIdentityLength {
        /// Which party the key belongs to.
        role: &'static str,
        /// Length of the supplied key.
        len: usize,
    },

    /// Identity bytes are not a valid public key.
    #[error("invalid {role} identity: {reason}")]
    InvalidIdentity {
        /// Which party the key belongs to.
        role: &'static str,
        /// Underlying parse failure.
        reason: String,
    },

    /// Image is not a 32-byte SHA256 digest.
    #[error("invalid image length: expected 32 bytes, got {0}")]
    InvalidImageLength(usize),

    /// Destination address is malformed or for another network.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Claim secret is empty or too large to push.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// Network name is not recognized.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// Sighash computation or signing failed.
    #[error("signing failure: {0}")]
    SigningFailure(String),
}

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, HtlcError>;
