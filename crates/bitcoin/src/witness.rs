//! Witness stacks for the two HTLC branches.
//!
//! The element just below the script selects the `OP_IF` branch: `0x01` for
//! the claim, an empty element for the refund.

use bitcoin::{ecdsa, PublicKey, Script, Witness};

/// Canonical true for `OP_IF`.
const BRANCH_TRUE: [u8; 1] = [0x01];

/// Canonical false for `OP_IF`.
const BRANCH_FALSE: [u8; 0] = [];

/// Creates the claim witness that reveals the secret.
///
/// # Returns
/// Witness stack: `[sig, pubkey, secret, 0x01, script]`
#[must_use]
pub fn claim_witness(
    sig: &ecdsa::Signature,
    pubkey: &PublicKey,
    secret: &[u8],
    script: &Script,
) -> Witness {
    let mut witness = Witness::new();
    witness.push(sig.to_vec());
    witness.push(pubkey.to_bytes());
    witness.push(secret);
    witness.push(BRANCH_TRUE);
    witness.push(script.as_bytes());
    witness
}

/// Creates the refund witness for spending after the locktime.
///
/// # Returns
/// Witness stack: `[sig, pubkey, <empty>, script]`
#[must_use]
pub fn refund_witness(sig: &ecdsa::Signature, pubkey: &PublicKey, script: &Script) -> Witness {
    let mut witness = Witness::new();
    witness.push(sig.to_vec());
    witness.push(pubkey.to_bytes());
    witness.push(BRANCH_FALSE);
    witness.push(script.as_bytes());
    witness
}
