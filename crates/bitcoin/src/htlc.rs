//! HTLC redeem script and P2WSH funding address.
//!
//! The customer claims by revealing the secret behind the image; the broker
//! takes the funds back once the absolute locktime has passed. Both branches
//! end in a pay-to-pubkey-hash check, so the script commits to `HASH160` of
//! each identity rather than the raw key.

use bitcoin::{
    absolute::LockTime,
    hashes::{ripemd160, Hash},
    opcodes::all::{
        OP_CHECKSIG, OP_CLTV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_HASH160,
        OP_IF,
    },
    script::Builder,
    Address, PublicKey, Script, ScriptBuf,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::network::NetworkConfig;
use crate::{HtlcError, Result};

/// Length of the image the builder hashes into the script.
pub const IMAGE_LEN: usize = 32;

/// Length of a compressed secp256k1 public key.
const COMPRESSED_KEY_LEN: usize = 33;

/// Length of an uncompressed secp256k1 public key.
const UNCOMPRESSED_KEY_LEN: usize = 65;

/// A validated HTLC definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    /// `RIPEMD160(image)`, equal to `HASH160(secret)` for the claim secret.
    pub image_hash: ripemd160::Hash,
    /// Key that claims with the secret.
    pub customer: PublicKey,
    /// Key that refunds after `locktime`.
    pub broker: PublicKey,
    /// Absolute locktime gating the refund branch.
    pub locktime: LockTime,
}

impl Contract {
    /// Validates the raw contract parameters.
    ///
    /// # Arguments
    /// * `image` - SHA256 of the claim secret (32 bytes)
    /// * `broker` - Serialized public key of the refunding party
    /// * `customer` - Serialized public key of the claiming party
    /// * `locktime` - Block height or timestamp, CLTV semantics
    ///
    /// # Errors
    /// Returns `HtlcError::InvalidImageLength` for an image that is not
    /// 32 bytes, `HtlcError::InvalidIdentityLength` for a key that is not
    /// 33 or 65 bytes, and `HtlcError::InvalidIdentity` for bytes that do not
    /// decode to a curve point.
    pub fn new(image: &[u8], broker: &[u8], customer: &[u8], locktime: u32) -> Result<Self> {
        if image.len() != IMAGE_LEN {
            return Err(HtlcError::InvalidImageLength(image.len()));
        }
        let broker = parse_identity("broker", broker)?;
        let customer = parse_identity("customer", customer)?;

        Ok(Self {
            image_hash: ripemd160::Hash::hash(image),
            customer,
            broker,
            locktime: LockTime::from_consensus(locktime),
        })
    }

    /// Emits the two-branch redeem script.
    ///
    /// ```text
    /// OP_IF
    ///   OP_HASH160 <image_hash> OP_EQUALVERIFY OP_DUP OP_HASH160 <customer_pkh>
    /// OP_ELSE
    ///   <locktime> OP_CLTV OP_DROP OP_DUP OP_HASH160 <broker_pkh>
    /// OP_ENDIF
    /// OP_EQUALVERIFY OP_CHECKSIG
    /// ```
    #[must_use]
    pub fn redeem_script(&self) -> ScriptBuf {
        Builder::new()
            .push_opcode(OP_IF)
            .push_opcode(OP_HASH160)
            .push_slice(self.image_hash.to_byte_array())
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(self.customer.pubkey_hash().to_byte_array())
            .push_opcode(OP_ELSE)
            .push_int(i64::from(self.locktime.to_consensus_u32()))
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(self.broker.pubkey_hash().to_byte_array())
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// P2WSH address committing to this contract's redeem script.
    #[must_use]
    pub fn address(&self, config: NetworkConfig) -> Address {
        Address::p2wsh(&self.redeem_script(), config.network())
    }
}

/// Builds redeem scripts and funding addresses for one network.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractScriptBuilder {
    config: NetworkConfig,
}

impl ContractScriptBuilder {
    /// Creates a builder for the given network.
    #[must_use]
    pub const fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    /// The network addresses are derived for.
    #[must_use]
    pub const fn config(&self) -> NetworkConfig {
        self.config
    }

    /// Builds the HTLC redeem script from raw contract parameters.
    ///
    /// The image is hashed here with RIPEMD160; callers pass the SHA256
    /// image of the secret, never the 20-byte commitment itself.
    ///
    /// # Errors
    /// See [`Contract::new`].
    #[instrument(level = "debug", skip_all, fields(locktime = locktime))]
    pub fn build_redeem_script(
        &self,
        image: &[u8],
        broker: &[u8],
        customer: &[u8],
        locktime: u32,
    ) -> Result<ScriptBuf> {
        let contract = Contract::new(image, broker, customer, locktime)?;
        let script = contract.redeem_script();
        debug!(
            image_hash = %contract.image_hash,
            script_len = script.len(),
            "built redeem script"
        );
        Ok(script)
    }

    /// Derives the P2WSH address for a redeem script.
    ///
    /// The witness program is `SHA256(script)`; identical scripts always give
    /// identical addresses, so both counterparties can derive the funding
    /// destination independently.
    #[must_use]
    pub fn derive_address(&self, script: &Script) -> Address {
        let address = Address::p2wsh(script, self.config.network());
        debug!(%address, network = %self.config, "derived funding address");
        address
    }
}

/// Computes the image for a claim secret: `SHA256(secret)`.
///
/// `HASH160(secret)` in the claim branch then equals `RIPEMD160(image)`.
#[must_use]
pub fn image_from_secret(secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.finalize().into()
}

fn parse_identity(role: &'static str, bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != COMPRESSED_KEY_LEN && bytes.len() != UNCOMPRESSED_KEY_LEN {
        return Err(HtlcError::InvalidIdentityLength {
            role,
            len: bytes.len(),
        });
    }
    PublicKey::from_slice(bytes).map_err(|e| HtlcError::InvalidIdentity {
        role,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::hash160;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    fn test_key(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::new(sk.public_key(&secp))
    }

    fn test_script(locktime: u32) -> ScriptBuf {
        let image = image_from_secret(b"secret");
        ContractScriptBuilder::new(NetworkConfig::regtest())
            .build_redeem_script(
                &image,
                &test_key(0x0b).to_bytes(),
                &test_key(0x0c).to_bytes(),
                locktime,
            )
            .unwrap()
    }

    #[test]
    fn script_layout_matches_template() {
        let script = test_script(700_000);
        let bytes = script.as_bytes();

        assert_eq!(bytes.len(), 80);
        // OP_IF OP_HASH160 PUSH20
        assert_eq!(&bytes[..3], &[0x63, 0xa9, 0x14]);
        // OP_EQUALVERIFY OP_DUP OP_HASH160 PUSH20
        assert_eq!(&bytes[23..27], &[0x88, 0x76, 0xa9, 0x14]);
        // OP_ELSE PUSH3 <700000 LE> OP_CLTV OP_DROP OP_DUP OP_HASH160 PUSH20
        assert_eq!(
            &bytes[47..57],
            &[0x67, 0x03, 0x60, 0xae, 0x0a, 0xb1, 0x75, 0x76, 0xa9, 0x14]
        );
        // OP_ENDIF OP_EQUALVERIFY OP_CHECKSIG
        assert_eq!(&bytes[77..], &[0x68, 0x88, 0xac]);
    }

    #[test]
    fn script_commits_to_identity_hashes() {
        let script = test_script(700_000);
        let bytes = script.as_bytes();

        let customer_pkh = hash160::Hash::hash(&test_key(0x0c).to_bytes());
        let broker_pkh = hash160::Hash::hash(&test_key(0x0b).to_bytes());

        assert_eq!(&bytes[27..47], customer_pkh.as_byte_array());
        assert_eq!(&bytes[57..77], broker_pkh.as_byte_array());
    }

    #[test]
    fn image_hash_equals_hash160_of_secret() {
        let script = test_script(144);
        let expected = hash160::Hash::hash(b"secret");

        assert_eq!(&script.as_bytes()[3..23], expected.as_byte_array());
    }

    #[test]
    fn contract_stores_ripemd160_of_image() {
        let image = image_from_secret(b"secret");
        let contract = Contract::new(
            &image,
            &test_key(0x0b).to_bytes(),
            &test_key(0x0c).to_bytes(),
            700_000,
        )
        .unwrap();

        assert_eq!(contract.image_hash, ripemd160::Hash::hash(&image));
        assert_eq!(contract.locktime, LockTime::from_consensus(700_000));
    }

    #[test]
    fn script_is_deterministic() {
        assert_eq!(test_script(700_000), test_script(700_000));
        assert_ne!(test_script(700_000), test_script(700_001));
    }

    #[test]
    fn address_is_deterministic_p2wsh() {
        let builder = ContractScriptBuilder::new(NetworkConfig::regtest());
        let script = test_script(700_000);

        let first = builder.derive_address(&script);
        let second = builder.derive_address(&script);

        assert_eq!(first, second);
        assert!(first.script_pubkey().is_p2wsh());
        assert!(first.to_string().starts_with("bcrt1q"));
    }

    #[test]
    fn address_program_is_sha256_of_script() {
        let builder = ContractScriptBuilder::new(NetworkConfig::mainnet());
        let script = test_script(700_000);
        let address = builder.derive_address(&script);

        let program = image_from_secret(script.as_bytes());
        let spk = address.script_pubkey();
        // OP_0 PUSH32 <sha256(script)>
        assert_eq!(&spk.as_bytes()[..2], &[0x00, 0x20]);
        assert_eq!(&spk.as_bytes()[2..], &program);
        assert!(address.to_string().starts_with("bc1q"));
    }

    #[test]
    fn address_prefix_follows_network() {
        let script = test_script(700_000);
        let testnet = ContractScriptBuilder::new(NetworkConfig::testnet()).derive_address(&script);

        assert!(testnet.to_string().starts_with("tb1q"));
    }

    #[test]
    fn contract_address_matches_builder() {
        let image = image_from_secret(b"secret");
        let contract = Contract::new(
            &image,
            &test_key(0x0b).to_bytes(),
            &test_key(0x0c).to_bytes(),
            700_000,
        )
        .unwrap();
        let builder = ContractScriptBuilder::new(NetworkConfig::regtest());

        assert_eq!(
            contract.address(NetworkConfig::regtest()),
            builder.derive_address(&contract.redeem_script())
        );
    }

    #[test]
    fn rejects_wrong_image_length() {
        let builder = ContractScriptBuilder::default();
        let err = builder
            .build_redeem_script(
                b"secret",
                &test_key(0x0b).to_bytes(),
                &test_key(0x0c).to_bytes(),
                700_000,
            )
            .unwrap_err();

        assert_eq!(err, HtlcError::InvalidImageLength(6));
    }

    #[test]
    fn rejects_identity_hash_instead_of_key() {
        let builder = ContractScriptBuilder::default();
        let image = image_from_secret(b"secret");
        let pkh = hash160::Hash::hash(&test_key(0x0b).to_bytes());

        let err = builder
            .build_redeem_script(&image, pkh.as_byte_array(), &test_key(0x0c).to_bytes(), 1)
            .unwrap_err();

        assert_eq!(
            err,
            HtlcError::InvalidIdentityLength {
                role: "broker",
                len: 20
            }
        );
    }

    #[test]
    fn rejects_invalid_point() {
        let builder = ContractScriptBuilder::default();
        let image = image_from_secret(b"secret");
        let mut bogus = [0u8; 33];
        bogus[0] = 0x05;

        let err = builder
            .build_redeem_script(&image, &test_key(0x0b).to_bytes(), &bogus, 1)
            .unwrap_err();

        assert!(matches!(
            err,
            HtlcError::InvalidIdentity {
                role: "customer",
                ..
            }
        ));
    }

    #[test]
    fn accepts_uncompressed_identity() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x0d; 32]).unwrap();
        let uncompressed = sk.public_key(&secp).serialize_uncompressed();
        let image = image_from_secret(b"secret");

        let contract = Contract::new(&image, &uncompressed, &test_key(0x0c).to_bytes(), 1).unwrap();

        assert!(!contract.broker.compressed);
        assert_eq!(
            contract.broker.pubkey_hash().to_byte_array(),
            hash160::Hash::hash(&uncompressed).to_byte_array()
        );
    }

    #[test]
    fn image_from_secret_is_sha256() {
        let image = image_from_secret(b"secret");
        let mut hasher = Sha256::new();
        hasher.update(b"secret");
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(image, expected);
    }
}
