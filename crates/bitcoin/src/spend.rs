//! Claim and refund spends of a funded HTLC output.
//!
//! Builds a one-input, one-output transaction, computes the BIP143 sighash
//! over the redeem script and the anchor amount, and attaches the witness
//! for the chosen branch. In unsigned mode the skeleton and its sighash are
//! returned so another party can sign out-of-band.
//!
//! Nothing here checks the spend against chain state: a refund built before
//! its locktime has matured is well-formed but will be rejected by the
//! network. Checking maturity is the caller's job.

use bitcoin::{
    absolute::LockTime,
    address::NetworkUnchecked,
    consensus::encode::serialize_hex,
    ecdsa,
    hashes::Hash,
    secp256k1::{self, Message, Secp256k1},
    sighash::{EcdsaSighashType, SegwitV0Sighash, SighashCache},
    transaction::Version,
    Address, Amount, OutPoint, PrivateKey, PublicKey, Script, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, Witness,
};
use tracing::{debug, instrument};

use crate::anchor::Anchor;
use crate::network::NetworkConfig;
use crate::witness::{claim_witness, refund_witness};
use crate::{HtlcError, Result};

/// Index of the contract input in every spend built here.
const CONTRACT_INPUT: usize = 0;

/// Largest element a witness script may push.
pub const MAX_SECRET_LEN: usize = 520;

/// Which branch of the contract a spend takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendIntent {
    /// Customer path: reveal the secret behind the image.
    Claim {
        /// The secret whose HASH160 the script checks.
        secret: Vec<u8>,
    },
    /// Broker path: spend after the contract locktime.
    Refund {
        /// Must be at or past the script's CLTV value.
        locktime: LockTime,
    },
}

impl SpendIntent {
    /// Claim with the given secret.
    #[must_use]
    pub fn claim(secret: impl Into<Vec<u8>>) -> Self {
        Self::Claim {
            secret: secret.into(),
        }
    }

    /// Refund at the given block height or timestamp.
    #[must_use]
    pub fn refund(locktime: u32) -> Self {
        Self::Refund {
            locktime: LockTime::from_consensus(locktime),
        }
    }

    /// Checks the intent can produce a pushable witness.
    ///
    /// # Errors
    /// Returns `HtlcError::InvalidSecret` for an empty claim secret, which
    /// would read as the refund marker, or one larger than a script element.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Claim { secret } if secret.is_empty() => {
                Err(HtlcError::InvalidSecret("secret is empty".to_string()))
            }
            Self::Claim { secret } if secret.len() > MAX_SECRET_LEN => {
                Err(HtlcError::InvalidSecret(format!(
                    "secret is {} bytes, max {MAX_SECRET_LEN}",
                    secret.len()
                )))
            }
            _ => Ok(()),
        }
    }

    fn branch(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Refund { .. } => "refund",
        }
    }
}

/// Whether to sign and attach a witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WitnessMode {
    /// Sign with the request key and attach the branch witness.
    #[default]
    Signed,
    /// Return the skeleton without a witness, for out-of-band signing.
    Unsigned,
}

/// A spend request in its external text forms.
#[derive(Debug, Clone)]
pub struct SpendRequest<'a> {
    /// WIF-encoded signing key.
    pub key: &'a str,
    /// Hex-encoded redeem script.
    pub script: &'a str,
    /// `txid:index:amount` funding reference.
    pub anchor: &'a str,
    /// Destination address.
    pub destination: &'a str,
    /// Amount paid to the destination. The difference from the anchor
    /// amount is the fee.
    pub value: Amount,
    /// Branch to take.
    pub intent: SpendIntent,
    /// Signed or unsigned output.
    pub mode: WitnessMode,
}

/// A spend request with every input parsed and validated.
#[derive(Debug, Clone)]
pub struct SpendPlan {
    /// Signing key.
    pub key: PrivateKey,
    /// Redeem script committed to by the anchor output.
    pub script: ScriptBuf,
    /// Output being spent.
    pub anchor: Anchor,
    /// Destination address, checked against the configured network.
    pub destination: Address,
    /// Amount paid to the destination.
    pub value: Amount,
    /// Branch to take.
    pub intent: SpendIntent,
    /// Signed or unsigned output.
    pub mode: WitnessMode,
}

/// An assembled spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSpend {
    /// The spending transaction; its witness is empty in unsigned mode.
    pub transaction: Transaction,
    /// Segwit v0 `SIGHASH_ALL` digest of the contract input.
    pub sighash: SegwitV0Sighash,
}

impl SignedSpend {
    /// Whether the contract input carries a witness.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.transaction.input[CONTRACT_INPUT].witness.is_empty()
    }

    /// Transaction ID (unaffected by the witness).
    #[must_use]
    pub fn txid(&self) -> Txid {
        self.transaction.compute_txid()
    }

    /// Serializes the transaction to hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        tx_to_hex(&self.transaction)
    }
}

/// Assembles claim and refund spends for one network.
#[derive(Debug, Clone)]
pub struct SpendAssembler {
    config: NetworkConfig,
    secp: Secp256k1<secp256k1::All>,
}

impl SpendAssembler {
    /// Creates an assembler for the given network.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            secp: Secp256k1::new(),
        }
    }

    /// The network keys and addresses are checked against.
    #[must_use]
    pub const fn config(&self) -> NetworkConfig {
        self.config
    }

    /// Parses and assembles a spend in one step.
    ///
    /// # Errors
    /// Any parse error from [`SpendAssembler::plan`], or
    /// `HtlcError::SigningFailure` from [`SpendAssembler::assemble`].
    pub fn assemble_spend(&self, request: &SpendRequest<'_>) -> Result<SignedSpend> {
        let plan = self.plan(request)?;
        self.assemble(&plan)
    }

    /// Parses every input of a request before any signing work.
    ///
    /// Inputs are checked in order: key, anchor, script, destination,
    /// intent. The first failure is returned.
    ///
    /// # Errors
    /// Returns `InvalidKey`, `InvalidAnchor`, `InvalidScript`,
    /// `InvalidAddress` or `InvalidSecret`.
    pub fn plan(&self, request: &SpendRequest<'_>) -> Result<SpendPlan> {
        let key = self.parse_key(request.key)?;
        let anchor: Anchor = request.anchor.parse()?;
        let script = parse_redeem_script(request.script)?;
        let destination = self.parse_destination(request.destination)?;
        request.intent.validate()?;

        debug!(%anchor, script_len = script.len(), "parsed spend request");

        Ok(SpendPlan {
            key,
            script,
            anchor,
            destination,
            value: request.value,
            intent: request.intent.clone(),
            mode: request.mode,
        })
    }

    /// Builds, and in signed mode signs, the spending transaction.
    ///
    /// Deterministic: the same plan always yields the same transaction.
    ///
    /// # Errors
    /// Returns `HtlcError::SigningFailure` if the sighash cannot be computed
    /// or the produced signature does not verify under the plan's key.
    #[instrument(
        level = "debug",
        skip_all,
        fields(network = %self.config, branch = plan.intent.branch(), mode = ?plan.mode)
    )]
    pub fn assemble(&self, plan: &SpendPlan) -> Result<SignedSpend> {
        plan.intent.validate()?;

        let mut tx = build_spending_tx(
            plan.anchor.outpoint(),
            plan.destination.script_pubkey(),
            plan.value,
        );
        if let SpendIntent::Refund { locktime } = &plan.intent {
            apply_locktime(&mut tx, *locktime);
        }

        let sighash = compute_segwit_sighash(&tx, CONTRACT_INPUT, &plan.script, plan.anchor.amount)?;
        debug!(txid = %tx.compute_txid(), %sighash, "computed contract sighash");

        if plan.mode == WitnessMode::Unsigned {
            return Ok(SignedSpend {
                transaction: tx,
                sighash,
            });
        }

        let pubkey = plan.key.public_key(&self.secp);
        let signature = self.sign(&plan.key, &pubkey, sighash)?;
        attach_signature(&mut tx, &plan.intent, &signature, &pubkey, &plan.script)?;

        Ok(SignedSpend {
            transaction: tx,
            sighash,
        })
    }

    fn sign(
        &self,
        key: &PrivateKey,
        pubkey: &PublicKey,
        sighash: SegwitV0Sighash,
    ) -> Result<ecdsa::Signature> {
        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = self.secp.sign_ecdsa(&msg, &key.inner);
        self.secp
            .verify_ecdsa(&msg, &signature, &pubkey.inner)
            .map_err(|e| HtlcError::SigningFailure(format!("signature does not verify: {e}")))?;

        Ok(ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        })
    }

    fn parse_key(&self, wif: &str) -> Result<PrivateKey> {
        let key = PrivateKey::from_wif(wif).map_err(|e| HtlcError::InvalidKey(e.to_string()))?;
        if key.network != self.config.kind() {
            return Err(HtlcError::InvalidKey(format!(
                "key is not for {}",
                self.config
            )));
        }
        Ok(key)
    }

    fn parse_destination(&self, address: &str) -> Result<Address> {
        address
            .parse::<Address<NetworkUnchecked>>()
            .map_err(|e| HtlcError::InvalidAddress(e.to_string()))?
            .require_network(self.config.network())
            .map_err(|e| HtlcError::InvalidAddress(e.to_string()))
    }
}

/// Decodes a hex redeem script.
///
/// # Errors
/// Returns `HtlcError::InvalidScript` for bad hex or an empty script.
pub fn parse_redeem_script(script_hex: &str) -> Result<ScriptBuf> {
    let bytes = hex::decode(script_hex).map_err(|e| HtlcError::InvalidScript(e.to_string()))?;
    if bytes.is_empty() {
        return Err(HtlcError::InvalidScript("script is empty".to_string()));
    }
    Ok(ScriptBuf::from_bytes(bytes))
}

/// Builds a simple spending transaction (1 input, 1 output).
///
/// The input sequence is final and the locktime zero; see
/// [`apply_locktime`] for the refund branch.
///
/// # Arguments
/// * `prevout` - The contract output being spent
/// * `dest_script_pubkey` - Destination script
/// * `dest_amount` - Amount to send (caller must account for fees)
#[must_use]
pub fn build_spending_tx(
    prevout: OutPoint,
    dest_script_pubkey: ScriptBuf,
    dest_amount: Amount,
) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: prevout,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: dest_amount,
            script_pubkey: dest_script_pubkey,
        }],
    }
}

/// Sets the transaction locktime and makes every input non-final.
///
/// `OP_CHECKLOCKTIMEVERIFY` fails if the spending input's sequence is final,
/// since the locktime would then be ignored.
pub fn apply_locktime(tx: &mut Transaction, locktime: LockTime) {
    tx.lock_time = locktime;
    for input in &mut tx.input {
        input.sequence = Sequence::ZERO;
    }
}

/// Computes the segwit v0 (BIP143) `SIGHASH_ALL` digest for a P2WSH input.
///
/// The digest commits to the redeem script and the amount of the output
/// being spent, not to its on-chain `OP_0 <hash>` script pubkey.
///
/// # Errors
/// Returns `HtlcError::SigningFailure` if `input_index` is out of range.
pub fn compute_segwit_sighash(
    tx: &Transaction,
    input_index: usize,
    redeem_script: &Script,
    amount: Amount,
) -> Result<SegwitV0Sighash> {
    let mut cache = SighashCache::new(tx);
    cache
        .p2wsh_signature_hash(input_index, redeem_script, amount, EcdsaSighashType::All)
        .map_err(|e| HtlcError::SigningFailure(e.to_string()))
}

/// Attaches a branch witness built around an existing signature.
///
/// Used directly when the signature comes from another party: build the
/// skeleton with [`WitnessMode::Unsigned`], hand over its sighash, then
/// attach what comes back.
///
/// # Errors
/// Returns `HtlcError::InvalidSecret` for an invalid claim secret and
/// `HtlcError::SigningFailure` if the transaction has no inputs.
pub fn attach_signature(
    tx: &mut Transaction,
    intent: &SpendIntent,
    signature: &ecdsa::Signature,
    pubkey: &PublicKey,
    script: &Script,
) -> Result<()> {
    intent.validate()?;
    let witness = match intent {
        SpendIntent::Claim { secret } => claim_witness(signature, pubkey, secret, script),
        SpendIntent::Refund { .. } => refund_witness(signature, pubkey, script),
    };
    let input = tx
        .input
        .get_mut(CONTRACT_INPUT)
        .ok_or_else(|| HtlcError::SigningFailure("transaction has no inputs".to_string()))?;
    input.witness = witness;
    Ok(())
}

/// Serializes a transaction to hex.
#[must_use]
pub fn tx_to_hex(tx: &Transaction) -> String {
    serialize_hex(tx)
}
