//! Spend command: assembles a claim or refund transaction.
//!
//! With `--secret` the customer claims; with `--locktime` the broker refunds.
//! `--no-signature` prints the unsigned skeleton and its sighash for
//! out-of-band signing.

use anyhow::{Context, Result};
use bitcoin::Amount;
use clap::Args;
use serde::Serialize;
use swaplock_bitcoin::{NetworkConfig, SpendAssembler, SpendIntent, SpendRequest, WitnessMode};
use tracing::info;

use crate::decode_hex;

#[derive(Args)]
pub struct SpendArgs {
    /// Signing key (WIF)
    #[arg(long)]
    key: String,

    /// Redeem script (hex)
    #[arg(long)]
    script: String,

    /// Funded output as txid:index:amount_sats
    #[arg(long)]
    anchor: String,

    /// Destination address
    #[arg(long)]
    destination: String,

    /// Amount sent to the destination, in sats
    #[arg(long)]
    value: u64,

    /// Claim secret (hex)
    #[arg(long, conflicts_with = "locktime", required_unless_present = "locktime")]
    secret: Option<String>,

    /// Refund locktime: must match or pass the contract's locktime
    #[arg(long)]
    locktime: Option<u32>,

    /// Print the unsigned transaction without a witness
    #[arg(long)]
    no_signature: bool,
}

impl SpendArgs {
    fn intent(&self) -> Result<SpendIntent> {
        match (&self.secret, self.locktime) {
            (Some(secret), None) => Ok(SpendIntent::claim(decode_hex("secret", secret)?)),
            (None, Some(locktime)) => Ok(SpendIntent::refund(locktime)),
            _ => anyhow::bail!("exactly one of --secret or --locktime is required"),
        }
    }

    fn mode(&self) -> WitnessMode {
        if self.no_signature {
            WitnessMode::Unsigned
        } else {
            WitnessMode::Signed
        }
    }
}

/// The assembled spend.
#[derive(Debug, Serialize)]
pub struct SpendReport {
    pub network: String,
    pub txid: String,
    /// Segwit v0 sighash of the contract input.
    pub sighash: String,
    pub signed: bool,
    pub tx_hex: String,
}

/// Runs the spend command.
pub fn run(network: NetworkConfig, args: &SpendArgs) -> Result<SpendReport> {
    let request = SpendRequest {
        key: &args.key,
        script: &args.script,
        anchor: &args.anchor,
        destination: &args.destination,
        value: Amount::from_sat(args.value),
        intent: args.intent()?,
        mode: args.mode(),
    };

    let spend = SpendAssembler::new(network)
        .assemble_spend(&request)
        .context("failed to assemble spend")?;

    info!(txid = %spend.txid(), signed = spend.is_signed(), "spend assembled");

    Ok(SpendReport {
        network: network.to_string(),
        txid: spend.txid().to_string(),
        sighash: spend.sighash.to_string(),
        signed: spend.is_signed(),
        tx_hex: spend.to_hex(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::{Network, PrivateKey, ScriptBuf};
    use swaplock_bitcoin::ContractScriptBuilder;

    const TXID: &str = "abcdef0000000000000000000000000000000000000000000000000000000001";
    // OP_TRUE, enough for assembly; nothing here executes the script.
    const SCRIPT: &str = "51";

    fn args(secret: Option<&str>, locktime: Option<u32>, no_signature: bool) -> SpendArgs {
        let sk = SecretKey::from_slice(&[0x0c; 32]).unwrap();
        SpendArgs {
            key: PrivateKey::new(sk, Network::Regtest).to_wif(),
            script: SCRIPT.to_string(),
            anchor: format!("{TXID}:0:100000"),
            destination: ContractScriptBuilder::new(NetworkConfig::regtest())
                .derive_address(&ScriptBuf::from_bytes(vec![0x51]))
                .to_string(),
            value: 99_000,
            secret: secret.map(str::to_string),
            locktime,
            no_signature,
        }
    }

    #[test]
    fn refund_report_is_signed() {
        let report = run(NetworkConfig::regtest(), &args(None, Some(700_000), false)).unwrap();

        assert!(report.signed);
        assert_eq!(report.network, "regtest");
        assert!(hex::decode(&report.tx_hex).is_ok());
    }

    #[test]
    fn no_signature_keeps_txid() {
        let secret = hex::encode(b"secret");
        let signed = run(NetworkConfig::regtest(), &args(Some(&secret), None, false)).unwrap();
        let unsigned = run(NetworkConfig::regtest(), &args(Some(&secret), None, true)).unwrap();

        assert!(!unsigned.signed);
        assert_eq!(signed.txid, unsigned.txid);
        assert_eq!(signed.sighash, unsigned.sighash);
        assert!(unsigned.tx_hex.len() < signed.tx_hex.len());
    }

    #[test]
    fn bad_anchor_is_reported() {
        let mut bad = args(None, Some(1), false);
        bad.anchor = "nothex:abc:1".to_string();

        let err = run(NetworkConfig::regtest(), &bad).unwrap_err();

        assert!(format!("{err:#}").contains("invalid anchor"));
    }
}
