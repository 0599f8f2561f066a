//! Contract command: prints the redeem script and P2WSH funding address.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use swaplock_bitcoin::htlc::{image_from_secret, Contract};
use swaplock_bitcoin::{ContractScriptBuilder, NetworkConfig};
use tracing::info;

use crate::decode_hex;

#[derive(Args)]
pub struct ContractArgs {
    /// SHA256 image of the claim secret (hex, 32 bytes)
    #[arg(long, conflicts_with = "secret", required_unless_present = "secret")]
    image: Option<String>,

    /// Claim secret (hex); hashed with SHA256 to form the image
    #[arg(long)]
    secret: Option<String>,

    /// Broker public key (hex), refunds after the locktime
    #[arg(long)]
    broker: String,

    /// Customer public key (hex), claims with the secret
    #[arg(long)]
    customer: String,

    /// Absolute locktime: block height, or unix time if >= 500000000
    #[arg(long)]
    locktime: u32,
}

/// Contract details handed to the funding counterparty.
#[derive(Debug, Serialize)]
pub struct ContractReport {
    pub network: String,
    /// RIPEMD160 of the image, as embedded in the script.
    pub image_hash: String,
    pub redeem_script: String,
    pub address: String,
    pub locktime: u32,
}

/// Runs the contract command.
pub fn run(network: NetworkConfig, args: &ContractArgs) -> Result<ContractReport> {
    let image = match (&args.image, &args.secret) {
        (Some(image), None) => decode_hex("image", image)?,
        (None, Some(secret)) => image_from_secret(&decode_hex("secret", secret)?).to_vec(),
        _ => bail!("exactly one of --image or --secret is required"),
    };
    let broker = decode_hex("broker", &args.broker)?;
    let customer = decode_hex("customer", &args.customer)?;

    let contract = Contract::new(&image, &broker, &customer, args.locktime)
        .context("invalid contract parameters")?;
    let script = contract.redeem_script();
    let address = ContractScriptBuilder::new(network).derive_address(&script);

    info!(%address, "contract ready to fund");

    Ok(ContractReport {
        network: network.to_string(),
        image_hash: contract.image_hash.to_string(),
        redeem_script: hex::encode(script.as_bytes()),
        address: address.to_string(),
        locktime: args.locktime,
    })
}
