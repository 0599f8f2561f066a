//! swaplock CLI: build and spend P2WSH hash time-locked contracts.
//!
//! Subcommands: contract, spend.
//! Reports are printed as JSON on stdout; logs go to stderr (`RUST_LOG`).

use anyhow::{Context, Result};
use clap::Parser;
use swaplock_bitcoin::NetworkConfig;
use tracing_subscriber::EnvFilter;

mod contract;
mod spend;

#[derive(Parser)]
#[command(name = "swaplock", about = "P2WSH hash time-locked contracts")]
struct Cli {
    /// Network: mainnet, testnet, signet or regtest
    #[arg(long, global = true, default_value = "mainnet")]
    network: NetworkConfig,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Subcommand)]
enum Cmd {
    /// Build the redeem script and funding address for a contract
    Contract(contract::ContractArgs),

    /// Assemble a claim or refund spend of a funded contract
    Spend(spend::SpendArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let report = match cli.cmd {
        Cmd::Contract(args) => {
            serde_json::to_string_pretty(&contract::run(cli.network, &args)?)
        }
        Cmd::Spend(args) => serde_json::to_string_pretty(&spend::run(cli.network, &args)?),
    }
    .context("failed to serialize report")?;

    println!("{report}");
    Ok(())
}

/// Decodes a hex command-line argument.
fn decode_hex(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).with_context(|| format!("--{name} is not valid hex"))
}
