//! Funding reference for the output being spent.
//!
//! Text form is `<txid>:<vout>:<amount_sats>`, with the txid in the usual
//! byte-reversed display order.

use std::fmt;
use std::str::FromStr;

use bitcoin::{Amount, OutPoint, Txid};

use crate::HtlcError;

/// The funded contract output a spend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Funding transaction ID.
    pub txid: Txid,
    /// Output index within the funding transaction.
    pub vout: u32,
    /// Value locked in the output. Committed to by the segwit sighash.
    pub amount: Amount,
}

impl Anchor {
    /// Creates an anchor from its parts.
    #[must_use]
    pub const fn new(txid: Txid, vout: u32, amount: Amount) -> Self {
        Self { txid, vout, amount }
    }

    /// The outpoint this anchor refers to.
    #[must_use]
    pub const fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

impl FromStr for Anchor {
    type Err = HtlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [txid, vout, amount] = parts.as_slice() else {
            return Err(HtlcError::InvalidAnchor(format!(
                "expected txid:index:amount, got {} field(s)",
                parts.len()
            )));
        };

        let txid = Txid::from_str(txid)
            .map_err(|e| HtlcError::InvalidAnchor(format!("bad txid {txid:?}: {e}")))?;
        let vout = vout
            .parse::<u32>()
            .map_err(|e| HtlcError::InvalidAnchor(format!("bad output index {vout:?}: {e}")))?;
        let amount = amount
            .parse::<u64>()
            .map_err(|e| HtlcError::InvalidAnchor(format!("bad amount {amount:?}: {e}")))?;

        Ok(Self::new(txid, vout, Amount::from_sat(amount)))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.txid, self.vout, self.amount.to_sat())
    }
}
