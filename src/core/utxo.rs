use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest amount a single UTXO can carry: 21 million BTC, in satoshis.
pub const MAX_MONEY: u64 = 2_100_000_000_000_000;

/// A transaction input or output: who it pays, how much, and where it sits.
///
/// `index` is the position in the original transaction's input list (for
/// inputs) or output list (for outputs), so it stays meaningful after outputs
/// are split into equal and change buckets.
///
/// # Examples
///
/// ```
/// use coinjoin_analyzer::core::utxo::Utxo;
///
/// let input = Utxo::new("bc1qinput", 105_000_000, 0);
/// assert_eq!(input.amount(), 105_000_000);
/// assert_eq!(input.index(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    address: String,
    /// Amount in satoshis.
    amount: u64,
    index: usize,
}

impl Utxo {
    pub fn new(address: impl Into<String>, amount: u64, index: usize) -> Self {
        Self {
            address: address.into(),
            amount,
            index,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Signed view of the amount, for fee arithmetic.
    ///
    /// Saturates at `i64::MAX`; amounts above [`MAX_MONEY`] are rejected by
    /// transaction validation before any fee is computed.
    pub fn signed_amount(&self) -> i64 {
        i64::try_from(self.amount).unwrap_or(i64::MAX)
    }

    pub fn exceeds_max_money(&self) -> bool {
        self.amount > MAX_MONEY
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Utxo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} sats ({})", self.index, self.amount, self.address)
    }
}

/// Sum of amounts of a set of UTXOs, in satoshis.
pub fn total_amount<'a>(utxos: impl IntoIterator<Item = &'a Utxo>) -> i64 {
    utxos
        .into_iter()
        .map(Utxo::signed_amount)
        .fold(0, i64::saturating_add)
}
