use crate::core::utxo::{total_amount, Utxo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a CoinJoin participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Initiator: pays the network fee and every maker's fee.
    Taker,
    /// Liquidity provider: receives an individual fee (possibly zero).
    Maker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Taker => "taker",
            Role::Maker => "maker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reconstructed participant: the inputs it funded and the outputs it got.
///
/// `fee` follows the balance equation
/// `Σinputs − change − equal_output == fee`:
/// positive means the participant pays (taker), negative means it receives
/// (maker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    role: Role,
    inputs: Vec<Utxo>,
    equal_output: u64,
    change_output: Option<Utxo>,
    fee: i64,
}

impl Participant {
    /// Build a participant, deriving its fee from the balance equation.
    ///
    /// Inputs are kept sorted by transaction index.
    pub fn new(
        role: Role,
        mut inputs: Vec<Utxo>,
        equal_output: u64,
        change_output: Option<Utxo>,
    ) -> Self {
        inputs.sort_by_key(Utxo::index);
        let change = change_output.as_ref().map_or(0, Utxo::signed_amount);
        let fee = total_amount(&inputs) - change - equal_output as i64;
        Self {
            role,
            inputs,
            equal_output,
            change_output,
            fee,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_taker(&self) -> bool {
        self.role == Role::Taker
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn input_indices(&self) -> Vec<usize> {
        self.inputs.iter().map(Utxo::index).collect()
    }

    /// Total input value in satoshis.
    pub fn input_sum(&self) -> i64 {
        total_amount(&self.inputs)
    }

    pub fn equal_output(&self) -> u64 {
        self.equal_output
    }

    pub fn change_output(&self) -> Option<&Utxo> {
        self.change_output.as_ref()
    }

    pub fn fee(&self) -> i64 {
        self.fee
    }
}
