//! Synthetic CoinJoin generation.
//!
//! Builds random but internally consistent JoinMarket-style transactions
//! together with the participant layout that produced them, for benchmarks,
//! property tests and the `generate` command.

use crate::core::error::AnalysisError;
use crate::core::participant::Role;
use crate::core::transaction::TransactionData;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Configuration for generating a synthetic CoinJoin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of participants, i.e. equal outputs.
    pub num_participants: usize,
    /// Amount of every equal output, in satoshis.
    pub equal_amount: u64,
    /// Largest maker fee as a fraction of the equal amount.
    pub max_fee_rel: f64,
    pub network_fee: u64,
    /// Each participant funds between 1 and this many inputs.
    pub max_inputs_per_participant: usize,
    /// Chance that a participant receives no change.
    pub no_change_probability: f64,
    /// Fixed seed for reproducible output; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_participants: 4,
            equal_amount: 100_000_000,
            max_fee_rel: 0.005,
            network_fee: 50_000,
            max_inputs_per_participant: 2,
            no_change_probability: 0.1,
            seed: None,
        }
    }
}

/// Participant layout a synthetic transaction was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantedParticipant {
    pub role: Role,
    /// Input indices (`vin` positions), ascending.
    pub inputs: Vec<usize>,
    /// Change output index (`vout` position).
    pub change: Option<usize>,
    pub fee: i64,
}

/// A generated transaction, its raw document, and the planted layout.
#[derive(Debug, Clone)]
pub struct SyntheticCoinJoin {
    pub transaction: TransactionData,
    pub raw: Value,
    pub participants: Vec<PlantedParticipant>,
}

impl SyntheticCoinJoin {
    pub fn taker(&self) -> Option<&PlantedParticipant> {
        self.participants.iter().find(|p| p.role == Role::Taker)
    }
}

struct Draft {
    role: Role,
    input_amounts: Vec<u64>,
    change: Option<u64>,
    fee: i64,
}

/// Generate a synthetic CoinJoin.
///
/// Input order is shuffled. Equal outputs come first in `vout`, followed by
/// the change outputs in shuffled order.
pub fn generate_coinjoin(config: &SyntheticConfig) -> Result<SyntheticCoinJoin, AnalysisError> {
    if config.num_participants == 0 || config.max_inputs_per_participant == 0 {
        return Err(AnalysisError::InvalidConfig(
            "synthetic CoinJoin needs at least one participant and one input each".to_string(),
        ));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let max_maker_fee = (config.equal_amount as f64 * config.max_fee_rel).floor() as u64;
    let taker = rng.gen_range(0..config.num_participants);
    let max_change = (config.equal_amount / 2).max(2);

    let mut maker_fees = 0;
    let mut drafts: Vec<Draft> = (0..config.num_participants)
        .map(|idx| {
            let change = if rng.gen_bool(config.no_change_probability.clamp(0.0, 1.0)) {
                None
            } else {
                Some(rng.gen_range(1..max_change))
            };
            let fee = if idx == taker {
                0
            } else {
                let fee = rng.gen_range(0..=max_maker_fee);
                maker_fees += fee;
                -(fee as i64)
            };
            Draft {
                role: if idx == taker { Role::Taker } else { Role::Maker },
                input_amounts: Vec::new(),
                change,
                fee,
            }
        })
        .collect();
    drafts[taker].fee = (config.network_fee + maker_fees) as i64;

    for draft in &mut drafts {
        let total =
            (config.equal_amount as i64 + draft.change.unwrap_or(0) as i64 + draft.fee) as u64;
        let pieces = rng.gen_range(1..=config.max_inputs_per_participant);
        draft.input_amounts = split_amount(&mut rng, total, pieces);
    }

    // (participant, amount) for every input, then shuffled into vin order.
    let mut vin: Vec<(usize, u64)> = drafts
        .iter()
        .enumerate()
        .flat_map(|(p, d)| d.input_amounts.iter().map(move |&a| (p, a)))
        .collect();
    vin.shuffle(&mut rng);

    let mut changes: Vec<(usize, u64)> = drafts
        .iter()
        .enumerate()
        .filter_map(|(p, d)| d.change.map(|c| (p, c)))
        .collect();
    changes.shuffle(&mut rng);

    let mut participants: Vec<PlantedParticipant> = drafts
        .iter()
        .map(|d| PlantedParticipant {
            role: d.role,
            inputs: Vec::new(),
            change: None,
            fee: d.fee,
        })
        .collect();
    for (idx, &(p, _)) in vin.iter().enumerate() {
        participants[p].inputs.push(idx);
    }
    for (offset, &(p, _)) in changes.iter().enumerate() {
        participants[p].change = Some(config.num_participants + offset);
    }

    let txid = format!("synthetic-{:016x}", rng.gen::<u64>());
    let vout: Vec<Value> = (0..config.num_participants)
        .map(|i| output_json(format!("equal{}", i), config.equal_amount))
        .chain(
            changes
                .iter()
                .enumerate()
                .map(|(j, &(_, amount))| output_json(format!("change{}", j), amount)),
        )
        .collect();
    let raw = json!({
        "txid": txid,
        "vin": vin
            .iter()
            .enumerate()
            .map(|(i, &(_, amount))| json!({"prevout": output_json(format!("input{}", i), amount)}))
            .collect::<Vec<_>>(),
        "vout": vout,
    });

    let transaction = TransactionData::from_raw(&raw)?;
    Ok(SyntheticCoinJoin {
        transaction,
        raw,
        participants,
    })
}

fn output_json(address: String, value: u64) -> Value {
    json!({"scriptpubkey_address": address, "value": value})
}

/// Split `total` into `pieces` positive amounts.
fn split_amount(rng: &mut StdRng, total: u64, pieces: usize) -> Vec<u64> {
    let pieces = pieces.min(total as usize).max(1);
    let weights: Vec<u64> = (0..pieces).map(|_| rng.gen_range(1..=100)).collect();
    let weight_sum: u64 = weights.iter().sum();

    let mut amounts: Vec<u64> = weights
        .iter()
        .map(|w| (total as u128 * *w as u128 / weight_sum as u128).max(1) as u64)
        .collect();
    let assigned: u64 = amounts[..pieces - 1].iter().sum();
    amounts[pieces - 1] = total - assigned;
    amounts
}
