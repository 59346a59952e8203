use crate::core::transaction::TransactionData;
use crate::core::utxo::total_amount;
use crate::greedy::matcher::{ChangeAssignment, GreedyAssignment};
use log::info;
use serde::{Deserialize, Serialize};

/// Parameters of the residual problem left after greedy matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreedyAnalysis {
    /// Participant confirmed as taker by the greedy pass.
    pub taker: Option<usize>,
    /// Σ|fee| of makers the greedy pass already fixed.
    pub assigned_maker_fees: i64,
    /// Maker fees still to be distributed over unassigned makers: exact when
    /// the taker is known, otherwise the cap `max_maker_fee × unassigned makers`.
    pub remaining_maker_fees: i64,
    pub unassigned_makers: usize,
    /// Input positions left to the model, ascending.
    pub unassigned_inputs: Vec<usize>,
    /// Change positions left to the model, ascending.
    pub unassigned_changes: Vec<usize>,
    /// Participant slots left to the model, ascending.
    pub unassigned_participants: Vec<usize>,
}

impl GreedyAnalysis {
    pub fn from_assignment(
        greedy: &GreedyAssignment,
        tx: &TransactionData,
        max_fee_rel: f64,
    ) -> Self {
        let max_maker_fee = tx.max_maker_fee(max_fee_rel);
        let taker = greedy.taker();

        let mut assigned_maker_fees = 0;
        let mut assigned_makers = 0;
        for (&participant, &change) in greedy.forced_changes() {
            if Some(participant) == taker {
                continue;
            }
            assigned_maker_fees += participant_fee(greedy, tx, participant, change).abs();
            assigned_makers += 1;
        }

        let total_makers = tx.num_participants().saturating_sub(1);
        let unassigned_makers = total_makers.saturating_sub(assigned_makers);

        let remaining_maker_fees = match taker {
            Some(p) => {
                let taker_fee = participant_fee(greedy, tx, p, greedy.forced_changes()[&p]);
                let total_maker_fees = taker_fee - tx.network_fee();
                info!(
                    "Taker is participant {}: {} sats of maker fees, {} already assigned, {} left for {} maker(s)",
                    p + 1,
                    total_maker_fees,
                    assigned_maker_fees,
                    total_maker_fees - assigned_maker_fees,
                    unassigned_makers
                );
                total_maker_fees - assigned_maker_fees
            }
            None => {
                let cap = max_maker_fee * unassigned_makers as i64;
                info!(
                    "Taker not identified: at most {} sats of maker fees for {} maker(s)",
                    cap, unassigned_makers
                );
                cap
            }
        };

        Self {
            taker,
            assigned_maker_fees,
            remaining_maker_fees,
            unassigned_makers,
            unassigned_inputs: greedy.unassigned_inputs().iter().copied().collect(),
            unassigned_changes: greedy.unassigned_changes().iter().copied().collect(),
            unassigned_participants: greedy.unassigned_participants().iter().copied().collect(),
        }
    }

    pub fn taker_found(&self) -> bool {
        self.taker.is_some()
    }

    pub fn n_unassigned_participants(&self) -> usize {
        self.unassigned_participants.len()
    }
}

/// Signed fee of a greedy-fixed participant.
fn participant_fee(
    greedy: &GreedyAssignment,
    tx: &TransactionData,
    participant: usize,
    change: ChangeAssignment,
) -> i64 {
    let inputs = greedy
        .inputs_of(participant)
        .into_iter()
        .map(|i| &tx.inputs()[i]);
    let change = change
        .change_position()
        .map_or(0, |j| tx.change_outputs()[j].signed_amount());
    total_amount(inputs) - change - tx.signed_equal_amount()
}
