use crate::core::error::AnalysisError;
use crate::core::participant::{Participant, Role};
use serde::{Deserialize, Serialize};

/// A complete decomposition of a CoinJoin into one taker and N−1 makers.
///
/// Every transaction input belongs to exactly one participant. A solution is
/// valid when the taker's fee covers the network fee plus every maker fee
/// exactly, i.e. `discrepancy == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    participants: Vec<Participant>,
    taker_index: usize,
    /// Σ|maker.fee|
    total_maker_fees: i64,
    network_fee: i64,
    /// |taker.fee − (total_maker_fees + network_fee)|
    discrepancy: i64,
}

impl Solution {
    /// Assemble a solution from fully-built participants.
    ///
    /// Fails unless exactly one participant is the taker.
    pub fn from_participants(
        participants: Vec<Participant>,
        network_fee: i64,
    ) -> Result<Self, AnalysisError> {
        let takers: Vec<usize> = participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.role() == Role::Taker)
            .map(|(idx, _)| idx)
            .collect();

        let taker_index = match takers.as_slice() {
            [idx] => *idx,
            [] => {
                return Err(AnalysisError::Extraction(
                    "no participant is marked as taker".to_string(),
                ))
            }
            many => {
                return Err(AnalysisError::Extraction(format!(
                    "{} participants are marked as taker",
                    many.len()
                )))
            }
        };

        let total_maker_fees: i64 = participants
            .iter()
            .filter(|p| p.role() == Role::Maker)
            .map(|p| p.fee().abs())
            .sum();

        let taker_fee = participants[taker_index].fee();
        let discrepancy = (taker_fee - (total_maker_fees + network_fee)).abs();

        Ok(Self {
            participants,
            taker_index,
            total_maker_fees,
            network_fee,
            discrepancy,
        })
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn taker_index(&self) -> usize {
        self.taker_index
    }

    pub fn taker(&self) -> &Participant {
        &self.participants[self.taker_index]
    }

    pub fn total_maker_fees(&self) -> i64 {
        self.total_maker_fees
    }

    pub fn network_fee(&self) -> i64 {
        self.network_fee
    }

    pub fn discrepancy(&self) -> i64 {
        self.discrepancy
    }

    pub fn is_valid(&self) -> bool {
        self.discrepancy == 0
    }
}
