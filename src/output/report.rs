use crate::core::error::AnalysisError;
use crate::core::participant::{Participant, Role};
use crate::core::solution::Solution;
use crate::core::transaction::TransactionData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persisted form of an analysis: a transaction summary plus every accepted
/// solution. Solution and participant ids are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionsDocument {
    pub transaction: TransactionSummary,
    pub num_solutions: usize,
    pub generated_at: DateTime<Utc>,
    pub solutions: Vec<SolutionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub txid: String,
    pub num_participants: usize,
    pub equal_amount: u64,
    pub network_fee: i64,
    pub num_inputs: usize,
    pub num_outputs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub solution_id: usize,
    pub taker_index: usize,
    pub total_maker_fees: i64,
    pub network_fee: i64,
    pub discrepancy: i64,
    pub participants: Vec<ParticipantRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: usize,
    pub role: Role,
    pub num_inputs: usize,
    pub input_indices: Vec<usize>,
    pub input_sum: i64,
    pub equal_output: u64,
    pub change_output_index: Option<usize>,
    pub change_amount: Option<u64>,
    pub fee: i64,
}

impl SolutionsDocument {
    pub fn new(tx: &TransactionData, solutions: &[Solution]) -> Self {
        Self {
            transaction: TransactionSummary {
                txid: tx.txid().to_string(),
                num_participants: tx.num_participants(),
                equal_amount: tx.equal_amount(),
                network_fee: tx.network_fee(),
                num_inputs: tx.inputs().len(),
                num_outputs: tx.num_outputs(),
            },
            num_solutions: solutions.len(),
            generated_at: Utc::now(),
            solutions: solutions
                .iter()
                .enumerate()
                .map(|(idx, solution)| SolutionRecord::new(idx + 1, solution))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl SolutionRecord {
    fn new(solution_id: usize, solution: &Solution) -> Self {
        Self {
            solution_id,
            taker_index: solution.taker_index(),
            total_maker_fees: solution.total_maker_fees(),
            network_fee: solution.network_fee(),
            discrepancy: solution.discrepancy(),
            participants: solution
                .participants()
                .iter()
                .enumerate()
                .map(|(idx, p)| ParticipantRecord::new(idx + 1, p))
                .collect(),
        }
    }
}

impl ParticipantRecord {
    fn new(participant_id: usize, participant: &Participant) -> Self {
        Self {
            participant_id,
            role: participant.role(),
            num_inputs: participant.inputs().len(),
            input_indices: participant.input_indices(),
            input_sum: participant.input_sum(),
            equal_output: participant.equal_output(),
            change_output_index: participant.change_output().map(|c| c.index()),
            change_amount: participant.change_output().map(|c| c.amount()),
            fee: participant.fee(),
        }
    }
}

/// Write `solutions` to `path` as pretty-printed JSON, replacing any
/// previous content.
pub fn save_solutions(
    path: impl AsRef<Path>,
    tx: &TransactionData,
    solutions: &[Solution],
) -> Result<(), AnalysisError> {
    let document = SolutionsDocument::new(tx, solutions);
    fs::write(path, document.to_json()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utxo::Utxo;

    fn sample() -> (TransactionData, Solution) {
        let tx = TransactionData::from_amounts("doc", &[103, 105], 100, 2, &[4]);
        let maker = Participant::new(
            Role::Maker,
            vec![tx.inputs()[0].clone()],
            100,
            Some(Utxo::new("change0", 4, 2)),
        );
        let taker = Participant::new(Role::Taker, vec![tx.inputs()[1].clone()], 100, None);
        let solution = Solution::from_participants(vec![maker, taker], 4).unwrap();
        (tx, solution)
    }

    #[test]
    fn test_document_layout() {
        let (tx, solution) = sample();
        let doc = SolutionsDocument::new(&tx, &[solution]);

        assert_eq!(doc.transaction.num_inputs, 2);
        assert_eq!(doc.transaction.num_outputs, 3);
        assert_eq!(doc.num_solutions, 1);
        let record = &doc.solutions[0];
        assert_eq!(record.solution_id, 1);
        assert_eq!(record.participants[0].participant_id, 1);
        assert_eq!(record.participants[0].change_output_index, Some(2));
        assert_eq!(record.participants[1].role, Role::Taker);
        assert_eq!(record.participants[1].change_amount, None);
        assert_eq!(record.participants[1].fee, 5);
    }

    #[test]
    fn test_json_field_names() {
        let (tx, solution) = sample();
        let json = SolutionsDocument::new(&tx, &[solution]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["transaction"]["txid"], "doc");
        assert_eq!(value["solutions"][0]["participants"][1]["role"], "taker");
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_save_overwrites() {
        let (tx, solution) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solutions.json");

        save_solutions(&path, &tx, &[]).unwrap();
        save_solutions(&path, &tx, &[solution.clone(), solution]).unwrap();

        let doc = SolutionsDocument::from_json(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.num_solutions, 2);
        assert_eq!(doc.solutions[1].solution_id, 2);
    }
}
