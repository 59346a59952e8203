use crate::core::error::AnalysisError;
use crate::core::participant::{Participant, Role};
use crate::core::solution::Solution;
use crate::core::transaction::TransactionData;
use crate::greedy::matcher::GreedyAssignment;
use crate::optimization::builder::ReducedModel;
use crate::optimization::model::Assignment;
use log::debug;
use std::collections::BTreeMap;

/// What the model decided for one reduced slot, in reduced indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotProfile {
    /// Reduced input indices, ascending.
    pub inputs: Vec<usize>,
    /// Reduced change index, if the slot has change.
    pub change: Option<usize>,
    pub is_taker: bool,
}

/// A solution together with the per-slot pattern that produced it.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub solution: Solution,
    pub slot_profiles: Vec<SlotProfile>,
}

/// Turn solver values into a full [`Solution`], merging greedy-fixed
/// participants with those decided by the model.
pub fn extract_solution(
    tx: &TransactionData,
    greedy: &GreedyAssignment,
    model: &ReducedModel,
    values: &Assignment,
) -> Result<Extracted, AnalysisError> {
    let mut participants: BTreeMap<usize, Participant> = BTreeMap::new();

    for (&participant, change) in greedy.forced_changes() {
        let inputs = greedy
            .inputs_of(participant)
            .into_iter()
            .map(|i| tx.inputs()[i].clone())
            .collect();
        let change = change
            .change_position()
            .map(|j| tx.change_outputs()[j].clone());
        let role = if greedy.taker() == Some(participant) {
            Role::Taker
        } else {
            Role::Maker
        };
        participants.insert(
            participant,
            Participant::new(role, inputs, tx.equal_amount(), change),
        );
    }

    let mut slot_profiles = Vec::with_capacity(model.slots().len());
    let mut model_taker = None;

    for (p, &participant) in model.slots().iter().enumerate() {
        let inputs: Vec<usize> = (0..model.inputs().len())
            .filter(|&i| values.is_set(model.x(i, p)))
            .collect();
        if inputs.is_empty() {
            return Err(AnalysisError::Extraction(format!(
                "participant {} has no inputs",
                participant + 1
            )));
        }

        let change = (0..model.changes().len()).find(|&j| values.is_set(model.c(p, j)));
        let is_taker = model.t(p).map_or(false, |t| values.is_set(t));
        if is_taker {
            model_taker = Some(participant);
        }

        let participant_inputs = inputs
            .iter()
            .map(|&i| tx.inputs()[model.inputs()[i]].clone())
            .collect();
        let participant_change = change.map(|j| tx.change_outputs()[model.changes()[j]].clone());
        let role = if is_taker { Role::Taker } else { Role::Maker };
        let built = Participant::new(
            role,
            participant_inputs,
            tx.equal_amount(),
            participant_change,
        );

        let net_cost = values.integer(model.net_cost(p));
        if net_cost != built.fee() {
            debug!(
                "Participant {}: net_cost {} differs from recomputed fee {}",
                participant + 1,
                net_cost,
                built.fee()
            );
        }

        participants.insert(participant, built);
        slot_profiles.push(SlotProfile {
            inputs,
            change,
            is_taker,
        });
    }

    if model.has_taker_vars() && model_taker.is_none() {
        return Err(AnalysisError::Extraction(
            "no slot is marked as taker".to_string(),
        ));
    }

    let solution =
        Solution::from_participants(participants.into_values().collect(), tx.network_fee())?;

    Ok(Extracted {
        solution,
        slot_profiles,
    })
}
