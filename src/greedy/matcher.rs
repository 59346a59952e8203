use crate::core::transaction::TransactionData;
use crate::core::utxo::Utxo;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a participant was given in the way of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAssignment {
    /// Position of the change in `TransactionData::change_outputs`.
    Assigned(usize),
    /// The participant provably has no change output.
    NoChange,
}

impl ChangeAssignment {
    pub fn change_position(&self) -> Option<usize> {
        match self {
            ChangeAssignment::Assigned(j) => Some(*j),
            ChangeAssignment::NoChange => None,
        }
    }
}

/// Matches the greedy pass could prove without search.
///
/// Input and change keys are positions in `TransactionData::inputs` and
/// `TransactionData::change_outputs`. Participants are numbered in the order
/// they were confirmed, so forced participants always form a prefix
/// `0..k` of the participant slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreedyAssignment {
    /// input position -> participant
    forced_assignments: BTreeMap<usize, usize>,
    /// participant -> change
    forced_changes: BTreeMap<usize, ChangeAssignment>,
    /// Participant confirmed as taker, if any.
    taker: Option<usize>,
    unassigned_inputs: BTreeSet<usize>,
    unassigned_changes: BTreeSet<usize>,
    unassigned_participants: BTreeSet<usize>,
}

impl GreedyAssignment {
    /// An assignment that fixes nothing: every element is left to the model.
    pub fn empty(tx: &TransactionData) -> Self {
        Self {
            forced_assignments: BTreeMap::new(),
            forced_changes: BTreeMap::new(),
            taker: None,
            unassigned_inputs: (0..tx.inputs().len()).collect(),
            unassigned_changes: (0..tx.change_outputs().len()).collect(),
            unassigned_participants: (0..tx.num_participants()).collect(),
        }
    }

    pub fn forced_assignments(&self) -> &BTreeMap<usize, usize> {
        &self.forced_assignments
    }

    pub fn forced_changes(&self) -> &BTreeMap<usize, ChangeAssignment> {
        &self.forced_changes
    }

    pub fn taker(&self) -> Option<usize> {
        self.taker
    }

    pub fn unassigned_inputs(&self) -> &BTreeSet<usize> {
        &self.unassigned_inputs
    }

    pub fn unassigned_changes(&self) -> &BTreeSet<usize> {
        &self.unassigned_changes
    }

    pub fn unassigned_participants(&self) -> &BTreeSet<usize> {
        &self.unassigned_participants
    }

    /// True when every input was matched and the model can be skipped.
    pub fn is_complete(&self) -> bool {
        self.unassigned_inputs.is_empty()
    }

    pub fn is_forced_participant(&self, participant: usize) -> bool {
        !self.unassigned_participants.contains(&participant)
    }

    /// Input positions forced onto `participant`, ascending.
    pub fn inputs_of(&self, participant: usize) -> Vec<usize> {
        self.forced_assignments
            .iter()
            .filter(|(_, &p)| p == participant)
            .map(|(&i, _)| i)
            .collect()
    }

    /// Participants that received at least one forced input, ascending.
    pub fn forced_participants(&self) -> BTreeSet<usize> {
        self.forced_assignments.values().copied().collect()
    }
}

/// How a single input was resolved in one greedy round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Maker { change: usize, fee: i64 },
    TakerWithChange { change: usize, maker_fees: i64 },
    TakerNoChange { maker_fees: i64 },
}

/// Mutable bookkeeping of a greedy run.
#[derive(Debug, Default)]
struct MatchState {
    forced_assignments: BTreeMap<usize, usize>,
    forced_changes: BTreeMap<usize, ChangeAssignment>,
    used_changes: BTreeSet<usize>,
    next_participant: usize,
    taker: Option<usize>,
}

impl MatchState {
    fn is_assigned(&self, input: usize) -> bool {
        self.forced_assignments.contains_key(&input)
    }
}

/// Search-free preprocessing that fixes only provably unique matches.
///
/// For every still-unassigned input the matcher looks at the unused changes
/// and classifies them:
///
/// - **maker-compatible**: `maker_fee = change − (input − equal)` lies in
///   `[0, max_maker_fee]`;
/// - **taker-compatible**: `input − equal − network_fee − change` lies in
///   `[0, max_total_maker_fees]` (only while no taker is known);
/// - **no-change taker**: `input − equal − network_fee` lies in the same range.
///
/// A match is confirmed only when it is unique from both sides: the input has
/// exactly one reading, and no other unassigned input could claim the same
/// change (or the no-change taker slot) under the same rule. Rounds repeat
/// until one makes no progress, since each confirmation can remove the
/// competition that kept another input ambiguous. At most one taker is ever
/// confirmed.
pub struct GreedyMatcher<'a> {
    tx: &'a TransactionData,
    max_maker_fee: i64,
    max_total_maker_fees: i64,
}

impl<'a> GreedyMatcher<'a> {
    pub fn new(tx: &'a TransactionData, max_fee_rel: f64) -> Self {
        let max_maker_fee = tx.max_maker_fee(max_fee_rel);
        let makers = tx.num_participants().saturating_sub(1) as i64;
        Self {
            tx,
            max_maker_fee,
            max_total_maker_fees: max_maker_fee * makers,
        }
    }

    pub fn max_maker_fee(&self) -> i64 {
        self.max_maker_fee
    }

    pub fn max_total_maker_fees(&self) -> i64 {
        self.max_total_maker_fees
    }

    /// Run matching rounds until no further input can be resolved.
    pub fn run(&self) -> GreedyAssignment {
        let n_participants = self.tx.num_participants();
        let n_inputs = self.tx.inputs().len();
        let mut state = MatchState::default();

        if self.tx.change_outputs().len() + 1 == n_participants {
            debug!(
                "{} changes for {} participants: one participant has no change",
                self.tx.change_outputs().len(),
                n_participants
            );
        }

        let mut round = 0;
        while state.next_participant < n_participants && state.forced_assignments.len() < n_inputs
        {
            round += 1;
            let mut progress = false;

            let pending: Vec<usize> = (0..n_inputs).filter(|&i| !state.is_assigned(i)).collect();
            for input in pending {
                if state.next_participant >= n_participants {
                    break;
                }
                if let Some(decision) = self.decide(input, &state) {
                    self.apply(input, decision, &mut state, round);
                    progress = true;
                }
            }

            if !progress {
                break;
            }
        }

        let assignment = self.finish(state);
        info!(
            "Greedy matching: {}/{} inputs assigned in {} round(s), taker {}",
            assignment.forced_assignments.len(),
            n_inputs,
            round,
            match assignment.taker {
                Some(p) => format!("is participant {}", p + 1),
                None => "not identified".to_string(),
            }
        );
        assignment
    }

    /// Fee a maker would receive if `change` were its change for `input`.
    fn maker_fee(&self, input: &Utxo, change: &Utxo) -> Option<i64> {
        let remaining = input.signed_amount() - self.tx.signed_equal_amount();
        let fee = change.signed_amount() - remaining;
        (0..=self.max_maker_fee).contains(&fee).then_some(fee)
    }

    /// Total maker fees a taker would pay if `change` were its change.
    fn taker_maker_fees(&self, input: &Utxo, change: Option<&Utxo>) -> Option<i64> {
        let remaining = input.signed_amount() - self.tx.signed_equal_amount();
        let change = change.map_or(0, Utxo::signed_amount);
        let total = remaining - self.tx.network_fee() - change;
        (0..=self.max_total_maker_fees).contains(&total).then_some(total)
    }

    /// Unassigned inputs other than `input`.
    fn competitors<'s>(
        &'s self,
        input: usize,
        state: &'s MatchState,
    ) -> impl Iterator<Item = &'a Utxo> + 's {
        self.tx
            .inputs()
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != input && !state.is_assigned(*i))
            .map(|(_, utxo)| utxo)
    }

    fn unused_changes<'s>(
        &'s self,
        state: &'s MatchState,
    ) -> impl Iterator<Item = (usize, &'a Utxo)> + 's {
        self.tx
            .change_outputs()
            .iter()
            .enumerate()
            .filter(move |(j, _)| !state.used_changes.contains(j))
    }

    fn maker_unique(&self, input: usize, change: usize, state: &MatchState) -> bool {
        let change = &self.tx.change_outputs()[change];
        !self
            .competitors(input, state)
            .any(|other| self.maker_fee(other, change).is_some())
    }

    fn taker_with_change_unique(&self, input: usize, change: usize, state: &MatchState) -> bool {
        let change = &self.tx.change_outputs()[change];
        !self
            .competitors(input, state)
            .any(|other| self.taker_maker_fees(other, Some(change)).is_some())
    }

    fn no_change_unique(&self, input: usize, state: &MatchState) -> bool {
        !self
            .competitors(input, state)
            .any(|other| self.taker_maker_fees(other, None).is_some())
    }

    fn decide(&self, input: usize, state: &MatchState) -> Option<Decision> {
        let utxo = &self.tx.inputs()[input];
        let taker_open = state.taker.is_none();

        let as_maker: Vec<(usize, i64)> = self
            .unused_changes(state)
            .filter_map(|(j, change)| self.maker_fee(utxo, change).map(|fee| (j, fee)))
            .collect();

        let as_taker: Vec<(usize, i64)> = if taker_open {
            self.unused_changes(state)
                .filter_map(|(j, change)| {
                    self.taker_maker_fees(utxo, Some(change))
                        .map(|fees| (j, fees))
                })
                .collect()
        } else {
            Vec::new()
        };

        let no_change = if taker_open {
            self.taker_maker_fees(utxo, None)
        } else {
            None
        };

        // Single maker reading with no competing taker reading.
        if let [(change, fee)] = as_maker.as_slice() {
            if as_taker.is_empty() && self.maker_unique(input, *change, state) {
                return Some(Decision::Maker {
                    change: *change,
                    fee: *fee,
                });
            }
        }

        // Single taker-with-change reading.
        if let [(change, maker_fees)] = as_taker.as_slice() {
            if as_maker.is_empty()
                && no_change.is_none()
                && self.taker_with_change_unique(input, *change, state)
            {
                return Some(Decision::TakerWithChange {
                    change: *change,
                    maker_fees: *maker_fees,
                });
            }
        }

        // Only the no-change taker reading fits.
        if as_maker.is_empty() && as_taker.is_empty() {
            if let Some(maker_fees) = no_change {
                if self.no_change_unique(input, state) {
                    return Some(Decision::TakerNoChange { maker_fees });
                }
            }
        }

        // Several maker readings, exactly one of them unclaimed by other inputs.
        if as_maker.len() >= 2 {
            let unique: Vec<&(usize, i64)> = as_maker
                .iter()
                .filter(|(change, _)| self.maker_unique(input, *change, state))
                .collect();
            if let [(change, fee)] = unique.as_slice() {
                return Some(Decision::Maker {
                    change: *change,
                    fee: *fee,
                });
            }
        }

        None
    }

    fn apply(&self, input: usize, decision: Decision, state: &mut MatchState, round: usize) {
        let participant = state.next_participant;
        let utxo = &self.tx.inputs()[input];
        state.forced_assignments.insert(input, participant);

        match decision {
            Decision::Maker { change, fee } => {
                state
                    .forced_changes
                    .insert(participant, ChangeAssignment::Assigned(change));
                state.used_changes.insert(change);
                info!(
                    "  [{}] Input[{}] -> Participant {} (maker), change[{}] = {} sats, receives {} sats",
                    round,
                    utxo.index(),
                    participant + 1,
                    self.tx.change_outputs()[change].index(),
                    self.tx.change_outputs()[change].amount(),
                    fee
                );
            }
            Decision::TakerWithChange { change, maker_fees } => {
                state
                    .forced_changes
                    .insert(participant, ChangeAssignment::Assigned(change));
                state.used_changes.insert(change);
                state.taker = Some(participant);
                info!(
                    "  [{}] Input[{}] -> Participant {} (taker with change), change[{}], pays {} network + {} makers",
                    round,
                    utxo.index(),
                    participant + 1,
                    self.tx.change_outputs()[change].index(),
                    self.tx.network_fee(),
                    maker_fees
                );
            }
            Decision::TakerNoChange { maker_fees } => {
                state
                    .forced_changes
                    .insert(participant, ChangeAssignment::NoChange);
                state.taker = Some(participant);
                info!(
                    "  [{}] Input[{}] -> Participant {} (taker, no change), pays {} network + {} makers",
                    round,
                    utxo.index(),
                    participant + 1,
                    self.tx.network_fee(),
                    maker_fees
                );
            }
        }

        state.next_participant += 1;
    }

    fn finish(&self, state: MatchState) -> GreedyAssignment {
        let unassigned_inputs = (0..self.tx.inputs().len())
            .filter(|i| !state.forced_assignments.contains_key(i))
            .collect();
        let unassigned_changes = (0..self.tx.change_outputs().len())
            .filter(|j| !state.used_changes.contains(j))
            .collect();
        let assigned: BTreeSet<usize> = state.forced_assignments.values().copied().collect();
        let unassigned_participants = (0..self.tx.num_participants())
            .filter(|p| !assigned.contains(p))
            .collect();

        GreedyAssignment {
            forced_assignments: state.forced_assignments,
            forced_changes: state.forced_changes,
            taker: state.taker,
            unassigned_inputs,
            unassigned_changes,
            unassigned_participants,
        }
    }
}
