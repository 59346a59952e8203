use crate::core::participant::Participant;
use crate::core::solution::Solution;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a participant funded and received, stripped of its slot number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantProfile {
    /// Transaction input indices, ascending.
    pub inputs: Vec<usize>,
    /// Transaction output index of the change, if any.
    pub change: Option<usize>,
}

impl ParticipantProfile {
    pub fn of(participant: &Participant) -> Self {
        Self {
            inputs: participant.input_indices(),
            change: participant.change_output().map(|c| c.index()),
        }
    }
}

impl fmt::Display for ParticipantProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> ", self.inputs)?;
        match self.change {
            Some(idx) => write!(f, "change {}", idx),
            None => write!(f, "no change"),
        }
    }
}

/// Canonical form of a solution: equal for any relabeling of participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolutionSignature {
    profiles: Vec<ParticipantProfile>,
    taker: ParticipantProfile,
}

impl SolutionSignature {
    pub fn of(solution: &Solution) -> Self {
        let mut profiles: Vec<ParticipantProfile> = solution
            .participants()
            .iter()
            .map(ParticipantProfile::of)
            .collect();
        profiles.sort();
        Self {
            profiles,
            taker: ParticipantProfile::of(solution.taker()),
        }
    }

    pub fn profiles(&self) -> &[ParticipantProfile] {
        &self.profiles
    }

    pub fn taker(&self) -> &ParticipantProfile {
        &self.taker
    }
}
