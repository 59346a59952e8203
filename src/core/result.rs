use crate::core::solution::Solution;
use crate::core::transaction::TransactionData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why enumeration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Greedy matching resolved every input; no model was built.
    ShortCircuit,
    /// The model became infeasible: every distinct solution was found.
    Exhausted,
    /// A solve hit the per-solve time limit.
    TimeLimit,
    /// `max_solutions` distinct solutions were accepted.
    SolutionCap,
    /// Too many consecutive solves returned an already seen solution.
    DuplicateLimit,
    /// A solved model could not be turned into a solution.
    ExtractionFailed,
    /// The solver reported an error.
    SolverFailed,
    /// The analysis was cancelled through its context.
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::ShortCircuit => "resolved by greedy matching",
            Termination::Exhausted => "all solutions found",
            Termination::TimeLimit => "solver time limit reached",
            Termination::SolutionCap => "solution limit reached",
            Termination::DuplicateLimit => "too many consecutive duplicates",
            Termination::ExtractionFailed => "solution extraction failed",
            Termination::SolverFailed => "solver failed",
            Termination::Cancelled => "cancelled",
        }
    }

    /// True when the solution list is known to be complete.
    pub fn is_exhaustive(&self) -> bool {
        matches!(self, Termination::ShortCircuit | Termination::Exhausted)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of analysing one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    transaction: TransactionData,
    solutions: Vec<Solution>,
    termination: Termination,
    /// Solver calls made.
    iterations: usize,
    /// Solves that reproduced an accepted solution.
    duplicates: usize,
}

impl AnalysisResult {
    pub fn new(
        transaction: TransactionData,
        solutions: Vec<Solution>,
        termination: Termination,
        iterations: usize,
        duplicates: usize,
    ) -> Self {
        Self {
            transaction,
            solutions,
            termination,
            iterations,
            duplicates,
        }
    }

    pub fn transaction(&self) -> &TransactionData {
        &self.transaction
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn num_solutions(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_unique(&self) -> bool {
        self.solutions.len() == 1
    }

    /// Share of solutions in which each participant number is the taker.
    pub fn taker_probabilities(&self) -> BTreeMap<usize, f64> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for solution in &self.solutions {
            *counts.entry(solution.taker_index()).or_insert(0) += 1;
        }
        self.frequencies(counts)
    }

    /// Share of solutions in which each transaction input belongs to the taker.
    ///
    /// Unlike participant numbers, input indices mean the same thing in every
    /// solution.
    pub fn taker_input_probabilities(&self) -> BTreeMap<usize, f64> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for solution in &self.solutions {
            for idx in solution.taker().input_indices() {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        self.frequencies(counts)
    }

    fn frequencies(&self, counts: BTreeMap<usize, usize>) -> BTreeMap<usize, f64> {
        let total = self.solutions.len() as f64;
        counts
            .into_iter()
            .map(|(key, count)| (key, count as f64 / total))
            .collect()
    }
}
