use crate::config::AnalyzerConfig;
use crate::core::error::AnalysisError;
use crate::core::participant::{Participant, Role};
use crate::core::result::{AnalysisResult, Termination};
use crate::core::solution::Solution;
use crate::core::transaction::TransactionData;
use crate::greedy::analyzer::GreedyAnalysis;
use crate::greedy::matcher::{GreedyAssignment, GreedyMatcher};
use crate::optimization::builder::ReducedModel;
use crate::optimization::exclusion::add_exclusion_cut;
use crate::optimization::extraction::extract_solution;
use crate::optimization::model::SolveOutcome;
use crate::optimization::signature::SolutionSignature;
use crate::output::report::save_solutions;
use crate::output::summary::log_solution;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consecutive duplicate solves tolerated before giving up.
pub const MAX_CONSECUTIVE_DUPLICATES: usize = 10;

/// Cancels a running analysis from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one analysis that outlives a single solve: the accepted
/// solutions, where they are persisted, and the cancellation flag.
#[derive(Debug, Default)]
pub struct EnumerationContext {
    transaction: Option<TransactionData>,
    solutions: Vec<Solution>,
    output_path: Option<PathBuf>,
    cancel: CancelHandle,
}

impl EnumerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    fn begin(&mut self, tx: &TransactionData, config: &AnalyzerConfig) {
        self.transaction = Some(tx.clone());
        self.solutions.clear();
        if self.output_path.is_none() {
            self.output_path = config.output_path.clone();
        }
    }

    fn accept(&mut self, solution: Solution) {
        self.solutions.push(solution);
    }

    /// Persist the solutions accepted so far.
    ///
    /// Returns `Ok(false)` when there is no output path or no analysis has
    /// started.
    pub fn checkpoint(&self) -> Result<bool, AnalysisError> {
        match (&self.output_path, &self.transaction) {
            (Some(path), Some(tx)) => {
                save_solutions(path, tx, &self.solutions)?;
                debug!(
                    "Checkpoint: {} solution(s) written to {}",
                    self.solutions.len(),
                    path.display()
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn checkpoint_logged(&self) {
        if let Err(e) = self.checkpoint() {
            error!("Failed to save solutions: {}", e);
        }
    }
}

/// Runs greedy matching, then enumerates distinct solutions of the reduced
/// model, cutting each one off before the next solve.
pub struct EnumerationDriver<'a> {
    tx: &'a TransactionData,
    config: &'a AnalyzerConfig,
    exclusion_cuts: bool,
}

impl<'a> EnumerationDriver<'a> {
    pub fn new(tx: &'a TransactionData, config: &'a AnalyzerConfig) -> Self {
        Self {
            tx,
            config,
            exclusion_cuts: true,
        }
    }

    /// Re-solve the same model every iteration, so each solve repeats.
    #[cfg(test)]
    fn without_exclusion_cuts(mut self) -> Self {
        self.exclusion_cuts = false;
        self
    }

    pub fn run(&self, ctx: &mut EnumerationContext) -> Result<AnalysisResult, AnalysisError> {
        self.config.validate()?;
        self.tx.validate()?;
        ctx.begin(self.tx, self.config);

        info!(
            "Analyzing {}: {} inputs, {} participants, max maker fee {} sats",
            self.tx.txid(),
            self.tx.inputs().len(),
            self.tx.num_participants(),
            self.tx.max_maker_fee(self.config.max_fee_rel)
        );

        let greedy = if self.tx.num_participants() >= self.config.greedy_min_participants {
            GreedyMatcher::new(self.tx, self.config.max_fee_rel).run()
        } else {
            info!(
                "Skipping greedy matching below {} participants",
                self.config.greedy_min_participants
            );
            GreedyAssignment::empty(self.tx)
        };

        if greedy.is_complete() {
            let solution = short_circuit_solution(self.tx, &greedy)?;
            if greedy.unassigned_changes().is_empty() && solution.is_valid() {
                log_solution(1, &solution);
                ctx.accept(solution);
                ctx.checkpoint_logged();
                return Ok(self.finish(ctx, Termination::ShortCircuit, 0, 0));
            }
            warn!(
                "Greedy matching placed every input but left {} change output(s) unmatched \
                 with a discrepancy of {} sats: no valid partition",
                greedy.unassigned_changes().len(),
                solution.discrepancy()
            );
            ctx.checkpoint_logged();
            return Ok(self.finish(ctx, Termination::Exhausted, 0, 0));
        }

        let analysis = GreedyAnalysis::from_assignment(&greedy, self.tx, self.config.max_fee_rel);
        let mut model = ReducedModel::build(self.tx, &analysis, self.config.max_fee_rel);

        let mut seen: HashSet<SolutionSignature> = HashSet::new();
        let mut iterations = 0;
        let mut duplicates = 0;
        let mut consecutive_duplicates = 0;

        let termination = loop {
            if ctx.is_cancelled() {
                warn!("Analysis cancelled, saving {} solution(s)", ctx.solutions().len());
                ctx.checkpoint_logged();
                break Termination::Cancelled;
            }
            if ctx.solutions().len() >= self.config.max_solutions {
                break Termination::SolutionCap;
            }

            iterations += 1;
            let values = match model.solve(self.config.time_limit()) {
                SolveOutcome::Optimal(values) => values,
                SolveOutcome::Infeasible => break Termination::Exhausted,
                SolveOutcome::TimedOut => break Termination::TimeLimit,
                SolveOutcome::Failed(message) => {
                    if ctx.solutions().is_empty() {
                        return Err(AnalysisError::Solver(message));
                    }
                    error!("Solver failed: {}", message);
                    break Termination::SolverFailed;
                }
            };

            let extracted = match extract_solution(self.tx, &greedy, &model, &values) {
                Ok(extracted) => extracted,
                Err(e) => {
                    if ctx.solutions().is_empty() {
                        return Err(e);
                    }
                    error!("{}", e);
                    break Termination::ExtractionFailed;
                }
            };

            let signature = SolutionSignature::of(&extracted.solution);
            if seen.insert(signature) {
                consecutive_duplicates = 0;
                log_solution(ctx.solutions().len() + 1, &extracted.solution);
                ctx.accept(extracted.solution);
                if self.config.save_incrementally {
                    ctx.checkpoint_logged();
                }
            } else {
                duplicates += 1;
                consecutive_duplicates += 1;
                debug!(
                    "Iteration {}: duplicate solution ({} in a row)",
                    iterations, consecutive_duplicates
                );
            }

            if self.exclusion_cuts {
                add_exclusion_cut(&mut model, &extracted.slot_profiles);
            }

            if consecutive_duplicates >= MAX_CONSECUTIVE_DUPLICATES {
                warn!(
                    "{} consecutive duplicates, stopping enumeration",
                    consecutive_duplicates
                );
                break Termination::DuplicateLimit;
            }
        };

        if !self.config.save_incrementally {
            ctx.checkpoint_logged();
        }
        Ok(self.finish(ctx, termination, iterations, duplicates))
    }

    fn finish(
        &self,
        ctx: &EnumerationContext,
        termination: Termination,
        iterations: usize,
        duplicates: usize,
    ) -> AnalysisResult {
        info!(
            "Found {} solution(s) in {} solve(s): {}",
            ctx.solutions().len(),
            iterations,
            termination
        );
        AnalysisResult::new(
            self.tx.clone(),
            ctx.solutions().to_vec(),
            termination,
            iterations,
            duplicates,
        )
    }
}

/// Build the only solution of a transaction greedy matching fully resolved.
///
/// The taker is the participant with the largest signed fee; on a tie the
/// lowest participant number wins.
fn short_circuit_solution(
    tx: &TransactionData,
    greedy: &GreedyAssignment,
) -> Result<Solution, AnalysisError> {
    if !greedy.unassigned_participants().is_empty() {
        return Err(AnalysisError::Extraction(format!(
            "every input was matched but {} participant(s) received none",
            greedy.unassigned_participants().len()
        )));
    }

    let mut participants: Vec<Participant> = greedy
        .forced_changes()
        .iter()
        .map(|(&participant, change)| {
            let inputs = greedy
                .inputs_of(participant)
                .into_iter()
                .map(|i| tx.inputs()[i].clone())
                .collect();
            let change = change
                .change_position()
                .map(|j| tx.change_outputs()[j].clone());
            Participant::new(Role::Maker, inputs, tx.equal_amount(), change)
        })
        .collect();

    let mut taker = 0;
    for (idx, p) in participants.iter().enumerate() {
        if p.fee() > participants[taker].fee() {
            taker = idx;
        }
    }
    if greedy.taker().is_some_and(|t| t != taker) {
        warn!(
            "Greedy confirmed participant {} as taker, but participant {} pays the most",
            greedy.taker().map_or(0, |t| t + 1),
            taker + 1
        );
    }

    let p = &participants[taker];
    participants[taker] = Participant::new(
        Role::Taker,
        p.inputs().to_vec(),
        p.equal_output(),
        p.change_output().cloned(),
    );
    Solution::from_participants(participants, tx.network_fee())
}

/// Analyse `tx` with a fresh context.
pub fn analyze_transaction(
    tx: &TransactionData,
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let mut ctx = EnumerationContext::new();
    EnumerationDriver::new(tx, config).run(&mut ctx)
}
