use coinjoin_analyzer::config::AnalyzerConfig;
use coinjoin_analyzer::core::participant::{Participant, Role};
use coinjoin_analyzer::core::result::Termination;
use coinjoin_analyzer::core::solution::Solution;
use coinjoin_analyzer::core::transaction::TransactionData;
use coinjoin_analyzer::greedy::matcher::{ChangeAssignment, GreedyMatcher};
use coinjoin_analyzer::optimization::enumeration::analyze_transaction;
use coinjoin_analyzer::optimization::signature::SolutionSignature;
use coinjoin_analyzer::simulation::synthetic::{generate_coinjoin, SyntheticCoinJoin, SyntheticConfig};
use proptest::prelude::*;
use std::collections::BTreeSet;

const EQUAL: u64 = 100_000_000;

/// Input amounts near the equal amount, so that greedy readings actually occur.
fn arb_inputs() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(95_000_000u64..115_000_000u64, 1..6)
}

fn arb_changes() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..15_000_000u64, 0..5)
}

fn arb_fee_rel() -> impl Strategy<Value = f64> {
    prop::sample::select(vec![0.0, 0.005, 0.02, 0.05])
}

/// Rebuild the planted layout as a solution, to compare signatures.
fn planted_solution(cj: &SyntheticCoinJoin) -> Solution {
    let tx = &cj.transaction;
    let participants = cj
        .participants
        .iter()
        .map(|p| {
            let inputs = p.inputs.iter().map(|&i| tx.inputs()[i].clone()).collect();
            let change = p.change.and_then(|idx| {
                tx.change_outputs()
                    .iter()
                    .find(|c| c.index() == idx)
                    .cloned()
            });
            Participant::new(p.role, inputs, tx.equal_amount(), change)
        })
        .collect();
    Solution::from_participants(participants, tx.network_fee()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ===================================================================
    // Greedy matching never confirms a second taker, never reuses an
    // input or change, and keeps every confirmed maker within the fee cap.
    // ===================================================================
    #[test]
    fn greedy_confirmations_are_consistent(
        inputs in arb_inputs(),
        changes in arb_changes(),
        participants in 1usize..5,
        max_fee_rel in arb_fee_rel(),
    ) {
        let tx = TransactionData::from_amounts("prop", &inputs, EQUAL, participants, &changes);
        let greedy = GreedyMatcher::new(&tx, max_fee_rel).run();
        let max_maker_fee = tx.max_maker_fee(max_fee_rel);

        let no_change = greedy
            .forced_changes()
            .values()
            .filter(|c| **c == ChangeAssignment::NoChange)
            .count();
        prop_assert!(no_change <= 1);
        if no_change == 1 {
            let taker = greedy.taker();
            prop_assert!(taker.is_some());
            prop_assert_eq!(
                greedy.forced_changes().get(&taker.unwrap()),
                Some(&ChangeAssignment::NoChange)
            );
        }

        let used: Vec<usize> = greedy
            .forced_changes()
            .values()
            .filter_map(|c| c.change_position())
            .collect();
        let unique: BTreeSet<usize> = used.iter().copied().collect();
        prop_assert_eq!(used.len(), unique.len());
        for j in &unique {
            prop_assert!(!greedy.unassigned_changes().contains(j));
        }

        prop_assert_eq!(
            greedy.forced_assignments().len() + greedy.unassigned_inputs().len(),
            tx.inputs().len()
        );
        prop_assert!(greedy.forced_participants().len() <= participants);

        for (&p, change) in greedy.forced_changes() {
            let input_sum: i64 = greedy
                .inputs_of(p)
                .iter()
                .map(|&i| tx.inputs()[i].signed_amount())
                .sum();
            let change = change
                .change_position()
                .map_or(0, |j| tx.change_outputs()[j].signed_amount());
            let fee = input_sum - change - tx.signed_equal_amount();
            if greedy.taker() == Some(p) {
                prop_assert!(fee >= tx.network_fee());
            } else {
                prop_assert!(fee <= 0 && fee >= -max_maker_fee);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    // ===================================================================
    // On synthetic CoinJoins every reported solution is a valid partition,
    // signatures never repeat, and an exhaustive run contains the layout
    // the transaction was generated from.
    // ===================================================================
    #[test]
    fn synthetic_coinjoins_are_reconstructed(
        seed in any::<u64>(),
        participants in 2usize..4,
    ) {
        let cj = generate_coinjoin(&SyntheticConfig {
            num_participants: participants,
            max_fee_rel: 0.005,
            max_inputs_per_participant: 2,
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap();
        let tx = &cj.transaction;

        let config = AnalyzerConfig::default()
            .with_max_fee_rel(0.005)
            .with_max_solutions(200)
            .with_greedy_min_participants(usize::MAX);
        let result = analyze_transaction(tx, &config).unwrap();

        let mut signatures = BTreeSet::new();
        for solution in result.solutions() {
            let mut covered: Vec<usize> = solution
                .participants()
                .iter()
                .flat_map(|p| p.input_indices())
                .collect();
            covered.sort_unstable();
            prop_assert_eq!(covered, (0..tx.inputs().len()).collect::<Vec<_>>());
            prop_assert_eq!(
                solution.participants().iter().filter(|p| p.role() == Role::Taker).count(),
                1
            );
            prop_assert_eq!(solution.discrepancy(), 0);
            prop_assert!(signatures.insert(SolutionSignature::of(solution)));
        }

        if result.termination() == Termination::Exhausted {
            let planted = SolutionSignature::of(&planted_solution(&cj));
            prop_assert!(signatures.contains(&planted));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    // ===================================================================
    // With greedy matching enabled, the merge of greedy-fixed and model
    // participants still yields valid partitions, and an exhaustive run
    // still contains the planted layout.
    // ===================================================================
    #[test]
    fn greedy_merge_recovers_planted_layout(
        seed in any::<u64>(),
        participants in 3usize..6,
    ) {
        let cj = generate_coinjoin(&SyntheticConfig {
            num_participants: participants,
            max_fee_rel: 0.005,
            max_inputs_per_participant: 2,
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap();
        let tx = &cj.transaction;

        let config = AnalyzerConfig::default()
            .with_max_fee_rel(0.005)
            .with_max_solutions(200)
            .with_greedy_min_participants(3);
        let result = analyze_transaction(tx, &config).unwrap();

        for solution in result.solutions() {
            prop_assert!(solution.is_valid());
            prop_assert_eq!(solution.participants().len(), participants);
        }

        let planted = SolutionSignature::of(&planted_solution(&cj));
        match result.termination() {
            Termination::Exhausted | Termination::ShortCircuit => {
                prop_assert!(result
                    .solutions()
                    .iter()
                    .any(|s| SolutionSignature::of(s) == planted));
            }
            _ => {}
        }
    }
}
