use crate::optimization::builder::ReducedModel;
use crate::optimization::extraction::SlotProfile;
use crate::optimization::model::{LinearExpr, VarId};
use log::debug;

/// Forbid the model from reproducing `profiles` under any slot relabeling.
///
/// For every observed profile `q` and slot `p` an indicator `m[q][p]` is
/// pinned to 1 exactly when slot `p` carries the same input set, the same
/// change (or none) and, while the taker is open, the same role. Indicators
/// are OR-ed per profile into `y[q]`, and the cut is `Σ y ≤ |profiles| − 1`.
///
/// Returns the number of constraints appended.
pub fn add_exclusion_cut(model: &mut ReducedModel, profiles: &[SlotProfile]) -> usize {
    if profiles.is_empty() {
        return 0;
    }

    let before = model.store().n_constraints();
    let n_slots = model.slots().len();
    let mut matched = Vec::with_capacity(profiles.len());

    for profile in profiles {
        let indicators: Vec<VarId> = (0..n_slots)
            .map(|p| add_match_indicator(model, profile, p))
            .collect();

        let y = model.store_mut().add_binary();
        for &m in &indicators {
            model
                .store_mut()
                .geq(LinearExpr::term(y, 1.0).with(m, -1.0), 0.0);
        }
        let mut any = LinearExpr::term(y, 1.0);
        for &m in &indicators {
            any.push(m, -1.0);
        }
        model.store_mut().leq(any, 0.0);
        matched.push(y);
    }

    let count = matched.len();
    model
        .store_mut()
        .leq(LinearExpr::sum(matched), count as f64 - 1.0);

    let added = model.store().n_constraints() - before;
    debug!(
        "Exclusion cut over {} profile(s): {} constraints",
        count, added
    );
    added
}

/// Indicator equal to 1 iff slot `p` matches `profile` exactly.
fn add_match_indicator(model: &mut ReducedModel, profile: &SlotProfile, p: usize) -> VarId {
    let n_inputs = model.inputs().len();
    let inside: Vec<VarId> = profile.inputs.iter().map(|&i| model.x(i, p)).collect();
    let outside: Vec<VarId> = (0..n_inputs)
        .filter(|i| !profile.inputs.contains(i))
        .map(|i| model.x(i, p))
        .collect();
    let slot_changes: Vec<VarId> = model.slot_changes(p).to_vec();
    let role = model.t(p);

    let size = inside.len() as f64;
    let k = outside.len() as f64;
    let store = model.store_mut();
    let m = store.add_binary();

    // Upper side: m may be 1 only if every part matches.
    let mut all_inside = LinearExpr::term(m, 1.0);
    for &x in &inside {
        all_inside.push(x, -1.0);
    }
    store.leq(all_inside, 1.0 - size);

    if !outside.is_empty() {
        let mut none_outside = LinearExpr::term(m, k);
        for &x in &outside {
            none_outside.push(x, 1.0);
        }
        store.leq(none_outside, k);
    }

    match profile.change {
        Some(j) => store.leq(LinearExpr::term(m, 1.0).with(slot_changes[j], -1.0), 0.0),
        None => {
            let mut no_change = LinearExpr::term(m, 1.0);
            for &c in &slot_changes {
                no_change.push(c, 1.0);
            }
            store.leq(no_change, 1.0);
        }
    }

    if let Some(t) = role {
        if profile.is_taker {
            store.leq(LinearExpr::term(m, 1.0).with(t, -1.0), 0.0);
        } else {
            store.leq(LinearExpr::term(m, 1.0).with(t, 1.0), 1.0);
        }
    }

    // Lower side: m ≥ 1 when every part matches.
    // m ≥ Σin − (|S| − 1) − Σout + (change_term − 1) + (role_term − 1)
    let mut lower = LinearExpr::term(m, 1.0);
    let mut rhs = 1.0 - size;
    for &x in &inside {
        lower.push(x, -1.0);
    }
    for &x in &outside {
        lower.push(x, 1.0);
    }
    match profile.change {
        Some(j) => {
            lower.push(slot_changes[j], -1.0);
            rhs -= 1.0;
        }
        None => {
            for &c in &slot_changes {
                lower.push(c, 1.0);
            }
        }
    }
    if let Some(t) = role {
        if profile.is_taker {
            lower.push(t, -1.0);
            rhs -= 1.0;
        } else {
            lower.push(t, 1.0);
        }
    }
    store.geq(lower, rhs);

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TransactionData;
    use crate::greedy::analyzer::GreedyAnalysis;
    use crate::greedy::matcher::GreedyAssignment;
    use crate::optimization::extraction::extract_solution;
    use crate::optimization::model::SolveOutcome;
    use crate::optimization::signature::SolutionSignature;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const LIMIT: Duration = Duration::from_secs(30);

    fn full_model(tx: &TransactionData, max_fee_rel: f64) -> (GreedyAssignment, ReducedModel) {
        let greedy = GreedyAssignment::empty(tx);
        let analysis = GreedyAnalysis::from_assignment(&greedy, tx, max_fee_rel);
        let model = ReducedModel::build(tx, &analysis, max_fee_rel);
        (greedy, model)
    }

    #[test]
    fn test_empty_profiles_add_nothing() {
        let tx = TransactionData::from_amounts("a", &[105, 103], 100, 2, &[4]);
        let (_, mut model) = full_model(&tx, 0.05);
        assert_eq!(add_exclusion_cut(&mut model, &[]), 0);
    }

    #[test]
    fn test_single_solution_is_excluded_then_infeasible() {
        let tx = TransactionData::from_amounts(
            "b",
            &[103_000_000, 105_000_000],
            100_000_000,
            2,
            &[4_000_000],
        );
        let (greedy, mut model) = full_model(&tx, 0.05);

        let values = match model.solve(LIMIT) {
            SolveOutcome::Optimal(values) => values,
            other => panic!("expected optimal, got {:?}", other),
        };
        let extracted = extract_solution(&tx, &greedy, &model, &values).unwrap();
        assert!(add_exclusion_cut(&mut model, &extracted.slot_profiles) > 0);

        assert_eq!(model.solve(LIMIT), SolveOutcome::Infeasible);
    }

    #[test]
    fn test_cuts_walk_through_symmetric_solutions() {
        // Two twin participants with zero fees: either input may pair with
        // either change and either may be the taker.
        let tx = TransactionData::from_amounts(
            "c",
            &[104_000_000, 104_000_000],
            100_000_000,
            2,
            &[4_000_000, 4_000_000],
        );
        let (greedy, mut model) = full_model(&tx, 0.05);

        let mut seen = BTreeSet::new();
        loop {
            let values = match model.solve(LIMIT) {
                SolveOutcome::Optimal(values) => values,
                SolveOutcome::Infeasible => break,
                other => panic!("unexpected outcome {:?}", other),
            };
            let extracted = extract_solution(&tx, &greedy, &model, &values).unwrap();
            assert!(seen.insert(SolutionSignature::of(&extracted.solution)));
            add_exclusion_cut(&mut model, &extracted.slot_profiles);
            assert!(seen.len() <= 4);
        }

        assert_eq!(seen.len(), 4);
    }
}
