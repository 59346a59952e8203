use crate::core::transaction::TransactionData;
use crate::greedy::analyzer::GreedyAnalysis;
use crate::optimization::model::{ConstraintStore, LinearExpr, SolveOutcome, VarId};
use log::info;
use std::time::Duration;

/// Integer program over the elements the greedy pass left open.
///
/// Unassigned inputs, changes and participant slots are re-indexed densely;
/// `inputs[i]`, `changes[j]` and `slots[p]` map a reduced index back to the
/// transaction position (or participant number).
///
/// Variables:
/// - `x[i][p]`: input `i` belongs to slot `p`
/// - `c[p][j]`: slot `p` receives change `j`
/// - `t[p]`: slot `p` is the taker, present only while the taker is unknown
/// - `net_cost[p]`: `Σ inputs − change − equal_amount` of slot `p`
#[derive(Debug, Clone)]
pub struct ReducedModel {
    store: ConstraintStore,
    inputs: Vec<usize>,
    changes: Vec<usize>,
    slots: Vec<usize>,
    x: Vec<Vec<VarId>>,
    c: Vec<Vec<VarId>>,
    t: Option<Vec<VarId>>,
    net_cost: Vec<VarId>,
    big_m: i64,
    max_reasonable_fee: i64,
}

impl ReducedModel {
    pub fn build(tx: &TransactionData, analysis: &GreedyAnalysis, max_fee_rel: f64) -> Self {
        let inputs = analysis.unassigned_inputs.clone();
        let changes = analysis.unassigned_changes.clone();
        let slots = analysis.unassigned_participants.clone();

        let input_amounts: Vec<f64> = inputs
            .iter()
            .map(|&i| tx.inputs()[i].amount() as f64)
            .collect();
        let change_amounts: Vec<f64> = changes
            .iter()
            .map(|&j| tx.change_outputs()[j].amount() as f64)
            .collect();

        let equal = tx.signed_equal_amount();
        let network_fee = tx.network_fee();
        let max_reasonable_fee = tx.max_maker_fee(max_fee_rel);
        // Bounds |net_cost| of any slot, whatever it is given.
        let big_m = input_amounts.iter().sum::<f64>() as i64
            + change_amounts.iter().sum::<f64>() as i64
            + equal
            + network_fee;
        let m = big_m as f64;

        let mut store = ConstraintStore::new();

        let x: Vec<Vec<VarId>> = inputs
            .iter()
            .map(|_| slots.iter().map(|_| store.add_binary()).collect())
            .collect();
        let c: Vec<Vec<VarId>> = slots
            .iter()
            .map(|_| changes.iter().map(|_| store.add_binary()).collect())
            .collect();
        let t: Option<Vec<VarId>> = if analysis.taker_found() {
            None
        } else {
            Some(slots.iter().map(|_| store.add_binary()).collect())
        };
        // A maker is paid at most the cap; the taker pays the network fee
        // plus at most the cap to every other participant.
        let net_cost_floor = -(max_reasonable_fee as f64);
        let net_cost_ceiling = (network_fee
            + max_reasonable_fee * tx.num_participants().saturating_sub(1) as i64)
            as f64;
        let net_cost: Vec<VarId> = slots
            .iter()
            .map(|_| store.add_continuous(net_cost_floor, net_cost_ceiling))
            .collect();

        for row in &x {
            store.eq(LinearExpr::sum(row.iter().copied()), 1.0);
        }
        for j in 0..changes.len() {
            store.eq(LinearExpr::sum(c.iter().map(|row| row[j])), 1.0);
        }

        for p in 0..slots.len() {
            store.geq(LinearExpr::sum(x.iter().map(|row| row[p])), 1.0);
            store.leq(LinearExpr::sum(c[p].iter().copied()), 1.0);

            // net_cost = Σ amount·x − Σ change·c − equal
            let mut balance = LinearExpr::new();
            for (i, row) in x.iter().enumerate() {
                balance.push(row[p], input_amounts[i]);
            }
            for (j, &var) in c[p].iter().enumerate() {
                balance.push(var, -change_amounts[j]);
            }
            balance.push(net_cost[p], -1.0);
            store.eq(balance, equal as f64);
        }

        let fee_floor = net_cost_floor;
        match &t {
            Some(t) => {
                store.eq(LinearExpr::sum(t.iter().copied()), 1.0);

                let taker_floor = network_fee as f64;
                let taker_ceiling = (network_fee
                    + analysis.assigned_maker_fees
                    + analysis.remaining_maker_fees) as f64;

                for p in 0..slots.len() {
                    let b = net_cost[p];
                    // Maker: −max_fee ≤ b ≤ 0, relaxed when t = 1.
                    store.leq(LinearExpr::term(b, 1.0).with(t[p], -m), 0.0);
                    store.geq(LinearExpr::term(b, 1.0).with(t[p], m), fee_floor);
                    // Taker: network_fee ≤ b ≤ ceiling, relaxed when t = 0.
                    store.geq(LinearExpr::term(b, 1.0).with(t[p], -m), taker_floor - m);
                    store.leq(LinearExpr::term(b, 1.0).with(t[p], m), taker_ceiling + m);
                }
            }
            None => {
                for &b in &net_cost {
                    store.leq(LinearExpr::term(b, 1.0), 0.0);
                    store.geq(LinearExpr::term(b, 1.0), fee_floor);
                }
            }
        }

        info!(
            "Reduced model: {} inputs, {} changes, {} slots, {} vars, {} constraints (M = {})",
            inputs.len(),
            changes.len(),
            slots.len(),
            store.n_vars(),
            store.n_constraints(),
            big_m
        );

        Self {
            store,
            inputs,
            changes,
            slots,
            x,
            c,
            t,
            net_cost,
            big_m,
            max_reasonable_fee,
        }
    }

    pub fn solve(&self, time_limit: Duration) -> SolveOutcome {
        self.store.solve(time_limit)
    }

    pub fn store(&self) -> &ConstraintStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConstraintStore {
        &mut self.store
    }

    /// Transaction input position of reduced input `i`.
    pub fn inputs(&self) -> &[usize] {
        &self.inputs
    }

    /// Change position of reduced change `j`.
    pub fn changes(&self) -> &[usize] {
        &self.changes
    }

    /// Participant number of reduced slot `p`.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn x(&self, input: usize, slot: usize) -> VarId {
        self.x[input][slot]
    }

    pub fn c(&self, slot: usize, change: usize) -> VarId {
        self.c[slot][change]
    }

    /// Change variables of one slot.
    pub fn slot_changes(&self, slot: usize) -> &[VarId] {
        &self.c[slot]
    }

    pub fn t(&self, slot: usize) -> Option<VarId> {
        self.t.as_ref().map(|t| t[slot])
    }

    pub fn has_taker_vars(&self) -> bool {
        self.t.is_some()
    }

    pub fn net_cost(&self, slot: usize) -> VarId {
        self.net_cost[slot]
    }

    pub fn big_m(&self) -> i64 {
        self.big_m
    }

    pub fn max_reasonable_fee(&self) -> i64 {
        self.max_reasonable_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greedy::matcher::{GreedyAssignment, GreedyMatcher};
    use crate::optimization::model::VarKind;

    const EQUAL: u64 = 100_000_000;

    fn full_model(tx: &TransactionData, max_fee_rel: f64) -> ReducedModel {
        let greedy = GreedyAssignment::empty(tx);
        let analysis = GreedyAnalysis::from_assignment(&greedy, tx, max_fee_rel);
        ReducedModel::build(tx, &analysis, max_fee_rel)
    }

    #[test]
    fn test_dimensions_of_full_model() {
        let tx = TransactionData::from_amounts(
            "a",
            &[105_000_000, 105_000_000],
            EQUAL,
            2,
            &[4_000_000, 4_000_000],
        );
        let model = full_model(&tx, 0.05);

        // x: 2·2, c: 2·2, t: 2, net_cost: 2
        assert_eq!(model.store().n_vars(), 12);
        assert!(model.has_taker_vars());
        assert_eq!(model.slots(), &[0, 1]);
        assert_eq!(model.max_reasonable_fee(), 5_000_000);
        assert_eq!(
            model.big_m(),
            210_000_000 + 8_000_000 + 100_000_000 + 2_000_000
        );
    }

    #[test]
    fn test_net_cost_bounded_by_fee_rules() {
        let tx = TransactionData::from_amounts(
            "bounds",
            &[103_000_000, 105_000_000, 101_000_000],
            EQUAL,
            3,
            &[4_000_000],
        );
        let model = full_model(&tx, 0.05);

        // Floor: the 5M maker cap. Ceiling: 5M network fee plus 5M to each
        // of the two makers.
        for p in 0..3 {
            assert_eq!(
                model.store().var_kind(model.net_cost(p)),
                VarKind::Continuous {
                    lo: -5_000_000.0,
                    hi: 15_000_000.0
                }
            );
        }
    }

    #[test]
    fn test_big_m_scales_with_transaction() {
        let small = TransactionData::from_amounts("s", &[105, 103], 100, 2, &[4]);
        let large = TransactionData::from_amounts(
            "l",
            &[2_100_000_000_000, 2_100_000_000_000],
            2_000_000_000_000,
            2,
            &[100_000_000_000],
        );
        assert!(full_model(&large, 0.05).big_m() > 4_000_000_000_000);
        assert!(full_model(&small, 0.05).big_m() < 1_000);
    }

    #[test]
    fn test_known_taker_drops_role_variables() {
        let tx = TransactionData::from_amounts(
            "b",
            &[120_000_000, 100_000_000],
            EQUAL,
            2,
            &[10_000_000],
        );
        let greedy = GreedyMatcher::new(&tx, 0.05).run();
        let analysis = GreedyAnalysis::from_assignment(&greedy, &tx, 0.05);
        let model = ReducedModel::build(&tx, &analysis, 0.05);

        assert!(!model.has_taker_vars());
        assert_eq!(model.inputs(), &[1]);
        assert!(model.changes().is_empty());
        assert_eq!(model.slots(), &[1]);
        assert!(model.t(0).is_none());
    }

    #[test]
    fn test_full_model_finds_balanced_split() {
        let tx = TransactionData::from_amounts(
            "c",
            &[103_000_000, 105_000_000],
            EQUAL,
            2,
            &[4_000_000],
        );
        let model = full_model(&tx, 0.05);

        let values = match model.solve(Duration::from_secs(30)) {
            SolveOutcome::Optimal(values) => values,
            other => panic!("expected optimal, got {:?}", other),
        };
        let taker_slot = (0..2)
            .find(|&p| values.is_set(model.t(p).unwrap()))
            .unwrap();
        // The only balanced reading: 105M pays 4M network + 1M to the maker.
        assert!(values.is_set(model.x(1, taker_slot)));
        assert_eq!(values.integer(model.net_cost(taker_slot)), 5_000_000);
    }

    #[test]
    fn test_zero_fee_cap_makes_nonzero_maker_fee_infeasible() {
        let tx = TransactionData::from_amounts(
            "d",
            &[103_000_000, 105_000_000],
            EQUAL,
            2,
            &[4_000_000],
        );
        let model = full_model(&tx, 0.0);
        assert_eq!(model.solve(Duration::from_secs(30)), SolveOutcome::Infeasible);
    }
}
