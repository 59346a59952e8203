use crate::core::result::AnalysisResult;
use crate::core::solution::Solution;
use log::info;
use std::fmt;

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Taker: participant {} | maker fees: {} sats | network fee: {} sats | discrepancy: {}",
            self.taker_index() + 1,
            self.total_maker_fees(),
            self.network_fee(),
            self.discrepancy()
        )?;
        for (idx, p) in self.participants().iter().enumerate() {
            let change = match p.change_output() {
                Some(c) => format!("change[{}] {} sats", c.index(), c.amount()),
                None => "no change".to_string(),
            };
            writeln!(
                f,
                "  Participant {} ({}): inputs {:?} = {} sats, {}, fee {} sats",
                idx + 1,
                p.role(),
                p.input_indices(),
                p.input_sum(),
                change,
                p.fee()
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = self.transaction();
        writeln!(f, "=== CoinJoin Analysis ===")?;
        writeln!(f, "Transaction:   {}", tx.txid())?;
        writeln!(f, "Participants:  {}", tx.num_participants())?;
        writeln!(f, "Equal amount:  {} sats", tx.equal_amount())?;
        writeln!(f, "Network fee:   {} sats", tx.network_fee())?;
        writeln!(f, "Solutions:     {}", self.num_solutions())?;
        writeln!(f, "Stopped:       {}", self.termination())?;

        if self.num_solutions() == 0 {
            writeln!(f, "\nNo valid solution found.")?;
            return Ok(());
        }

        if self.is_unique() {
            let taker = self.solutions()[0].taker();
            writeln!(
                f,
                "\nUnique solution: the taker funded inputs {:?} and paid {} sats",
                taker.input_indices(),
                taker.fee()
            )?;
        } else {
            writeln!(f, "\nTaker is ambiguous across {} solutions:", self.num_solutions())?;
            for (input, share) in self.taker_input_probabilities() {
                writeln!(f, "  input[{}] is the taker's in {:.1}%", input, share * 100.0)?;
            }
        }

        for (idx, solution) in self.solutions().iter().enumerate() {
            writeln!(f, "\n--- Solution {} ---", idx + 1)?;
            write!(f, "{}", solution)?;
        }
        Ok(())
    }
}

/// Log an accepted solution, one line per participant.
pub fn log_solution(solution_id: usize, solution: &Solution) {
    info!(
        "Solution {}: taker is participant {}, maker fees {} sats, discrepancy {}",
        solution_id,
        solution.taker_index() + 1,
        solution.total_maker_fees(),
        solution.discrepancy()
    );
    for (idx, p) in solution.participants().iter().enumerate() {
        info!(
            "  P{} {}: inputs {:?}, change {}, fee {}",
            idx + 1,
            p.role(),
            p.input_indices(),
            p.change_output()
                .map_or("none".to_string(), |c| c.index().to_string()),
            p.fee()
        );
    }
}
