//! Ambiguity between interchangeable participants.
//!
//! Two participants funded identical inputs and received identical change.
//! Greedy matching can prove nothing, and enumeration reports every
//! distinct way to pair inputs with changes and pick the taker.

use coinjoin_analyzer::optimization::signature::SolutionSignature;
use coinjoin_analyzer::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("╔════════════════════════════════════════════╗");
    println!("║  coinjoin-analyzer: Symmetric Participants ║");
    println!("╚════════════════════════════════════════════╝\n");

    let tx = TransactionData::from_amounts(
        "symmetric",
        &[104_000_000, 104_000_000],
        100_000_000,
        2,
        &[4_000_000, 4_000_000],
    );

    println!("Inputs:  2 × 1.04 BTC");
    println!("Outputs: 2 × 1.00 BTC equal, 2 × 0.04 BTC change");
    println!("Network fee: {} sats\n", tx.network_fee());

    let greedy = GreedyMatcher::new(&tx, 0.05).run();
    println!(
        "Greedy matching fixed {} of {} inputs\n",
        greedy.forced_assignments().len(),
        tx.inputs().len()
    );

    let config = AnalyzerConfig::default().with_max_fee_rel(0.05);
    let result = match analyze_transaction(&tx, &config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            return;
        }
    };

    println!("━━━ Distinct solutions ━━━\n");
    for (idx, solution) in result.solutions().iter().enumerate() {
        let signature = SolutionSignature::of(solution);
        let profiles: Vec<String> = signature.profiles().iter().map(|p| p.to_string()).collect();
        println!("  {}. taker {}  |  {}", idx + 1, signature.taker(), profiles.join("  "));
    }
    println!("\nStopped: {}", result.termination());
}
