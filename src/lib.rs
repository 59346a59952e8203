//! # coinjoin-analyzer
//!
//! Reconstructs which inputs and change outputs belong to which participant
//! of a JoinMarket-style CoinJoin, and which participant was the taker.
//!
//! Given a transaction with N equal-amount outputs, the analyzer first fixes
//! every match it can prove without search, then enumerates the distinct
//! taker/maker partitions consistent with the fee rules using an integer
//! program, excluding each found partition before the next solve.
//!
//! ## Architecture
//!
//! - **core**: Data model: UTXOs, transactions, participants, solutions, results
//! - **greedy**: Search-free matching of provably unique inputs and changes
//! - **optimization**: Reduced integer model, exclusion cuts, enumeration
//! - **output**: Persisted solutions document and text summaries
//! - **simulation**: Synthetic CoinJoin generation

pub mod config;
pub mod core;
pub mod greedy;
pub mod optimization;
pub mod output;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::AnalyzerConfig;
    pub use crate::core::error::AnalysisError;
    pub use crate::core::participant::{Participant, Role};
    pub use crate::core::result::{AnalysisResult, Termination};
    pub use crate::core::solution::Solution;
    pub use crate::core::transaction::{parse_raw_transaction, TransactionData};
    pub use crate::core::utxo::Utxo;
    pub use crate::greedy::matcher::{GreedyAssignment, GreedyMatcher};
    pub use crate::optimization::enumeration::{
        analyze_transaction, CancelHandle, EnumerationContext, EnumerationDriver,
    };
}
