pub mod error;
pub mod participant;
pub mod result;
pub mod solution;
pub mod transaction;
pub mod utxo;
