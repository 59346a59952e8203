use crate::core::error::AnalysisError;
use crate::core::utxo::{total_amount, Utxo, MAX_MONEY};
use log::info;
use serde::{Deserialize, Serialize};

/// A parsed CoinJoin transaction, the sole input of the analysis core.
///
/// Outputs are split into the equal-amount anonymity set (`equal_outputs`)
/// and everything else (`change_outputs`). Each equal output stands for one
/// participant, so `num_participants == equal_outputs.len()`.
///
/// Immutable once built.
///
/// # Examples
///
/// ```
/// use coinjoin_analyzer::core::transaction::TransactionData;
///
/// let tx = TransactionData::from_amounts(
///     "example",
///     &[105_000_000],
///     100_000_000,
///     1,
///     &[4_000_000],
/// );
/// assert_eq!(tx.network_fee(), 1_000_000);
/// assert_eq!(tx.num_participants(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    txid: String,
    inputs: Vec<Utxo>,
    equal_outputs: Vec<Utxo>,
    change_outputs: Vec<Utxo>,
    /// Σinputs − Σoutputs, in satoshis.
    network_fee: i64,
    num_participants: usize,
    equal_amount: u64,
}

impl TransactionData {
    pub fn new(
        txid: impl Into<String>,
        inputs: Vec<Utxo>,
        equal_outputs: Vec<Utxo>,
        change_outputs: Vec<Utxo>,
        network_fee: i64,
        equal_amount: u64,
    ) -> Self {
        let num_participants = equal_outputs.len();
        Self {
            txid: txid.into(),
            inputs,
            equal_outputs,
            change_outputs,
            network_fee,
            num_participants,
            equal_amount,
        }
    }

    /// Build a transaction from bare amounts (mostly for tests and synthetic data).
    ///
    /// Inputs are indexed `0..`, equal outputs occupy output indices
    /// `0..num_participants` and change outputs follow them. The network fee
    /// is derived from the totals.
    pub fn from_amounts(
        txid: impl Into<String>,
        input_amounts: &[u64],
        equal_amount: u64,
        num_participants: usize,
        change_amounts: &[u64],
    ) -> Self {
        let inputs: Vec<Utxo> = input_amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| Utxo::new(format!("input{}", i), amount, i))
            .collect();
        let equal_outputs: Vec<Utxo> = (0..num_participants)
            .map(|i| Utxo::new(format!("equal{}", i), equal_amount, i))
            .collect();
        let change_outputs: Vec<Utxo> = change_amounts
            .iter()
            .enumerate()
            .map(|(j, &amount)| {
                Utxo::new(format!("change{}", j), amount, num_participants + j)
            })
            .collect();

        let network_fee = total_amount(&inputs)
            - total_amount(&equal_outputs)
            - total_amount(&change_outputs);

        Self::new(
            txid,
            inputs,
            equal_outputs,
            change_outputs,
            network_fee,
            equal_amount,
        )
    }

    /// Parse an Esplora/mempool-style transaction document.
    ///
    /// The most frequent output amount becomes the equal amount; ties go to
    /// the amount seen first.
    pub fn from_json_str(raw: &str) -> Result<Self, AnalysisError> {
        let raw: RawTransaction = serde_json::from_str(raw)
            .map_err(|e| AnalysisError::MalformedTransaction(e.to_string()))?;
        Self::from_document(raw)
    }

    /// Same as [`from_json_str`](Self::from_json_str) for an already decoded document.
    pub fn from_raw(value: &serde_json::Value) -> Result<Self, AnalysisError> {
        let raw = RawTransaction::deserialize(value)
            .map_err(|e| AnalysisError::MalformedTransaction(e.to_string()))?;
        Self::from_document(raw)
    }

    fn from_document(raw: RawTransaction) -> Result<Self, AnalysisError> {
        if raw.vout.is_empty() {
            return Err(AnalysisError::MalformedTransaction(format!(
                "transaction {} has no outputs",
                raw.txid
            )));
        }

        let inputs: Vec<Utxo> = raw
            .vin
            .iter()
            .enumerate()
            .map(|(idx, vin)| {
                let address = vin
                    .prevout
                    .scriptpubkey_address
                    .clone()
                    .unwrap_or_else(|| format!("unknown_{}", idx));
                Utxo::new(address, vin.prevout.value, idx)
            })
            .collect();

        let outputs: Vec<Utxo> = raw
            .vout
            .iter()
            .enumerate()
            .map(|(idx, vout)| {
                let address = vout
                    .scriptpubkey_address
                    .clone()
                    .unwrap_or_else(|| format!("unknown_{}", idx));
                Utxo::new(address, vout.value, idx)
            })
            .collect();

        check_amounts(&raw.txid, inputs.iter().chain(&outputs))?;
        let (equal_amount, num_participants) = most_common_amount(&outputs);

        let (equal_outputs, change_outputs): (Vec<Utxo>, Vec<Utxo>) = outputs
            .iter()
            .cloned()
            .partition(|out| out.amount() == equal_amount);

        let network_fee = total_amount(&inputs) - total_amount(&outputs);

        info!(
            "Identified {} equal outputs of {} sats",
            num_participants, equal_amount
        );
        info!(
            "Inputs: {}, Change outputs: {}",
            inputs.len(),
            change_outputs.len()
        );
        info!("Network fee: {} sats", network_fee);

        let tx = Self::new(
            raw.txid,
            inputs,
            equal_outputs,
            change_outputs,
            network_fee,
            equal_amount,
        );
        tx.validate()?;
        Ok(tx)
    }

    /// Check the structural invariants the analysis relies on.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check_amounts(
            &self.txid,
            self.inputs
                .iter()
                .chain(&self.equal_outputs)
                .chain(&self.change_outputs),
        )?;
        if self.inputs.is_empty() {
            return Err(AnalysisError::MalformedTransaction(format!(
                "transaction {} has no inputs",
                self.txid
            )));
        }
        if self.num_participants == 0 {
            return Err(AnalysisError::MalformedTransaction(format!(
                "transaction {} has no equal outputs",
                self.txid
            )));
        }
        if let Some(out) = self
            .equal_outputs
            .iter()
            .find(|out| out.amount() != self.equal_amount)
        {
            return Err(AnalysisError::MalformedTransaction(format!(
                "equal output {} does not carry the equal amount {}",
                out, self.equal_amount
            )));
        }
        if self.network_fee < 0 {
            return Err(AnalysisError::MalformedTransaction(format!(
                "negative network fee {} (outputs exceed inputs)",
                self.network_fee
            )));
        }
        let expected_fee = total_amount(&self.inputs)
            - total_amount(&self.equal_outputs)
            - total_amount(&self.change_outputs);
        if expected_fee != self.network_fee {
            return Err(AnalysisError::MalformedTransaction(format!(
                "declared network fee {} does not match inputs minus outputs ({})",
                self.network_fee, expected_fee
            )));
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn txid(&self) -> &str {
        &self.txid
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn equal_outputs(&self) -> &[Utxo] {
        &self.equal_outputs
    }

    pub fn change_outputs(&self) -> &[Utxo] {
        &self.change_outputs
    }

    pub fn network_fee(&self) -> i64 {
        self.network_fee
    }

    pub fn num_participants(&self) -> usize {
        self.num_participants
    }

    pub fn equal_amount(&self) -> u64 {
        self.equal_amount
    }

    /// Signed view of the equal amount, for fee arithmetic.
    pub fn signed_equal_amount(&self) -> i64 {
        self.equal_amount as i64
    }

    pub fn num_outputs(&self) -> usize {
        self.equal_outputs.len() + self.change_outputs.len()
    }

    /// Largest individual maker fee allowed for a relative fee cap.
    pub fn max_maker_fee(&self, max_fee_rel: f64) -> i64 {
        (self.equal_amount as f64 * max_fee_rel).floor() as i64
    }
}

/// Parse a raw transaction document read from disk.
pub fn parse_raw_transaction(raw: &str) -> Result<TransactionData, AnalysisError> {
    TransactionData::from_json_str(raw)
}

fn check_amounts<'a>(
    txid: &str,
    utxos: impl IntoIterator<Item = &'a Utxo>,
) -> Result<(), AnalysisError> {
    match utxos.into_iter().find(|u| u.exceeds_max_money()) {
        Some(u) => Err(AnalysisError::MalformedTransaction(format!(
            "transaction {}: amount {} exceeds {} sats",
            txid,
            u.amount(),
            MAX_MONEY
        ))),
        None => Ok(()),
    }
}

/// Most frequent amount and its count; ties go to the amount seen first.
fn most_common_amount(outputs: &[Utxo]) -> (u64, usize) {
    let mut counts: Vec<(u64, usize)> = Vec::new();
    for out in outputs {
        match counts.iter_mut().find(|(amount, _)| *amount == out.amount()) {
            Some((_, count)) => *count += 1,
            None => counts.push((out.amount(), 1)),
        }
    }

    let mut best = (0, 0);
    for (amount, count) in counts {
        if count > best.1 {
            best = (amount, count);
        }
    }
    best
}

/// Esplora-style transaction document.
#[derive(Debug, Deserialize)]
struct RawTransaction {
    txid: String,
    vin: Vec<RawInput>,
    vout: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    prevout: RawOutput,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_coinjoin() {
        let raw = json!({
            "txid": "test123",
            "vin": [
                {"prevout": {"scriptpubkey_address": "addr1", "value": 100_000_000u64}},
                {"prevout": {"scriptpubkey_address": "addr2", "value": 100_000_000u64}},
            ],
            "vout": [
                {"scriptpubkey_address": "equal1", "value": 50_000_000u64},
                {"scriptpubkey_address": "equal2", "value": 50_000_000u64},
                {"scriptpubkey_address": "change1", "value": 45_000_000u64},
                {"scriptpubkey_address": "change2", "value": 44_000_000u64},
            ],
        });

        let tx = TransactionData::from_raw(&raw).unwrap();
        assert_eq!(tx.txid(), "test123");
        assert_eq!(tx.inputs().len(), 2);
        assert_eq!(tx.equal_outputs().len(), 2);
        assert_eq!(tx.change_outputs().len(), 2);
        assert_eq!(tx.equal_amount(), 50_000_000);
        assert_eq!(tx.num_participants(), 2);
        assert_eq!(tx.network_fee(), 11_000_000);
        // Output indices survive the split.
        assert_eq!(tx.change_outputs()[0].index(), 2);
    }

    #[test]
    fn test_parse_no_change() {
        let raw = r#"{
            "txid": "test456",
            "vin": [
                {"prevout": {"scriptpubkey_address": "addr1", "value": 55000000}},
                {"prevout": {"scriptpubkey_address": "addr2", "value": 55000000}}
            ],
            "vout": [
                {"scriptpubkey_address": "equal1", "value": 50000000},
                {"scriptpubkey_address": "equal2", "value": 50000000}
            ]
        }"#;

        let tx = TransactionData::from_json_str(raw).unwrap();
        assert!(tx.change_outputs().is_empty());
        assert_eq!(tx.network_fee(), 10_000_000);
    }

    #[test]
    fn test_parse_missing_address_gets_placeholder() {
        let raw = json!({
            "txid": "anon",
            "vin": [{"prevout": {"value": 10_000u64}}],
            "vout": [{"value": 9_000u64}],
        });
        let tx = TransactionData::from_raw(&raw).unwrap();
        assert_eq!(tx.inputs()[0].address(), "unknown_0");
        assert_eq!(tx.equal_outputs()[0].address(), "unknown_0");
    }

    #[test]
    fn test_parse_missing_prevout_is_malformed() {
        let raw = json!({
            "txid": "broken",
            "vin": [{"txid": "abc", "vout": 0}],
            "vout": [{"value": 9_000u64}],
        });
        let err = TransactionData::from_raw(&raw).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedTransaction(_)));
    }

    #[test]
    fn test_parse_outputs_exceeding_inputs_is_malformed() {
        let raw = json!({
            "txid": "overspend",
            "vin": [{"prevout": {"value": 1_000u64}}],
            "vout": [{"value": 2_000u64}],
        });
        let err = TransactionData::from_raw(&raw).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedTransaction(_)));
    }

    #[test]
    fn test_parse_amount_above_max_money_is_malformed() {
        let raw = json!({
            "txid": "inflated",
            "vin": [{"prevout": {"value": u64::MAX}}],
            "vout": [{"value": 9_000u64}, {"value": 9_000u64}],
        });
        let err = TransactionData::from_raw(&raw).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedTransaction(_)));

        let tx = TransactionData::from_amounts("big", &[MAX_MONEY + 1], 100, 1, &[]);
        assert!(matches!(
            tx.validate().unwrap_err(),
            AnalysisError::MalformedTransaction(_)
        ));
    }

    #[test]
    fn test_most_common_amount_tie_prefers_first() {
        let outputs = vec![
            Utxo::new("a", 7, 0),
            Utxo::new("b", 5, 1),
            Utxo::new("c", 5, 2),
            Utxo::new("d", 7, 3),
        ];
        assert_eq!(most_common_amount(&outputs), (7, 2));
    }

    #[test]
    fn test_from_amounts_layout() {
        let tx = TransactionData::from_amounts("t", &[103, 105], 100, 2, &[4]);
        assert_eq!(tx.network_fee(), 4);
        assert_eq!(tx.equal_outputs()[1].index(), 1);
        assert_eq!(tx.change_outputs()[0].index(), 2);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_fee_mismatch() {
        let tx = TransactionData::new(
            "t",
            vec![Utxo::new("i", 100, 0)],
            vec![Utxo::new("e", 90, 0)],
            vec![],
            5,
            90,
        );
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_max_maker_fee_floors() {
        let tx = TransactionData::from_amounts("t", &[200], 100_000_001, 1, &[]);
        assert_eq!(tx.max_maker_fee(0.005), 500_000);
        assert_eq!(tx.max_maker_fee(0.0), 0);
    }
}
