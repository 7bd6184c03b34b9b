//! In-memory contract ledger
//!
//! Simulates the LC contract ledger for development and tests. It enforces
//! what the real collaborator enforces (signatures, gap-free per-signer
//! sequence numbers, fee floor, gas ceilings, the LC state machine at apply
//! time) and lets tests inject deterministic faults.

use super::{LedgerClient, OperationStatus};
use crate::clock::Clock;
use crate::operation::{
    CallArg, ContractEvent, OperationKind, OperationRef, Receipt, ReceiptStatus, SignedOperation,
};
use crate::state::{check_transition, initial_state, LcEvent};
use crate::types::{Address, LcId, LetterOfCredit};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Gas charged per operation kind
fn gas_cost(kind: OperationKind) -> u64 {
    match kind {
        OperationKind::CreateLc => 180_000,
        OperationKind::ApproveLc => 45_000,
        OperationKind::SubmitDocuments => 65_000,
        OperationKind::CloseLc => 30_000,
    }
}

/// In-memory ledger configuration
#[derive(Debug, Clone)]
pub struct MemoryLedgerConfig {
    /// Fee floor
    pub fee_rate: u64,

    /// Delay between acceptance and finality
    pub confirmation_delay: Duration,

    /// Status poll interval for receipt waits
    pub poll_interval: Duration,

    /// Network latency applied to each submission before it reaches the ledger
    pub submission_delay: Duration,
}

impl Default for MemoryLedgerConfig {
    fn default() -> Self {
        Self {
            fee_rate: 1_000,
            confirmation_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
            submission_delay: Duration::ZERO,
        }
    }
}

/// Fault applied to the next submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Another operation from the same signer lands first
    SequenceCollision,
    /// Fee floor rises above the offered rate
    Underpriced,
    /// Connection drops before the operation is accepted
    Unavailable,
    /// Operation is accepted but its receipt never finalizes until released
    WithholdReceipt,
}

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// `next_sequence_number` calls
    pub sequence_fetches: u64,
    /// `current_fee_rate` calls
    pub fee_queries: u64,
    /// `submit_signed_operation` calls
    pub submissions: u64,
    /// Submissions accepted
    pub accepted: u64,
    /// Submissions rejected for a stale nonce
    pub sequence_collisions: u64,
    /// Submissions rejected for a low fee
    pub underpriced: u64,
    /// `query_state` calls
    pub state_queries: u64,
}

struct Entry {
    receipt: Receipt,
    final_at: Option<Instant>,
}

#[derive(Default)]
struct LedgerState {
    nonces: HashMap<Address, u64>,
    accepted_nonces: HashMap<Address, Vec<u64>>,
    lcs: BTreeMap<LcId, LetterOfCredit>,
    last_lc_id: u64,
    operations: HashMap<OperationRef, Entry>,
    block_number: u64,
    fee_rate: u64,
    faults: VecDeque<Fault>,
    stats: LedgerStats,
}

/// Simulated LC contract ledger
pub struct InMemoryLedger {
    config: MemoryLedgerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new(config: MemoryLedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let state = LedgerState {
            fee_rate: config.fee_rate,
            ..LedgerState::default()
        };
        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Queue a fault for an upcoming submission (FIFO)
    pub fn inject_fault(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Finalize every withheld receipt now
    pub fn release_withheld(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        for entry in state.operations.values_mut() {
            if entry.final_at.is_none() {
                entry.final_at = Some(now);
            }
        }
    }

    /// Snapshot of call counters
    pub fn stats(&self) -> LedgerStats {
        self.state.lock().stats.clone()
    }

    /// Nonces accepted from `signer`, in acceptance order
    pub fn accepted_nonces(&self, signer: &Address) -> Vec<u64> {
        self.state
            .lock()
            .accepted_nonces
            .get(signer)
            .cloned()
            .unwrap_or_default()
    }

    /// Raise or lower the fee floor
    pub fn set_fee_rate(&self, fee_rate: u64) {
        self.state.lock().fee_rate = fee_rate;
    }

    /// Execute the contract call against the LC table
    fn apply(
        &self,
        state: &mut LedgerState,
        operation: &SignedOperation,
    ) -> std::result::Result<Vec<ContractEvent>, String> {
        let from = operation.operation.from;
        let call = &operation.operation.call;
        let args = &call.args;
        let now = self.clock.now();

        let kind = call
            .kind()
            .ok_or_else(|| format!("unknown selector {}", call.selector))?;

        match kind {
            OperationKind::CreateLc => {
                let (seller, seller_bank, buyer_bank, amount, expiry_days) = match args.as_slice() {
                    [CallArg::Address(seller), CallArg::Address(seller_bank), CallArg::Address(buyer_bank), CallArg::Uint(amount), CallArg::Uint(days)] => {
                        (*seller, *seller_bank, *buyer_bank, *amount, *days)
                    }
                    _ => return Err("createLC: malformed arguments".to_string()),
                };
                if amount == 0 || expiry_days == 0 {
                    return Err("createLC: amount and expiry must be positive".to_string());
                }
                let expiry_days = i64::try_from(expiry_days)
                    .map_err(|_| "createLC: expiry out of range".to_string())?;

                state.last_lc_id += 1;
                let lc_id = LcId(state.last_lc_id);
                let lc = LetterOfCredit {
                    id: lc_id,
                    buyer: from,
                    seller,
                    buyer_bank,
                    seller_bank,
                    amount,
                    expiry: now + chrono::Duration::days(expiry_days),
                    state: initial_state(),
                    document_hash: None,
                };
                state.lcs.insert(lc_id, lc);

                Ok(vec![ContractEvent::LcCreated {
                    lc_id,
                    buyer: from,
                    seller,
                    amount,
                }])
            }
            OperationKind::ApproveLc => {
                let lc = lc_arg(state, args)?;
                let next = check_transition(lc, LcEvent::Approve, &from, now)
                    .map_err(|e| e.to_string())?;
                lc.state = next;
                Ok(vec![ContractEvent::LcApproved {
                    lc_id: lc.id,
                    bank: from,
                }])
            }
            OperationKind::SubmitDocuments => {
                let document_hash = match args.get(1) {
                    Some(CallArg::Hash(hash)) => *hash,
                    _ => return Err("submitDocuments: missing document hash".to_string()),
                };
                let lc = lc_arg(state, args)?;
                let next = check_transition(lc, LcEvent::SubmitDocuments, &from, now)
                    .map_err(|e| e.to_string())?;
                lc.state = next;
                lc.document_hash = Some(document_hash);
                Ok(vec![ContractEvent::DocumentsSubmitted {
                    lc_id: lc.id,
                    document_hash,
                }])
            }
            OperationKind::CloseLc => {
                let lc = lc_arg(state, args)?;
                let next = check_transition(lc, LcEvent::Close, &from, now)
                    .map_err(|e| e.to_string())?;
                lc.state = next;
                Ok(vec![ContractEvent::LcClosed { lc_id: lc.id }])
            }
        }
    }
}

fn lc_arg<'a>(
    state: &'a mut LedgerState,
    args: &[CallArg],
) -> std::result::Result<&'a mut LetterOfCredit, String> {
    let id = match args.first() {
        Some(CallArg::Uint(id)) => LcId(*id),
        _ => return Err("missing LC id argument".to_string()),
    };
    state
        .lcs
        .get_mut(&id)
        .ok_or_else(|| format!("LC {} does not exist", id))
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn next_sequence_number(&self, signer: &Address) -> Result<u64> {
        let mut state = self.state.lock();
        state.stats.sequence_fetches += 1;
        Ok(state.nonces.get(signer).copied().unwrap_or(0))
    }

    async fn current_fee_rate(&self) -> Result<u64> {
        let mut state = self.state.lock();
        state.stats.fee_queries += 1;
        Ok(state.fee_rate)
    }

    async fn submit_signed_operation(&self, operation: &SignedOperation) -> Result<OperationRef> {
        if !self.config.submission_delay.is_zero() {
            tokio::time::sleep(self.config.submission_delay).await;
        }

        let mut state = self.state.lock();
        state.stats.submissions += 1;

        let signer = operation.operation.from;
        let mut withhold = false;

        match state.faults.pop_front() {
            Some(Fault::Unavailable) => {
                return Err(Error::LedgerUnavailable("connection reset by ledger".to_string()));
            }
            Some(Fault::SequenceCollision) => {
                // Sequence consumed by an operation from outside this process
                *state.nonces.entry(signer).or_insert(0) += 1;
            }
            Some(Fault::Underpriced) => {
                state.stats.underpriced += 1;
                return Err(Error::UnderpricedOperation {
                    offered: operation.operation.fee_rate,
                    minimum: operation.operation.fee_rate.saturating_add(1),
                });
            }
            Some(Fault::WithholdReceipt) => withhold = true,
            None => {}
        }

        if !operation.verify() {
            return Err(Error::Rejected(format!("invalid signature from {}", signer)));
        }

        let expected = state.nonces.get(&signer).copied().unwrap_or(0);
        if operation.operation.nonce != expected {
            state.stats.sequence_collisions += 1;
            return Err(Error::SequenceCollision {
                signer,
                offered: operation.operation.nonce,
                expected,
            });
        }

        if operation.operation.fee_rate < state.fee_rate {
            state.stats.underpriced += 1;
            return Err(Error::UnderpricedOperation {
                offered: operation.operation.fee_rate,
                minimum: state.fee_rate,
            });
        }

        let reference = operation.reference()?;

        state.nonces.insert(signer, expected + 1);
        state
            .accepted_nonces
            .entry(signer)
            .or_default()
            .push(expected);
        state.stats.accepted += 1;
        state.block_number += 1;
        let block_number = state.block_number;

        let required_gas = operation
            .operation
            .call
            .kind()
            .map(gas_cost)
            .unwrap_or(0);

        let (status, gas_used, events) = if operation.operation.gas_limit < required_gas {
            (
                ReceiptStatus::Reverted {
                    reason: "out of gas".to_string(),
                },
                operation.operation.gas_limit,
                Vec::new(),
            )
        } else {
            match self.apply(&mut state, operation) {
                Ok(events) => (ReceiptStatus::Success, required_gas, events),
                Err(reason) => {
                    debug!(%reference, %reason, "Operation reverted");
                    (ReceiptStatus::Reverted { reason }, required_gas, Vec::new())
                }
            }
        };

        let final_at = if withhold {
            warn!(%reference, "Withholding receipt");
            None
        } else {
            Some(Instant::now() + self.config.confirmation_delay)
        };

        info!(
            %reference,
            %signer,
            nonce = expected,
            block = block_number,
            "Operation accepted"
        );

        state.operations.insert(
            reference.clone(),
            Entry {
                receipt: Receipt {
                    reference: reference.clone(),
                    status,
                    block_number,
                    gas_used,
                    events,
                },
                final_at,
            },
        );

        Ok(reference)
    }

    async fn operation_status(&self, reference: &OperationRef) -> Result<OperationStatus> {
        let state = self.state.lock();
        let status = match state.operations.get(reference) {
            None => OperationStatus::Unknown,
            Some(Entry {
                receipt,
                final_at: Some(at),
            }) if Instant::now() >= *at => OperationStatus::Finalized(receipt.clone()),
            Some(_) => OperationStatus::Pending,
        };
        Ok(status)
    }

    async fn query_state(&self, lc_id: LcId) -> Result<LetterOfCredit> {
        let mut state = self.state.lock();
        state.stats.state_queries += 1;
        state
            .lcs
            .get(&lc_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("LC {}", lc_id)))
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::KeyPair;
    use crate::operation::{OperationCall, UnsignedOperation};
    use crate::types::LcState;
    use chrono::Utc;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(
            MemoryLedgerConfig::default(),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn sign(keypair: &KeyPair, nonce: u64, fee_rate: u64, call: OperationCall) -> SignedOperation {
        let operation = UnsignedOperation {
            from: keypair.address(),
            nonce,
            fee_rate,
            gas_limit: 2_000_000,
            call,
        };
        let signature = keypair.sign(&operation.signing_bytes().unwrap());
        SignedOperation {
            operation,
            public_key: keypair.public_key().to_vec(),
            signature: signature.to_vec(),
        }
    }

    fn create_call(bank: Address) -> OperationCall {
        OperationCall::new(
            OperationKind::CreateLc,
            vec![
                CallArg::Address(Address::from_bytes([2u8; 20])),
                CallArg::Address(Address::from_bytes([4u8; 20])),
                CallArg::Address(bank),
                CallArg::Uint(1000),
                CallArg::Uint(30),
            ],
        )
    }

    async fn finalized(ledger: &InMemoryLedger, reference: &OperationRef) -> Receipt {
        match ledger.operation_status(reference).await.unwrap() {
            OperationStatus::Finalized(receipt) => receipt,
            other => panic!("expected finalized receipt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        let bank = Address::from_bytes([3u8; 20]);

        let first = ledger
            .submit_signed_operation(&sign(&buyer, 0, 1_000, create_call(bank)))
            .await
            .unwrap();
        let second = ledger
            .submit_signed_operation(&sign(&buyer, 1, 1_000, create_call(bank)))
            .await
            .unwrap();

        assert_eq!(finalized(&ledger, &first).await.created_lc_id(), Some(LcId(1)));
        assert_eq!(finalized(&ledger, &second).await.created_lc_id(), Some(LcId(2)));

        let lc = ledger.query_state(LcId(1)).await.unwrap();
        assert_eq!(lc.buyer, buyer.address());
        assert_eq!(lc.state, LcState::Created);
        assert_eq!(ledger.accepted_nonces(&buyer.address()), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_stale_nonce_is_collision() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        let bank = Address::from_bytes([3u8; 20]);

        ledger
            .submit_signed_operation(&sign(&buyer, 0, 1_000, create_call(bank)))
            .await
            .unwrap();
        let result = ledger
            .submit_signed_operation(&sign(&buyer, 0, 1_000, create_call(bank)))
            .await;

        assert!(matches!(
            result,
            Err(Error::SequenceCollision {
                offered: 0,
                expected: 1,
                ..
            })
        ));
        assert_eq!(ledger.stats().sequence_collisions, 1);
    }

    #[tokio::test]
    async fn test_low_fee_is_underpriced() {
        let ledger = ledger();
        let buyer = KeyPair::generate();

        let result = ledger
            .submit_signed_operation(&sign(&buyer, 0, 999, create_call(buyer.address())))
            .await;

        assert!(matches!(
            result,
            Err(Error::UnderpricedOperation {
                offered: 999,
                minimum: 1_000
            })
        ));
        assert_eq!(ledger.next_sequence_number(&buyer.address()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        let mut op = sign(&buyer, 0, 1_000, create_call(buyer.address()));
        op.signature[0] ^= 0xff;

        assert!(matches!(
            ledger.submit_signed_operation(&op).await,
            Err(Error::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_guard_violation_reverts_and_consumes_nonce() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        let bank = KeyPair::generate();

        ledger
            .submit_signed_operation(&sign(&buyer, 0, 1_000, create_call(bank.address())))
            .await
            .unwrap();

        // Documents before approval
        let docs = OperationCall::new(
            OperationKind::SubmitDocuments,
            vec![
                CallArg::Uint(1),
                CallArg::Hash(crate::crypto::hash_document(b"invoice")),
            ],
        );
        let reference = ledger
            .submit_signed_operation(&sign(&buyer, 1, 1_000, docs))
            .await
            .unwrap();

        let receipt = finalized(&ledger, &reference).await;
        assert!(matches!(receipt.status, ReceiptStatus::Reverted { .. }));
        assert_eq!(ledger.next_sequence_number(&buyer.address()).await.unwrap(), 2);
        assert_eq!(
            ledger.query_state(LcId(1)).await.unwrap().state,
            LcState::Created
        );
    }

    #[tokio::test]
    async fn test_insufficient_gas_reverts() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        let mut op = sign(&buyer, 0, 1_000, create_call(buyer.address()));
        op.operation.gas_limit = 21_000;
        let signature = buyer.sign(&op.operation.signing_bytes().unwrap());
        op.signature = signature.to_vec();

        let reference = ledger.submit_signed_operation(&op).await.unwrap();
        let receipt = finalized(&ledger, &reference).await;

        assert_eq!(
            receipt.status,
            ReceiptStatus::Reverted {
                reason: "out of gas".to_string()
            }
        );
        assert!(ledger.query_state(LcId(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_withheld_receipt_stays_pending_until_released() {
        let ledger = ledger();
        let buyer = KeyPair::generate();
        ledger.inject_fault(Fault::WithholdReceipt);

        let reference = ledger
            .submit_signed_operation(&sign(&buyer, 0, 1_000, create_call(buyer.address())))
            .await
            .unwrap();

        assert_eq!(
            ledger.operation_status(&reference).await.unwrap(),
            OperationStatus::Pending
        );
        assert_eq!(
            ledger
                .await_receipt(&reference, Duration::from_millis(30))
                .await
                .unwrap(),
            super::super::ReceiptWait::TimedOut
        );

        ledger.release_withheld();
        assert!(matches!(
            ledger.operation_status(&reference).await.unwrap(),
            OperationStatus::Finalized(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_reference_and_lc() {
        let ledger = ledger();
        assert_eq!(
            ledger
                .operation_status(&OperationRef::from_digest([9u8; 32]))
                .await
                .unwrap(),
            OperationStatus::Unknown
        );
        assert!(matches!(
            ledger.query_state(LcId(42)).await,
            Err(Error::NotFound(_))
        ));
    }
}
