//! Ledger collaborator interface
//!
//! The ledger is the sole source of truth: it orders operations per signer,
//! applies them and issues immutable receipts. This module defines what the
//! orchestration core consumes from it and ships two implementations.

pub mod memory;
pub mod rpc;

use crate::clock::Clock;
use crate::config::{LedgerConfig, LedgerMode};
use crate::operation::{OperationRef, Receipt, SignedOperation};
use crate::types::{Address, LcId, LetterOfCredit};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use memory::{Fault, InMemoryLedger, LedgerStats, MemoryLedgerConfig};
pub use rpc::RpcLedgerClient;

/// Ledger-side status of a broadcast operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "receipt", rename_all = "lowercase")]
pub enum OperationStatus {
    /// Never seen by the ledger
    Unknown,
    /// Accepted, not yet final
    Pending,
    /// Final receipt available
    Finalized(Receipt),
}

/// Outcome of a bounded receipt wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptWait {
    /// Receipt arrived in time
    Confirmed(Receipt),
    /// Wait bound elapsed; the operation may still be applied
    TimedOut,
}

/// Operations consumed from the ledger collaborator
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Next unused sequence number for `signer`, counting accepted pending operations
    async fn next_sequence_number(&self, signer: &Address) -> Result<u64>;

    /// Current fee rate floor
    async fn current_fee_rate(&self) -> Result<u64>;

    /// Broadcast a signed operation
    async fn submit_signed_operation(&self, operation: &SignedOperation) -> Result<OperationRef>;

    /// Non-blocking status lookup
    async fn operation_status(&self, reference: &OperationRef) -> Result<OperationStatus>;

    /// Current state of an LC; `NotFound` if the ledger has no such id
    async fn query_state(&self, lc_id: LcId) -> Result<LetterOfCredit>;

    /// Interval between status polls while awaiting a receipt
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    /// Wait for a final receipt, bounded by `timeout`.
    ///
    /// Dropping the returned future stops the wait; it never affects the
    /// operation itself.
    async fn await_receipt(
        &self,
        reference: &OperationRef,
        timeout: Duration,
    ) -> Result<ReceiptWait> {
        let poll = async {
            loop {
                if let OperationStatus::Finalized(receipt) = self.operation_status(reference).await?
                {
                    return Ok(receipt);
                }
                tokio::time::sleep(self.poll_interval()).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(Ok(receipt)) => Ok(ReceiptWait::Confirmed(receipt)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(ReceiptWait::TimedOut),
        }
    }
}

/// Build the configured ledger collaborator
pub fn connect(config: &LedgerConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn LedgerClient>> {
    match config.mode {
        LedgerMode::Memory => {
            let ledger = InMemoryLedger::new(
                MemoryLedgerConfig {
                    fee_rate: config.memory_fee_rate,
                    confirmation_delay: Duration::from_millis(config.memory_confirmation_delay_ms),
                    poll_interval: config.poll_interval(),
                    ..MemoryLedgerConfig::default()
                },
                clock,
            );
            tracing::warn!("Using in-memory ledger; state is lost on restart");
            Ok(Arc::new(ledger))
        }
        LedgerMode::Rpc => {
            let client = RpcLedgerClient::new(
                &config.rpc_url,
                config.request_timeout(),
                config.poll_interval(),
            )?;
            tracing::info!(url = %config.rpc_url, "Using JSON-RPC ledger");
            Ok(Arc::new(client))
        }
    }
}
