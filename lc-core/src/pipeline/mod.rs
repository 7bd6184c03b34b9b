//! Transaction submission pipeline
//!
//! Turns a [`TransactionIntent`] into a confirmed ledger effect:
//!
//! 1. **Build** the unsigned contract call
//! 2. **Sequence**: fetch the signer's next nonce just in time
//! 3. **Price**: fetch the fee rate, apply the fixed gas ceiling for the kind
//! 4. **Sign** with a credential held only for this step
//! 5. **Submit** and obtain the provisional reference
//! 6. **Confirm** with a bounded, cancellable wait
//! 7. **Interpret** the receipt
//!
//! Steps 2-5 run under the signer's lock. Confirmation runs outside it so a
//! slow receipt does not stall the signer's next submission.
//!
//! Sequence collisions are retried with a re-fetched nonce up to
//! `max_sequence_retries`. An underpriced rejection is retried once with a
//! bumped fee. A confirmation timeout is reported, never resubmitted.

pub mod intent;
pub mod retry;
pub mod sequencer;

pub use intent::{OperationParams, TransactionIntent};
pub use retry::RetryStrategy;
pub use sequencer::SignerLocks;

use crate::config::PipelineConfig;
use crate::ledger::{LedgerClient, ReceiptWait};
use crate::metrics::Metrics;
use crate::operation::{
    OperationCall, OperationRef, Receipt, ReceiptStatus, SignedOperation, UnsignedOperation,
};
use crate::secrets::SecretStore;
use crate::types::Address;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Operation the ledger applied successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedOperation {
    /// Ledger reference
    pub reference: OperationRef,
    /// Sequence number the operation consumed
    pub nonce: u64,
    /// Fee rate paid
    pub fee_rate: u64,
    /// Final receipt
    pub receipt: Receipt,
}

struct Broadcast {
    reference: OperationRef,
    nonce: u64,
    fee_rate: u64,
    submitted_at: Instant,
}

/// Fee rate for the single underpriced retry
pub fn bumped_fee(fee_rate: u64, bump_percent: u64) -> u64 {
    let increase = (fee_rate.saturating_mul(bump_percent) + 99) / 100;
    fee_rate.saturating_add(increase.max(1))
}

/// Builds, signs, submits and confirms ledger operations
pub struct TransactionPipeline {
    ledger: Arc<dyn LedgerClient>,
    secrets: Arc<dyn SecretStore>,
    config: PipelineConfig,
    retry: RetryStrategy,
    locks: SignerLocks,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("config", &self.config)
            .field("signers", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl TransactionPipeline {
    /// Create a pipeline over an injected ledger client and secret store
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        secrets: Arc<dyn SecretStore>,
        config: PipelineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let retry = RetryStrategy::new(config.retry.clone());
        Self {
            ledger,
            secrets,
            config,
            retry,
            locks: SignerLocks::new(),
            metrics,
        }
    }

    /// Ledger collaborator this pipeline submits to
    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Pipeline metrics
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run `intent` to a confirmed receipt
    pub async fn execute(&self, intent: TransactionIntent) -> Result<ConfirmedOperation> {
        self.execute_cancellable(intent, CancellationToken::new())
            .await
    }

    /// Run `intent`, stopping the confirmation wait if `cancel` fires.
    ///
    /// Cancellation never revokes a broadcast operation; it ends with
    /// [`Error::ConfirmationCancelled`] carrying the reference to re-query.
    pub async fn execute_cancellable(
        &self,
        intent: TransactionIntent,
        cancel: CancellationToken,
    ) -> Result<ConfirmedOperation> {
        let call = intent.build()?;

        let result = match self.broadcast(&intent, call).await {
            Ok(broadcast) => self.confirm(broadcast, &cancel).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            if e.pending_reference().is_none() {
                self.metrics.operations_failed.inc();
                error!(signer = %intent.signer, kind = %intent.kind, "Operation failed: {}", e);
            }
        }

        result
    }

    /// Sequence, price, sign and submit under the signer's lock
    async fn broadcast(&self, intent: &TransactionIntent, call: OperationCall) -> Result<Broadcast> {
        let signer = intent.signer;
        let gas_limit = self.config.gas_budgets.for_kind(intent.kind);

        if !self.secrets.holds_credential(&signer) {
            return Err(Error::Credential(format!("No signing key for {}", signer)));
        }

        let _guard = self.locks.acquire(&signer).await;
        debug!(%signer, kind = %intent.kind, "Signer lock acquired");

        let mut fee_rate: Option<u64> = None;
        let mut collisions = 0u32;
        let mut fee_bumped = false;

        loop {
            let nonce = self
                .retry
                .execute_with_retry(
                    || self.ledger.next_sequence_number(&signer),
                    "next sequence number",
                )
                .await?;

            let rate = match fee_rate {
                Some(rate) => rate,
                None => {
                    let rate = self
                        .retry
                        .execute_with_retry(|| self.ledger.current_fee_rate(), "fee rate")
                        .await?;
                    fee_rate = Some(rate);
                    rate
                }
            };

            let signed = self.sign(UnsignedOperation {
                from: signer,
                nonce,
                fee_rate: rate,
                gas_limit,
                call: call.clone(),
            })?;
            debug!(%signer, nonce, fee_rate = rate, gas_limit, "Operation signed");

            match self.ledger.submit_signed_operation(&signed).await {
                Ok(reference) => {
                    self.metrics.operations_submitted.inc();
                    info!(%signer, nonce, %reference, kind = %intent.kind, "Operation submitted");
                    return Ok(Broadcast {
                        reference,
                        nonce,
                        fee_rate: rate,
                        submitted_at: Instant::now(),
                    });
                }
                Err(Error::SequenceCollision { expected, .. })
                    if collisions < self.config.max_sequence_retries =>
                {
                    collisions += 1;
                    self.metrics.sequence_collisions.inc();
                    let delay = self.retry.calculate_delay(collisions - 1);
                    warn!(
                        %signer,
                        nonce,
                        expected,
                        attempt = collisions,
                        "Sequence collision, re-fetching after {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Error::UnderpricedOperation { offered, minimum }) if !fee_bumped => {
                    fee_bumped = true;
                    self.metrics.fee_bumps.inc();
                    let bumped = bumped_fee(offered.max(minimum), self.config.fee_bump_percent);
                    warn!(%signer, nonce, offered, minimum, bumped, "Operation underpriced, retrying once");
                    fee_rate = Some(bumped);
                }
                Err(e) => {
                    if matches!(e, Error::SequenceCollision { .. }) {
                        self.metrics.sequence_collisions.inc();
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Sign with a credential fetched for this step only
    fn sign(&self, operation: UnsignedOperation) -> Result<SignedOperation> {
        let message = operation.signing_bytes()?;
        let credential = self.secrets.signing_credential(&operation.from)?;
        let signature = credential.sign(&message);
        let public_key = credential.public_key();
        drop(credential);

        Ok(SignedOperation {
            operation,
            public_key: public_key.to_vec(),
            signature: signature.to_vec(),
        })
    }

    /// Bounded, cancellable wait for the receipt
    async fn confirm(
        &self,
        broadcast: Broadcast,
        cancel: &CancellationToken,
    ) -> Result<ConfirmedOperation> {
        let Broadcast {
            reference,
            nonce,
            fee_rate,
            submitted_at,
        } = broadcast;
        let timeout = self.config.confirmation_timeout();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%reference, "Caller stopped waiting for confirmation");
                return Err(Error::ConfirmationCancelled {
                    reference: reference.clone(),
                });
            }
            outcome = self.ledger.await_receipt(&reference, timeout) => outcome,
        };

        let waited_ms = submitted_at.elapsed().as_millis() as u64;

        let receipt = match outcome {
            Ok(ReceiptWait::Confirmed(receipt)) => receipt,
            Ok(ReceiptWait::TimedOut) => {
                self.metrics.confirmation_timeouts.inc();
                warn!(%reference, waited_ms, "Confirmation timed out; operation may still be pending");
                return Err(Error::ConfirmationTimeout {
                    reference,
                    waited_ms,
                });
            }
            Err(e) => {
                // Already broadcast: the outcome is unknown, not failed
                self.metrics.confirmation_timeouts.inc();
                warn!(%reference, "Lost track of operation while confirming: {}", e);
                return Err(Error::ConfirmationTimeout {
                    reference,
                    waited_ms,
                });
            }
        };

        self.metrics
            .confirmation_latency_seconds
            .observe(submitted_at.elapsed().as_secs_f64());

        match &receipt.status {
            ReceiptStatus::Success => {
                self.metrics.operations_confirmed.inc();
                info!(
                    %reference,
                    nonce,
                    block = receipt.block_number,
                    gas_used = receipt.gas_used,
                    "Operation confirmed"
                );
                Ok(ConfirmedOperation {
                    reference,
                    nonce,
                    fee_rate,
                    receipt,
                })
            }
            ReceiptStatus::Reverted { reason } if reason == "out of gas" => Err(Error::Rejected(
                format!("operation {} ran out of gas", reference),
            )),
            ReceiptStatus::Reverted { reason } => Err(Error::StateConflict(format!(
                "operation {} reverted: {}",
                reference, reason
            ))),
        }
    }

    /// True if the secret store can sign for `signer`
    pub fn has_credential(&self, signer: &Address) -> bool {
        self.secrets.holds_credential(signer)
    }
}
