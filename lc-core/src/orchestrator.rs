//! Orchestration service
//!
//! One method per lifecycle transition plus read-only queries. Every
//! mutating call validates all inputs, reads the LC from the ledger, checks
//! the transition guard against that fresh state and only then hands an
//! intent to the [`TransactionPipeline`].

use crate::clock::Clock;
use crate::config::{Config, PartyConfig};
use crate::crypto::hash_document;
use crate::ledger::{LedgerClient, OperationStatus};
use crate::metrics::Metrics;
use crate::operation::OperationRef;
use crate::pipeline::{TransactionIntent, TransactionPipeline};
use crate::secrets::SecretStore;
use crate::state::{check_transition, LcEvent};
use crate::types::{Address, DocumentHash, LcId, LcProjection};
use crate::validation::{parse_amount, parse_expiry, parse_identity, ValidationReport};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters of `createLC`, as received from the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLcRequest {
    /// Beneficiary address
    pub seller: String,
    /// Beneficiary's bank address
    pub seller_bank: String,
    /// Approving bank; the configured default when omitted
    #[serde(default)]
    pub buyer_bank: Option<String>,
    /// Positive integral amount
    pub amount: Decimal,
    /// Positive whole number of days
    pub expiry_days: Decimal,
}

/// Outcome of `createLC`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLc {
    /// Ledger-assigned id
    pub lc_id: LcId,
    /// Receipt reference
    pub reference: OperationRef,
}

/// Outcome of a transition that only reports its receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    /// Affected LC
    pub lc_id: LcId,
    /// Receipt reference
    pub reference: OperationRef,
}

/// Outcome of `submitDocuments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedDocuments {
    /// Affected LC
    pub lc_id: LcId,
    /// Hash recorded on the ledger
    pub document_hash: DocumentHash,
    /// Receipt reference
    pub reference: OperationRef,
}

/// LC lifecycle facade
pub struct LcService {
    ledger: Arc<dyn LedgerClient>,
    pipeline: TransactionPipeline,
    clock: Arc<dyn Clock>,
    parties: PartyConfig,
}

impl std::fmt::Debug for LcService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcService")
            .field("pipeline", &self.pipeline)
            .field("parties", &self.parties)
            .finish_non_exhaustive()
    }
}

impl LcService {
    /// Wire the service over injected collaborators
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        secrets: Arc<dyn SecretStore>,
        config: &Config,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let pipeline =
            TransactionPipeline::new(ledger.clone(), secrets, config.pipeline.clone(), metrics);
        Self {
            ledger,
            pipeline,
            clock,
            parties: config.parties.clone(),
        }
    }

    /// Underlying submission pipeline
    pub fn pipeline(&self) -> &TransactionPipeline {
        &self.pipeline
    }

    /// Configured default parties
    pub fn parties(&self) -> &PartyConfig {
        &self.parties
    }

    /// Issue a new LC with `signer` as the buyer
    pub async fn create_lc(&self, request: CreateLcRequest, signer: Address) -> Result<CreatedLc> {
        let mut report = ValidationReport::new();
        let seller = report.check(parse_identity("seller", &request.seller));
        let seller_bank = report.check(parse_identity("sellerBank", &request.seller_bank));
        let buyer_bank = match request.buyer_bank.as_deref() {
            Some(bank) => report.check(parse_identity("buyerBank", bank)),
            None => report.check(self.parties.default_buyer_bank.ok_or_else(|| {
                Error::Validation("buyerBank: required, no default is configured".to_string())
            })),
        };
        let amount = report.check(parse_amount(request.amount));
        let expiry_days = report.check(parse_expiry(request.expiry_days));
        report.finish()?;

        let (Some(seller), Some(seller_bank), Some(buyer_bank), Some(amount), Some(expiry_days)) =
            (seller, seller_bank, buyer_bank, amount, expiry_days)
        else {
            return Err(Error::Validation("incomplete createLC request".to_string()));
        };

        debug!(%signer, %seller, %buyer_bank, amount, expiry_days, "Creating LC");
        let intent =
            TransactionIntent::create(signer, seller, seller_bank, buyer_bank, amount, expiry_days);
        let confirmed = self.pipeline.execute(intent).await?;

        let lc_id = confirmed.receipt.created_lc_id().ok_or_else(|| {
            Error::Decode(format!(
                "receipt {} carries no LcCreated event",
                confirmed.reference
            ))
        })?;

        info!(%lc_id, reference = %confirmed.reference, "LC created");
        Ok(CreatedLc {
            lc_id,
            reference: confirmed.reference,
        })
    }

    /// Buyer's bank approves the LC
    pub async fn approve_lc(&self, lc_id: LcId, signer: Address) -> Result<TransitionOutcome> {
        self.precheck(lc_id, LcEvent::Approve, &signer).await?;

        let confirmed = self
            .pipeline
            .execute(TransactionIntent::approve(lc_id, signer))
            .await?;

        info!(%lc_id, reference = %confirmed.reference, "LC approved");
        Ok(TransitionOutcome {
            lc_id,
            reference: confirmed.reference,
        })
    }

    /// Present documents; only their hash reaches the ledger
    pub async fn submit_documents(
        &self,
        lc_id: LcId,
        content: &[u8],
        signer: Address,
    ) -> Result<SubmittedDocuments> {
        if content.is_empty() {
            return Err(Error::Validation("documents: content is empty".to_string()));
        }
        let document_hash = hash_document(content);

        self.precheck(lc_id, LcEvent::SubmitDocuments, &signer)
            .await?;

        let confirmed = self
            .pipeline
            .execute(TransactionIntent::submit_documents(
                lc_id,
                document_hash,
                signer,
            ))
            .await?;

        info!(%lc_id, %document_hash, reference = %confirmed.reference, "Documents submitted");
        Ok(SubmittedDocuments {
            lc_id,
            document_hash,
            reference: confirmed.reference,
        })
    }

    /// Close the LC (party of record, or anyone once expired)
    pub async fn close_lc(&self, lc_id: LcId, signer: Address) -> Result<TransitionOutcome> {
        self.precheck(lc_id, LcEvent::Close, &signer).await?;

        let confirmed = self
            .pipeline
            .execute(TransactionIntent::close(lc_id, signer))
            .await?;

        info!(%lc_id, reference = %confirmed.reference, "LC closed");
        Ok(TransitionOutcome {
            lc_id,
            reference: confirmed.reference,
        })
    }

    /// Current projection, with `is_active` evaluated now
    pub async fn get_lc_details(&self, lc_id: LcId) -> Result<LcProjection> {
        let lc = self.ledger.query_state(lc_id).await?;
        Ok(lc.projection(self.clock.now()))
    }

    /// Re-query a previously broadcast operation
    pub async fn operation_status(&self, reference: &OperationRef) -> Result<OperationStatus> {
        self.ledger.operation_status(reference).await
    }

    /// Read-then-propose guard against the ledger's current state
    async fn precheck(&self, lc_id: LcId, event: LcEvent, signer: &Address) -> Result<()> {
        let lc = self.ledger.query_state(lc_id).await?;
        let target = check_transition(&lc, event, signer, self.clock.now())?;
        debug!(%lc_id, %event, from = %lc.state, to = %target, "Transition guard passed");
        Ok(())
    }
}
