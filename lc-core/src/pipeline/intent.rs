//! Transaction intents
//!
//! An intent is what the orchestration service wants the ledger to do, before
//! any sequence number, fee or signature is attached. It lives for one
//! request and is dropped once the pipeline reaches a terminal outcome.

use crate::operation::{CallArg, OperationCall, OperationKind};
use crate::types::{Address, DocumentHash, LcId};
use crate::{Error, Result};

/// Operation-specific parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationParams {
    /// `createLC`
    Create {
        /// Beneficiary
        seller: Address,
        /// Beneficiary's bank
        seller_bank: Address,
        /// Bank that must approve
        buyer_bank: Address,
        /// Integral amount
        amount: u64,
        /// Validity window
        expiry_days: u32,
    },
    /// `approveLCByBank`
    Approve,
    /// `submitDocuments`; carries the hash, never the content
    SubmitDocuments {
        /// Digest of the presented documents
        document_hash: DocumentHash,
    },
    /// `closeLC`
    Close,
}

/// Mutation proposed to the ledger on behalf of `signer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    /// Contract call to make
    pub kind: OperationKind,
    /// LC the call targets; `None` for create
    pub target_lc_id: Option<LcId>,
    /// Call parameters
    pub params: OperationParams,
    /// Identity that signs and pays
    pub signer: Address,
}

impl TransactionIntent {
    /// Issue a new LC; `signer` becomes the buyer
    pub fn create(
        signer: Address,
        seller: Address,
        seller_bank: Address,
        buyer_bank: Address,
        amount: u64,
        expiry_days: u32,
    ) -> Self {
        Self {
            kind: OperationKind::CreateLc,
            target_lc_id: None,
            params: OperationParams::Create {
                seller,
                seller_bank,
                buyer_bank,
                amount,
                expiry_days,
            },
            signer,
        }
    }

    /// Buyer's bank approval
    pub fn approve(lc_id: LcId, signer: Address) -> Self {
        Self {
            kind: OperationKind::ApproveLc,
            target_lc_id: Some(lc_id),
            params: OperationParams::Approve,
            signer,
        }
    }

    /// Present documents by hash
    pub fn submit_documents(lc_id: LcId, document_hash: DocumentHash, signer: Address) -> Self {
        Self {
            kind: OperationKind::SubmitDocuments,
            target_lc_id: Some(lc_id),
            params: OperationParams::SubmitDocuments { document_hash },
            signer,
        }
    }

    /// Close the LC
    pub fn close(lc_id: LcId, signer: Address) -> Self {
        Self {
            kind: OperationKind::CloseLc,
            target_lc_id: Some(lc_id),
            params: OperationParams::Close,
            signer,
        }
    }

    /// Assemble the unsigned contract call (selector + ordered arguments)
    pub fn build(&self) -> Result<OperationCall> {
        let target = || {
            self.target_lc_id
                .map(|id| CallArg::Uint(id.0))
                .ok_or_else(|| Error::Validation(format!("{} requires an LC id", self.kind)))
        };

        let args = match (&self.kind, &self.params) {
            (
                OperationKind::CreateLc,
                OperationParams::Create {
                    seller,
                    seller_bank,
                    buyer_bank,
                    amount,
                    expiry_days,
                },
            ) => vec![
                CallArg::Address(*seller),
                CallArg::Address(*seller_bank),
                CallArg::Address(*buyer_bank),
                CallArg::Uint(*amount),
                CallArg::Uint(u64::from(*expiry_days)),
            ],
            (OperationKind::ApproveLc, OperationParams::Approve)
            | (OperationKind::CloseLc, OperationParams::Close) => vec![target()?],
            (OperationKind::SubmitDocuments, OperationParams::SubmitDocuments { document_hash }) => {
                vec![target()?, CallArg::Hash(*document_hash)]
            }
            (kind, params) => {
                return Err(Error::Validation(format!(
                    "parameters {:?} do not match operation {}",
                    params, kind
                )))
            }
        };

        Ok(OperationCall::new(self.kind, args))
    }
}
