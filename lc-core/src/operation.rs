//! Ledger operation wire types
//!
//! An operation is an LC contract call (selector + ordered arguments) wrapped
//! with the signer's sequence number, fee rate and gas ceiling, then signed.
//! Receipts carry structured contract events rather than raw log bytes.

use crate::crypto::{hash_bytes, verify_signature};
use crate::types::{Address, DocumentHash, LcId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract call kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// `createLC(seller, sellerBank, buyerBank, amount, expiryDays)`
    CreateLc,
    /// `approveLCByBank(lcId)`
    ApproveLc,
    /// `submitDocuments(lcId, documentHash)`
    SubmitDocuments,
    /// `closeLC(lcId)`
    CloseLc,
}

impl OperationKind {
    /// Contract function selector
    pub fn selector(&self) -> &'static str {
        match self {
            OperationKind::CreateLc => "createLC",
            OperationKind::ApproveLc => "approveLCByBank",
            OperationKind::SubmitDocuments => "submitDocuments",
            OperationKind::CloseLc => "closeLC",
        }
    }

    /// Inverse of [`selector`](Self::selector)
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "createLC" => Some(OperationKind::CreateLc),
            "approveLCByBank" => Some(OperationKind::ApproveLc),
            "submitDocuments" => Some(OperationKind::SubmitDocuments),
            "closeLC" => Some(OperationKind::CloseLc),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// Typed contract call argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CallArg {
    /// Ledger identity
    Address(Address),
    /// Unsigned integer
    Uint(u64),
    /// 32-byte digest
    Hash(DocumentHash),
}

/// Unsigned contract call payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCall {
    /// Contract function
    pub selector: String,

    /// Ordered arguments
    pub args: Vec<CallArg>,
}

impl OperationCall {
    /// Create a call for `kind`
    pub fn new(kind: OperationKind, args: Vec<CallArg>) -> Self {
        Self {
            selector: kind.selector().to_string(),
            args,
        }
    }

    /// Kind named by the selector
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::from_selector(&self.selector)
    }
}

/// Operation ready to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedOperation {
    /// Signer identity
    pub from: Address,

    /// Signer's sequence number
    pub nonce: u64,

    /// Fee per unit of gas
    pub fee_rate: u64,

    /// Computation budget ceiling
    pub gas_limit: u64,

    /// Contract call
    pub call: OperationCall,
}

impl UnsignedOperation {
    /// Canonical bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Signed operation as broadcast to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOperation {
    /// Signed payload
    pub operation: UnsignedOperation,

    /// Ed25519 public key (32 bytes)
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,

    /// Ed25519 signature (64 bytes)
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl SignedOperation {
    /// Ledger reference: SHA-256 over the canonical signed encoding
    pub fn reference(&self) -> Result<OperationRef> {
        let bytes = bincode::serialize(self)?;
        Ok(OperationRef::from_digest(hash_bytes(&bytes)))
    }

    /// Signature is valid and the key controls `operation.from`
    pub fn verify(&self) -> bool {
        let Ok(public_key) = <[u8; 32]>::try_from(self.public_key.as_slice()) else {
            return false;
        };
        if Address::from_public_key(&public_key) != self.operation.from {
            return false;
        }
        match self.operation.signing_bytes() {
            Ok(message) => verify_signature(&message, &self.signature, &self.public_key),
            Err(_) => false,
        }
    }
}

/// Provisional transaction reference (`0x` + 64 hex digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationRef(String);

impl OperationRef {
    /// Create from a 32-byte digest
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(digest)))
    }

    /// Parse a reference supplied by a caller
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| Error::Validation(format!("reference {s:?} must start with 0x")))?;
        if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!(
                "reference {s:?} must be 64 hex digits"
            )));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured events emitted by the LC contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ContractEvent {
    /// A new LC was issued
    LcCreated {
        /// Assigned id
        lc_id: LcId,
        /// Issuing buyer
        buyer: Address,
        /// Beneficiary
        seller: Address,
        /// Amount
        amount: u64,
    },
    /// Buyer's bank approved
    LcApproved {
        /// LC id
        lc_id: LcId,
        /// Approving bank
        bank: Address,
    },
    /// Documents presented
    DocumentsSubmitted {
        /// LC id
        lc_id: LcId,
        /// Hash of the documents
        document_hash: DocumentHash,
    },
    /// LC closed
    LcClosed {
        /// LC id
        lc_id: LcId,
    },
}

/// Outcome recorded by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReceiptStatus {
    /// Applied
    Success,
    /// Guard or budget violated at apply time
    Reverted {
        /// Ledger-reported reason
        reason: String,
    },
}

/// Finalized receipt for a broadcast operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Operation reference
    pub reference: OperationRef,

    /// Success or revert
    pub status: ReceiptStatus,

    /// Block that included the operation
    pub block_number: u64,

    /// Gas consumed
    pub gas_used: u64,

    /// Events emitted
    #[serde(default)]
    pub events: Vec<ContractEvent>,
}

impl Receipt {
    /// True if applied
    pub fn is_success(&self) -> bool {
        matches!(self.status, ReceiptStatus::Success)
    }

    /// Id from the first `LcCreated` event
    pub fn created_lc_id(&self) -> Option<LcId> {
        self.events.iter().find_map(|event| match event {
            ContractEvent::LcCreated { lc_id, .. } => Some(*lc_id),
            _ => None,
        })
    }
}
