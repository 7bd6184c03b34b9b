//! DelTran Letter of Credit Core
//!
//! Orchestrates the lifecycle of trade-finance Letters of Credit whose record
//! of truth lives on an external append-only contract ledger.
//!
//! # Architecture
//!
//! - **Document Hasher**: SHA-256 content addressing of raw document bytes
//! - **Validator**: fail-fast checks on identities, amounts and expiry windows
//! - **State Machine**: `Created → ApprovedByBank → DocumentsSubmitted → Closed`
//! - **Transaction Pipeline**: build, sequence, price, sign, submit, confirm
//! - **Orchestration Service**: one facade method per lifecycle transition

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
//!
//! # Invariants
//!
//! - The core never mutates LC state directly; it proposes and the ledger decides
//! - State transitions are monotonic
//! - Submissions from one signer are serialized; nonces are fetched just in time
//! - A confirmation timeout is reported as pending, never resubmitted

pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod operation;
pub mod orchestrator;
pub mod pipeline;
pub mod secrets;
pub mod state;
pub mod types;
pub mod validation;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::{LedgerClient, OperationStatus, ReceiptWait};
pub use orchestrator::LcService;
pub use pipeline::{TransactionIntent, TransactionPipeline};
pub use types::{Address, DocumentHash, LcId, LcState, LetterOfCredit};
