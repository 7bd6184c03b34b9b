// Response payloads for the LC HTTP API (camelCase JSON)

use lc_core::types::LcProjection;
use lc_core::{DocumentHash, LcId, OperationStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLcResponse {
    pub message: String,
    pub transaction_hash: String,
    pub lc_id: LcId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub message: String,
    pub transaction_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsResponse {
    pub message: String,
    pub document_hash: DocumentHash,
    pub transaction_hash: String,
}

/// Broadcast but unconfirmed; the caller must re-query before resubmitting
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub message: String,
    pub transaction_hash: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LcDetailsResponse {
    pub lc_id: LcId,
    pub buyer: String,
    pub seller: String,
    pub buyer_bank: String,
    pub seller_bank: String,
    pub amount: u64,
    /// ISO-8601
    pub expiry_date: String,
    pub state: String,
    pub document_hash: Option<DocumentHash>,
    pub is_active: bool,
}

impl From<LcProjection> for LcDetailsResponse {
    fn from(projection: LcProjection) -> Self {
        let lc = projection.lc;
        Self {
            lc_id: lc.id,
            buyer: lc.buyer.to_checksum(),
            seller: lc.seller.to_checksum(),
            buyer_bank: lc.buyer_bank.to_checksum(),
            seller_bank: lc.seller_bank.to_checksum(),
            amount: lc.amount,
            expiry_date: lc.expiry.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            state: lc.state.as_str().to_string(),
            document_hash: lc.document_hash,
            is_active: projection.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatusResponse {
    pub transaction_hash: String,
    #[serde(flatten)]
    pub status: OperationStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub ledger_reachable: bool,
}
