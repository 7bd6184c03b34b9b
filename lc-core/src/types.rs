//! Core types for LC orchestration
//!
//! All ledger-owned types are read projections: the core holds copies
//! reported by the ledger and never mutates them in place.

use crate::crypto::keccak256;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Ledger identity (20-byte address, `0x` + 40 hex digits)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address controlled by an Ed25519 public key
    ///
    /// Last 20 bytes of Keccak-256 over the public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = keccak256(public_key);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Parse a textual address.
    ///
    /// All-lowercase and all-uppercase hex are accepted as-is; mixed case
    /// must match the EIP-55 checksum.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| Error::Validation(format!("address {s:?} must start with 0x")))?;

        if digits.len() != 40 {
            return Err(Error::Validation(format!(
                "address {s:?} must have 40 hex digits, found {}",
                digits.len()
            )));
        }

        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!(
                "address {s:?} contains non-hex characters"
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| Error::Validation(format!("address {s:?}: {e}")))?;
        let address = Self(bytes);

        let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *digits {
            return Err(Error::Validation(format!(
                "address {s:?} fails checksum validation"
            )));
        }

        Ok(address)
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Ledger-assigned LC identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LcId(pub u64);

impl fmt::Display for LcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LcId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// SHA-256 digest of a submitted document set
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHash([u8; 32]);

impl DocumentHash {
    /// Create from digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, no prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse hex with or without a `0x` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| Error::Validation(format!("document hash {s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentHash({})", self.to_hex())
    }
}

impl Serialize for DocumentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DocumentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a Letter of Credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum LcState {
    /// Issued by the buyer, awaiting bank approval
    Created = 0,
    /// Approved by the buyer's bank
    ApprovedByBank = 1,
    /// Documents presented
    DocumentsSubmitted = 2,
    /// Closed (terminal)
    Closed = 3,
}

impl LcState {
    /// State name as reported to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            LcState::Created => "Created",
            LcState::ApprovedByBank => "ApprovedByBank",
            LcState::DocumentsSubmitted => "DocumentsSubmitted",
            LcState::Closed => "Closed",
        }
    }
}

impl fmt::Display for LcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter of Credit as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterOfCredit {
    /// Ledger-assigned id
    pub id: LcId,

    /// Issuing party (implicit signer of `create`)
    pub buyer: Address,

    /// Beneficiary
    pub seller: Address,

    /// Bank that must approve
    pub buyer_bank: Address,

    /// Beneficiary's bank
    pub seller_bank: Address,

    /// Integral monetary amount
    pub amount: u64,

    /// Instant after which the LC is no longer actionable
    pub expiry: DateTime<Utc>,

    /// Current state
    pub state: LcState,

    /// Hash of the latest accepted document set
    pub document_hash: Option<DocumentHash>,
}

impl LetterOfCredit {
    /// True once `now` has reached the expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Not closed and not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state != LcState::Closed && !self.is_expired(now)
    }

    /// Snapshot with `is_active` evaluated at `now`
    pub fn projection(&self, now: DateTime<Utc>) -> LcProjection {
        LcProjection {
            is_active: self.is_active(now),
            lc: self.clone(),
        }
    }
}

/// Read projection handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LcProjection {
    /// Ledger-reported fields
    #[serde(flatten)]
    pub lc: LetterOfCredit,

    /// Derived at read time
    pub is_active: bool,
}
