//! Letter of Credit state machine
//!
//! ```text
//!   create ──► Created ──approve──► ApprovedByBank ──submit-documents──► DocumentsSubmitted
//!                 │                       │                                     │
//!                 └──────── close ────────┴──────────────── close ──────────────┴──► Closed
//! ```
//!
//! The orchestration core evaluates these guards against the ledger's
//! freshly-read state to avoid doomed submissions. The ledger applies the
//! same rules at apply time and remains the authority.

use crate::types::{Address, LcState, LetterOfCredit};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle event proposed against an existing LC.
///
/// Issuance has no source state; a new LC starts in [`initial_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LcEvent {
    /// Buyer's bank approval
    Approve,
    /// Present documents
    SubmitDocuments,
    /// Expire or explicitly close
    Close,
}

impl fmt::Display for LcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LcEvent::Approve => "approve",
            LcEvent::SubmitDocuments => "submit-documents",
            LcEvent::Close => "close",
        };
        f.write_str(name)
    }
}

impl LcState {
    /// Terminal states accept no further events
    pub fn is_terminal(&self) -> bool {
        matches!(self, LcState::Closed)
    }

    /// Transition table, without guards
    pub fn next(&self, event: LcEvent) -> Option<LcState> {
        match (self, event) {
            (LcState::Created, LcEvent::Approve) => Some(LcState::ApprovedByBank),
            (LcState::ApprovedByBank, LcEvent::SubmitDocuments) => {
                Some(LcState::DocumentsSubmitted)
            }
            (state, LcEvent::Close) if !state.is_terminal() => Some(LcState::Closed),
            _ => None,
        }
    }
}

/// State a newly created LC starts in
pub fn initial_state() -> LcState {
    LcState::Created
}

/// Check that `caller` may apply `event` to `lc` at `now`.
///
/// Returns the target state. Wrong-state and expiry violations are
/// `StateConflict`; a caller who is not the party of record is `Unauthorized`.
pub fn check_transition(
    lc: &LetterOfCredit,
    event: LcEvent,
    caller: &Address,
    now: DateTime<Utc>,
) -> Result<LcState> {
    let target = lc.state.next(event).ok_or_else(|| {
        Error::StateConflict(format!(
            "cannot {} LC {} in state {}",
            event, lc.id, lc.state
        ))
    })?;

    match event {
        LcEvent::Approve => {
            if *caller != lc.buyer_bank {
                return Err(Error::Unauthorized(format!(
                    "{} is not the buyer's bank of LC {}",
                    caller, lc.id
                )));
            }
            ensure_not_expired(lc, event, now)?;
        }
        LcEvent::SubmitDocuments => {
            ensure_not_expired(lc, event, now)?;
        }
        LcEvent::Close => {
            let is_party = *caller == lc.buyer || *caller == lc.buyer_bank;
            if !is_party && !lc.is_expired(now) {
                return Err(Error::Unauthorized(format!(
                    "{} may not close unexpired LC {}",
                    caller, lc.id
                )));
            }
        }
    }

    Ok(target)
}

fn ensure_not_expired(lc: &LetterOfCredit, event: LcEvent, now: DateTime<Utc>) -> Result<()> {
    if lc.is_expired(now) {
        return Err(Error::StateConflict(format!(
            "cannot {} LC {}: expired at {}",
            event,
            lc.id,
            lc.expiry.to_rfc3339()
        )));
    }
    Ok(())
}
