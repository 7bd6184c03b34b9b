//! Property-based tests for hashing, identity validation and the state machine
//!
//! - Hashing is deterministic and distinguishes distinct content
//! - Every well-formed address round-trips through its checksum form
//! - Malformed identities are always rejected
//! - State transitions never move backwards

use chrono::{Duration, Utc};
use lc_core::crypto::hash_document;
use lc_core::state::{check_transition, LcEvent};
use lc_core::validation::{validate_amount, validate_expiry, validate_identity};
use lc_core::{Address, LcId, LcState, LetterOfCredit};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating addresses
fn address_strategy() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from_bytes)
}

/// Strategy for generating lifecycle events
fn event_strategy() -> impl Strategy<Value = LcEvent> {
    prop_oneof![
        Just(LcEvent::Approve),
        Just(LcEvent::SubmitDocuments),
        Just(LcEvent::Close),
    ]
}

/// Strategy for generating LC states
fn state_strategy() -> impl Strategy<Value = LcState> {
    prop_oneof![
        Just(LcState::Created),
        Just(LcState::ApprovedByBank),
        Just(LcState::DocumentsSubmitted),
        Just(LcState::Closed),
    ]
}

proptest! {
    #[test]
    fn prop_hash_deterministic(content in proptest::collection::vec(any::<u8>(), 0..4096)) {
        prop_assert_eq!(hash_document(&content), hash_document(&content));
    }

    #[test]
    fn prop_hash_distinguishes_content(
        a in proptest::collection::vec(any::<u8>(), 1..512),
        b in proptest::collection::vec(any::<u8>(), 1..512),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(hash_document(&a), hash_document(&b));
    }

    #[test]
    fn prop_checksum_form_is_valid(address in address_strategy()) {
        let checksum = address.to_checksum();
        prop_assert!(validate_identity(&checksum));
        prop_assert!(validate_identity(&checksum.to_lowercase()));
        prop_assert_eq!(Address::parse(&checksum).unwrap(), address);
    }

    #[test]
    fn prop_wrong_length_rejected(digits in "[0-9a-f]{0,39}|[0-9a-f]{41,60}") {
        let candidate = format!("0x{}", digits);
        prop_assert!(!validate_identity(&candidate));
    }

    #[test]
    fn prop_non_hex_rejected(prefix in "[0-9a-f]{0,39}", bad in "[g-zG-Z]") {
        let mut digits = prefix.clone();
        digits.push_str(&bad);
        while digits.len() < 40 {
            digits.push('0');
        }
        let candidate = format!("0x{}", digits);
        prop_assert!(!validate_identity(&candidate));
    }

    #[test]
    fn prop_amount_positive_integers_only(cents in -1_000_000i64..1_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let expected = cents > 0 && cents % 100 == 0;
        prop_assert_eq!(validate_amount(amount), expected);
    }

    #[test]
    fn prop_expiry_positive(days in -1000i64..1000i64) {
        prop_assert_eq!(validate_expiry(Decimal::from(days)), days > 0);
    }

    #[test]
    fn prop_transitions_are_monotonic(
        state in state_strategy(),
        event in event_strategy(),
        caller in address_strategy(),
    ) {
        let now = Utc::now();
        let lc = LetterOfCredit {
            id: LcId(1),
            buyer: caller,
            seller: Address::from_bytes([2u8; 20]),
            buyer_bank: caller,
            seller_bank: Address::from_bytes([4u8; 20]),
            amount: 1,
            expiry: now + Duration::days(1),
            state,
            document_hash: None,
        };

        if let Ok(next) = check_transition(&lc, event, &caller, now) {
            prop_assert!(next > state);
        }
    }
}
