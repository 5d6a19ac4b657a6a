//! Property tests for mapping and listener invariants.
//!
//! Uses proptest to verify:
//! 1. Rank assignment: codes in a group get ranks 1..n, keyed `{key}@{code}`
//! 2. Heartbeats never change the listener's state
//! 3. Deliveries for other requests or catalogs never match
//! 4. Derived timestamps are idempotent under re-derivation

use chrono::{TimeZone, Utc};
use eap_core::delivery::{
    DeliveryListener, ListenerConfig, ListenerState, ManualClock, StreamEvent, Transition,
};
use eap_core::domain::{Catalog, IdentifierType, OutputFormat, Session, SessionId};
use eap_core::transform::dates::{derive_last_update, derive_read_timestamp};
use eap_core::universe::{map_identifiers, TickerInput};
use proptest::prelude::*;
use reqwest::Url;
use serde_json::json;
use std::collections::BTreeSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_key() -> impl Strategy<Value = String> {
    "[A-Z]{2}[0-9]{6}"
}

/// Distinct, non-empty, comma-free codes.
fn arb_codes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[A-Z]{2,5}", 1..8).prop_map(|s| s.into_iter().collect())
}

fn arb_datetime() -> impl Strategy<Value = (i32, u32, u32, u32, u32, u32)> {
    (1990..2100i32, 1..=12u32, 1..=28u32, 0..24u32, 0..60u32, 0..60u32)
}

fn session() -> Session {
    Session::new(
        SessionId::from_token("20230615093000abcdef"),
        Catalog {
            id: "793986".into(),
            url: Url::parse("https://api.example.com/eap/catalogs/793986/").unwrap(),
        },
    )
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap())
}

fn listener(clock: &ManualClock) -> DeliveryListener<'_> {
    DeliveryListener::new(
        &session(),
        OutputFormat::Csv,
        Url::parse("https://api.example.com").unwrap(),
        ListenerConfig::default(),
        clock,
    )
}

// ── 1. Rank Assignment ───────────────────────────────────────────────

proptest! {
    #[test]
    fn ranks_follow_code_order(key in arb_key(), codes in arb_codes()) {
        let input = TickerInput::Grouped(vec![(key.clone(), codes.join(","))]);
        let mapping = map_identifiers(&input, IdentifierType::Isin);
        let priority = mapping.priority.expect("grouped universes carry priority");

        prop_assert_eq!(mapping.identifiers.len(), codes.len());
        for (i, (identifier, code)) in mapping.identifiers.iter().zip(&codes).enumerate() {
            let composite = format!("{key}@{code}");
            prop_assert_eq!(&identifier.value, &composite);
            prop_assert_eq!(identifier.rank, i as u32 + 1);
            prop_assert_eq!(priority.get(&composite), Some(i as u32 + 1));
        }
    }

    #[test]
    fn padding_and_blank_codes_do_not_shift_ranks(key in arb_key(), codes in arb_codes()) {
        let padded = codes.iter().map(|c| format!("  {c} ,")).collect::<String>();
        let clean = map_identifiers(
            &TickerInput::Grouped(vec![(key.clone(), codes.join(","))]),
            IdentifierType::Ticker,
        );
        let noisy = map_identifiers(
            &TickerInput::Grouped(vec![(key, padded)]),
            IdentifierType::Ticker,
        );
        prop_assert_eq!(clean, noisy);
    }

    #[test]
    fn composite_values_are_unique(
        groups in prop::collection::vec((arb_key(), arb_codes()), 1..5)
    ) {
        let input = TickerInput::Grouped(
            groups.iter().map(|(k, c)| (k.clone(), c.join(","))).collect(),
        );
        let mapping = map_identifiers(&input, IdentifierType::Isin);
        let unique: BTreeSet<_> = mapping.identifiers.iter().map(|i| i.value.clone()).collect();
        prop_assert_eq!(unique.len(), mapping.identifiers.len());
    }
}

// ── 2. Heartbeat Invariance ──────────────────────────────────────────

proptest! {
    #[test]
    fn heartbeats_keep_waiting(n in 1usize..200, blank in "[ \t\n]{0,4}") {
        let clock = clock();
        let mut l = listener(&clock);
        for _ in 0..n {
            l.evaluate(&StreamEvent::data(blank.clone()));
        }
        prop_assert_eq!(l.state(), ListenerState::Waiting);
        prop_assert_eq!(l.stats().heartbeats, n);
    }
}

// ── 3. Foreign Deliveries Never Match ────────────────────────────────

proptest! {
    #[test]
    fn other_requests_never_match(
        distribution in "r[0-9a-f]{20}\\.(csv|json)",
        catalog in "[0-9]{6}",
    ) {
        prop_assume!(!(distribution == "r20230615093000abcdef.csv" && catalog == "793986"));
        let clock = clock();
        let mut l = listener(&clock);
        let event = StreamEvent::data(
            json!({"generated": {
                "@id": format!("/eap/catalogs/{catalog}/content/responses/{distribution}"),
                "identifier": distribution,
                "snapshot": {"dataset": {"catalog": {"identifier": catalog}}}
            }})
            .to_string(),
        );
        let transition = l.evaluate(&event);
        prop_assert!(
            !matches!(transition, Transition::Match { .. }),
            "unexpected Match transition: {:?}",
            transition
        );
        prop_assert_eq!(l.state(), ListenerState::Waiting);
    }

    #[test]
    fn arbitrary_text_never_matches(body in ".{0,80}") {
        let clock = clock();
        let mut l = listener(&clock);
        let transition = l.evaluate(&StreamEvent::data(body));
        prop_assert!(
            !matches!(transition, Transition::Match { .. }),
            "unexpected Match transition: {:?}",
            transition
        );
    }
}

// ── 4. Timestamp Idempotence ─────────────────────────────────────────

proptest! {
    #[test]
    fn derived_timestamps_are_fixed_points((y, mo, d, h, mi, s) in arb_datetime()) {
        let time = format!("{h:02}:{mi:02}:{s:02}");
        let date = format!("{y:04}-{mo:02}-{d:02}");
        let once = derive_last_update(Some(&time), Some(&date)).expect("valid time of day");
        prop_assert_eq!(&once, &format!("{date} {time}"));

        let again = derive_last_update(Some(&once), None);
        prop_assert_eq!(again.as_deref(), Some(once.as_str()));

        let read = derive_read_timestamp(Some(&once), None);
        prop_assert_eq!(derive_read_timestamp(read.as_deref(), None), read);
    }
}
