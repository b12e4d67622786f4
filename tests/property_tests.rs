//! Property-based tests for the budget arithmetic, currency bucketing,
//! expiry window, and CSV escaping.
//!
//! These use proptest to verify invariants across a wide range of inputs,
//! catching edge cases the example-based tests might miss.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use medsupply_api::budget::{
    compute_snapshot, days_remaining, expires_within_window, CurrencyKind, EXPIRY_WINDOW_DAYS,
};
use medsupply_api::services::exports::escape_field;

// Strategies for generating test data
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000, 0u32..=2).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn amounts_strategy() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(money_strategy(), 0..8)
}

/// Inverse of `escape_field` for a single already-escaped field.
fn unescape_field(field: &str) -> String {
    match field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

// Property: the balance identity holds for any mix of injections and orders
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn balance_is_budget_plus_injections_minus_orders(
        allocated in money_strategy(),
        injections in amounts_strategy(),
        orders in amounts_strategy(),
    ) {
        let snapshot = compute_snapshot(
            allocated,
            injections.iter().copied(),
            orders.iter().copied(),
        );
        let injected: Decimal = injections.iter().copied().sum();
        let executed: Decimal = orders.iter().copied().sum();

        prop_assert_eq!(snapshot.current_budget, allocated + injected);
        prop_assert_eq!(snapshot.executed, executed);
        prop_assert_eq!(snapshot.balance, allocated + injected - executed);
    }

    #[test]
    fn percent_guard_covers_empty_budgets(orders in amounts_strategy()) {
        let snapshot = compute_snapshot(Decimal::ZERO, std::iter::empty(), orders.iter().copied());

        prop_assert_eq!(snapshot.execution_percent, Decimal::ZERO);
        prop_assert!(!snapshot.is_critical());
    }

    #[test]
    fn display_percent_clamps_without_losing_the_critical_flag(
        allocated in money_strategy(),
        injections in amounts_strategy(),
        orders in amounts_strategy(),
    ) {
        let snapshot = compute_snapshot(
            allocated,
            injections.iter().copied(),
            orders.iter().copied(),
        );

        prop_assert!(snapshot.display_percent() <= Decimal::ONE_HUNDRED);
        if snapshot.execution_percent <= Decimal::ONE_HUNDRED {
            prop_assert_eq!(snapshot.display_percent(), snapshot.execution_percent);
        } else {
            prop_assert_eq!(snapshot.display_percent(), Decimal::ONE_HUNDRED);
        }
        // The critical flag reads the unclamped value.
        prop_assert_eq!(snapshot.is_critical(), snapshot.execution_percent > dec!(90));
    }
}

// Property: the expiry window is exactly [today, today + 90 days]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn expiry_window_tracks_days_remaining(offset in -400i64..400) {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let end = today + Duration::days(offset);

        prop_assert_eq!(days_remaining(end, today), offset);
        prop_assert_eq!(
            expires_within_window(end, today),
            (0..=EXPIRY_WINDOW_DAYS).contains(&offset)
        );
    }
}

// Property: currency bucketing is case-insensitive and total
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn currency_bucketing_ignores_case(label in "[a-zA-Z ]{0,20}") {
        prop_assert_eq!(
            CurrencyKind::classify(Some(&label.to_uppercase())),
            CurrencyKind::classify(Some(&label.to_lowercase()))
        );
    }

    #[test]
    fn labels_containing_crc_bucket_as_colones(
        prefix in "[a-z ]{0,6}",
        suffix in "[a-z ]{0,6}",
    ) {
        let label = format!("{prefix}crc{suffix}");
        prop_assert_eq!(CurrencyKind::classify(Some(&label)), CurrencyKind::Crc);
    }

    #[test]
    fn labels_without_colones_markers_bucket_as_usd(label in "[a-bd-z ]{0,12}") {
        // The alphabet leaves no way to spell "crc", "colones", or "colon".
        prop_assert_eq!(CurrencyKind::classify(Some(&label)), CurrencyKind::Usd);
    }
}

// Property: CSV escaping round-trips and quotes exactly when needed
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn escaped_fields_round_trip(value in "\\PC{0,40}") {
        let escaped = escape_field(&value, ',');
        prop_assert_eq!(unescape_field(&escaped), value);
    }

    #[test]
    fn fields_with_the_delimiter_always_get_quoted(
        head in "[a-z]{0,10}",
        tail in "[a-z]{0,10}",
    ) {
        let value = format!("{head},{tail}");
        let escaped = escape_field(&value, ',');

        prop_assert!(escaped.starts_with('"'));
        prop_assert!(escaped.ends_with('"'));
        prop_assert_eq!(unescape_field(&escaped), value);
    }

    #[test]
    fn plain_fields_pass_through_untouched(value in "[a-zA-Z0-9 ._-]{0,32}") {
        prop_assert_eq!(escape_field(&value, ','), value);
    }
}
