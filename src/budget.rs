//! Budget aggregation core.
//!
//! Every consumer of period balances (dashboard, statistics, order
//! validation, injections) goes through the functions here so the math
//! lives in exactly one place.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::entities::period;

/// Contracts whose display period ends within this many days (inclusive)
/// count as expiring.
pub const EXPIRY_WINDOW_DAYS: i64 = 90;

/// Execution above this share of the current budget flags a contract as
/// critical. Compared against the unclamped percentage.
pub const CRITICAL_EXECUTION_PERCENT: Decimal = dec!(90);

/// Currency bucket for totals and exports. Stored labels stay free-text;
/// this is the single classification point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
    Crc,
    Usd,
}

impl CurrencyKind {
    /// Buckets a stored currency label. Any label containing "COLONES" or
    /// "CRC" (case-insensitive), or the bare legacy label "COLON", counts
    /// as colones; everything else, including missing labels, is USD.
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Usd;
        };
        let normalized = raw.trim().to_uppercase();
        if normalized.contains("COLONES") || normalized.contains("CRC") || normalized == "COLON" {
            Self::Crc
        } else {
            Self::Usd
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Crc => "CRC",
            Self::Usd => "USD",
        }
    }
}

/// Computed budget position of a single period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetSnapshot {
    /// Allocated budget plus all injections.
    pub current_budget: Decimal,
    /// Sum of order amounts drawn against the period.
    pub executed: Decimal,
    /// What remains spendable; negative when overdrawn.
    pub balance: Decimal,
    /// Executed share of the current budget, unclamped.
    pub execution_percent: Decimal,
}

impl BudgetSnapshot {
    pub fn zero() -> Self {
        Self {
            current_budget: Decimal::ZERO,
            executed: Decimal::ZERO,
            balance: Decimal::ZERO,
            execution_percent: Decimal::ZERO,
        }
    }

    /// Percentage clamped to [0, 100] for display.
    pub fn display_percent(&self) -> Decimal {
        self.execution_percent.min(Decimal::ONE_HUNDRED)
    }

    pub fn is_critical(&self) -> bool {
        self.execution_percent > CRITICAL_EXECUTION_PERCENT
    }
}

/// Computes the budget position of a period from its allocated budget and
/// the amounts of its injections and orders.
///
/// The percentage guard keeps a zero or negative current budget from
/// dividing by zero; such periods report 0% regardless of execution.
pub fn compute_snapshot<I, O>(allocated_budget: Decimal, injections: I, orders: O) -> BudgetSnapshot
where
    I: IntoIterator<Item = Decimal>,
    O: IntoIterator<Item = Decimal>,
{
    let injected: Decimal = injections.into_iter().sum();
    let executed: Decimal = orders.into_iter().sum();

    let current_budget = allocated_budget + injected;
    let balance = current_budget - executed;
    let execution_percent = if current_budget > Decimal::ZERO {
        executed / current_budget * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    BudgetSnapshot {
        current_budget,
        executed,
        balance,
        execution_percent,
    }
}

/// The period a contract overview presents: the earliest Active period,
/// falling back to the earliest period when none is Active. `None` only
/// for contracts without periods; callers render those as zero budget.
pub fn select_display_period(periods: &[period::Model]) -> Option<&period::Model> {
    find_active_period(periods).or_else(|| periods.iter().min_by_key(|p| p.start_date))
}

/// Strict variant: the earliest genuinely Active period, no fallback.
/// Injection targeting and the expiring-contracts report require this.
pub fn find_active_period(periods: &[period::Model]) -> Option<&period::Model> {
    periods
        .iter()
        .filter(|p| p.is_active())
        .min_by_key(|p| p.start_date)
}

/// Whether `end_date` falls inside the expiry window, today inclusive.
/// Dates already past do not count.
pub fn expires_within_window(end_date: NaiveDate, today: NaiveDate) -> bool {
    end_date >= today && end_date <= today + Duration::days(EXPIRY_WINDOW_DAYS)
}

/// Days from `today` to `end_date`; negative when already past.
pub fn days_remaining(end_date: NaiveDate, today: NaiveDate) -> i64 {
    (end_date - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use test_case::test_case;
    use uuid::Uuid;

    fn period(start: &str, status: &str) -> period::Model {
        period::Model {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            name: "Periodo 1".into(),
            start_date: start.parse().unwrap(),
            end_date: "2026-12-31".parse().unwrap(),
            allocated_budget: dec!(1000),
            initial_budget: None,
            status: status.into(),
            currency: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn snapshot_matches_worked_example() {
        let snapshot = compute_snapshot(dec!(1000), vec![dec!(200)], vec![dec!(300), dec!(150)]);

        assert_eq!(snapshot.current_budget, dec!(1200));
        assert_eq!(snapshot.executed, dec!(450));
        assert_eq!(snapshot.balance, dec!(750));
        assert_eq!(snapshot.execution_percent, dec!(37.5));
    }

    #[test]
    fn zero_budget_guards_division() {
        let snapshot = compute_snapshot(Decimal::ZERO, vec![], vec![dec!(50)]);

        assert_eq!(snapshot.execution_percent, Decimal::ZERO);
        assert_eq!(snapshot.balance, dec!(-50));
    }

    #[test]
    fn display_clamps_but_critical_uses_unclamped_value() {
        let overdrawn = compute_snapshot(dec!(100), vec![], vec![dec!(150)]);
        assert_eq!(overdrawn.execution_percent, dec!(150));
        assert_eq!(overdrawn.display_percent(), dec!(100));
        assert!(overdrawn.is_critical());

        let at_threshold = compute_snapshot(dec!(100), vec![], vec![dec!(90)]);
        assert!(!at_threshold.is_critical());

        let just_over = compute_snapshot(dec!(10000), vec![], vec![dec!(9001)]);
        assert!(just_over.is_critical());
    }

    #[test]
    fn injections_extend_the_budget_before_percent() {
        // 450 executed of 1000 alone would be 45%; the injection dilutes it
        let snapshot = compute_snapshot(dec!(1000), vec![dec!(200)], vec![dec!(450)]);
        assert_eq!(snapshot.execution_percent, dec!(37.5));
    }

    #[rstest]
    #[case::today(0, true)]
    #[case::tomorrow(1, true)]
    #[case::window_edge(90, true)]
    #[case::past_window(91, false)]
    #[case::yesterday(-1, false)]
    fn expiry_window_is_inclusive(#[case] offset_days: i64, #[case] expected: bool) {
        let today: NaiveDate = "2025-06-15".parse().unwrap();
        let end = today + Duration::days(offset_days);
        assert_eq!(expires_within_window(end, today), expected);
    }

    #[test_case(Some("CRC") => CurrencyKind::Crc)]
    #[test_case(Some("Colones") => CurrencyKind::Crc)]
    #[test_case(Some("colones crc") => CurrencyKind::Crc)]
    #[test_case(Some("crc") => CurrencyKind::Crc ; "some_crc_lowercase_expects_currencykind_crc")]
    #[test_case(Some("COLON") => CurrencyKind::Crc)]
    #[test_case(Some("colon") => CurrencyKind::Crc ; "some_colon_lowercase_expects_currencykind_crc")]
    #[test_case(Some("USD") => CurrencyKind::Usd)]
    #[test_case(Some("Dollars") => CurrencyKind::Usd)]
    #[test_case(Some("") => CurrencyKind::Usd)]
    #[test_case(None => CurrencyKind::Usd)]
    fn currency_bucketing(raw: Option<&str>) -> CurrencyKind {
        CurrencyKind::classify(raw)
    }

    #[test]
    fn display_period_prefers_earliest_active() {
        let periods = vec![
            period("2024-01-01", "closed"),
            period("2025-01-01", "active"),
            period("2024-06-01", "active"),
        ];
        let selected = select_display_period(&periods).unwrap();
        assert_eq!(selected.start_date, "2024-06-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn display_period_falls_back_to_earliest() {
        let periods = vec![
            period("2025-01-01", "pending"),
            period("2024-01-01", "closed"),
        ];
        let selected = select_display_period(&periods).unwrap();
        assert_eq!(selected.start_date, "2024-01-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn display_period_of_empty_list_is_none() {
        assert!(select_display_period(&[]).is_none());
    }

    #[test]
    fn strict_selection_recognizes_legacy_label_but_never_falls_back() {
        let legacy = vec![period("2024-01-01", "Activo")];
        assert!(find_active_period(&legacy).is_some());

        let pending_only = vec![period("2024-01-01", "pending")];
        assert!(find_active_period(&pending_only).is_none());
        assert!(select_display_period(&pending_only).is_some());
    }

    #[test]
    fn days_remaining_counts_from_today() {
        let today: NaiveDate = "2025-06-15".parse().unwrap();
        assert_eq!(days_remaining("2025-06-20".parse().unwrap(), today), 5);
        assert_eq!(days_remaining(today, today), 0);
        assert_eq!(days_remaining("2025-06-10".parse().unwrap(), today), -5);
    }
}
