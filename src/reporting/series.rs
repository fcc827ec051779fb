use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// `2026-03`
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// `Mar 2026`
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthTotal {
    pub month: String,
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub count: i64,
}

/// Every calendar month touched by `from..=to`, in order. Empty when `from > to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<MonthKey> {
    let mut months = Vec::new();
    if from > to {
        return months;
    }

    let last = MonthKey::of(to);
    let mut current = MonthKey::of(from);
    while current <= last {
        months.push(current);
        current = current.next();
    }
    months
}

/// Sums dated amounts into the months of `from..=to`. Months without data are
/// present with a zero amount; points outside the range are dropped.
pub fn bucket_by_month(
    from: NaiveDate,
    to: NaiveDate,
    points: &[(NaiveDate, Decimal)],
) -> Vec<MonthTotal> {
    let mut sums: BTreeMap<MonthKey, Decimal> = months_between(from, to)
        .into_iter()
        .map(|m| (m, Decimal::ZERO))
        .collect();

    for (date, amount) in points.iter().filter(|(d, _)| *d >= from && *d <= to) {
        if let Some(sum) = sums.get_mut(&MonthKey::of(*date)) {
            *sum += *amount;
        }
    }

    sums.into_iter()
        .map(|(month, amount)| MonthTotal {
            month: month.key(),
            label: month.label(),
            amount,
        })
        .collect()
}

/// Daily totals for the days in `from..=to` that have data, oldest first.
pub fn bucket_by_day(from: NaiveDate, to: NaiveDate, points: &[(NaiveDate, Decimal)]) -> Vec<DayTotal> {
    let mut sums: BTreeMap<NaiveDate, (Decimal, i64)> = BTreeMap::new();

    for (date, amount) in points.iter().filter(|(d, _)| *d >= from && *d <= to) {
        let entry = sums.entry(*date).or_insert((Decimal::ZERO, 0));
        entry.0 += *amount;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(date, (amount, count))| DayTotal { date, amount, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn walks_across_year_end() {
        let months = months_between(date(2025, 11, 20), date(2026, 2, 3));
        let keys: Vec<String> = months.iter().map(MonthKey::key).collect();
        assert_eq!(keys, vec!["2025-11", "2025-12", "2026-01", "2026-02"]);
        assert_eq!(months[1].label(), "Dec 2025");
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(months_between(date(2026, 3, 1), date(2026, 2, 1)).is_empty());
        assert!(bucket_by_month(date(2026, 3, 1), date(2026, 2, 1), &[]).is_empty());
    }

    #[test]
    fn single_day_range_has_one_month() {
        let months = months_between(date(2026, 4, 9), date(2026, 4, 9));
        assert_eq!(months, vec![MonthKey { year: 2026, month: 4 }]);
    }

    #[test]
    fn sums_into_months_and_keeps_empty_ones() {
        let points = vec![
            (date(2026, 1, 5), Decimal::new(1000, 2)),
            (date(2026, 1, 31), Decimal::new(550, 2)),
            (date(2026, 3, 1), Decimal::new(200, 2)),
            (date(2025, 12, 31), Decimal::new(99_999, 2)),
        ];

        let series = bucket_by_month(date(2026, 1, 1), date(2026, 3, 31), &points);
        let amounts: Vec<Decimal> = series.iter().map(|m| m.amount).collect();

        assert_eq!(series.len(), 3);
        assert_eq!(amounts, vec![Decimal::new(1550, 2), Decimal::ZERO, Decimal::new(200, 2)]);
        assert_eq!(series[1].label, "Feb 2026");
    }

    #[test]
    fn partial_months_respect_range_edges() {
        let points = vec![
            (date(2026, 1, 10), Decimal::ONE),
            (date(2026, 1, 20), Decimal::TEN),
        ];
        let series = bucket_by_month(date(2026, 1, 15), date(2026, 1, 31), &points);
        assert_eq!(series[0].amount, Decimal::TEN);
    }

    #[test]
    fn daily_totals_skip_empty_days() {
        let points = vec![
            (date(2026, 2, 2), Decimal::ONE),
            (date(2026, 2, 1), Decimal::TEN),
            (date(2026, 2, 2), Decimal::ONE),
        ];
        let days = bucket_by_day(date(2026, 2, 1), date(2026, 2, 28), &points);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(2026, 2, 1));
        assert_eq!(days[1].amount, Decimal::TWO);
        assert_eq!(days[1].count, 2);
    }
}
