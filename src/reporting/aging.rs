//! Receivable/payable aging.
//!
//! Every outstanding document lands in exactly one bucket according to how
//! many days past its due date it is on the as-of date, so the bucket amounts
//! always add up to the total outstanding.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgingBucket {
    NotDue,
    Days0To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::NotDue,
        AgingBucket::Days0To30,
        AgingBucket::Days31To60,
        AgingBucket::Days61To90,
        AgingBucket::Over90,
    ];

    pub fn for_days_past_due(days: i64) -> Self {
        match days {
            d if d <= 0 => AgingBucket::NotDue,
            1..=30 => AgingBucket::Days0To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::NotDue => "Not due",
            AgingBucket::Days0To30 => "0-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }

    fn index(&self) -> usize {
        match self {
            AgingBucket::NotDue => 0,
            AgingBucket::Days0To30 => 1,
            AgingBucket::Days31To60 => 2,
            AgingBucket::Days61To90 => 3,
            AgingBucket::Over90 => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgingItem {
    pub party_id: Uuid,
    pub party_name: String,
    pub due_date: NaiveDate,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketTotal {
    pub label: &'static str,
    pub amount: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyAging {
    pub party_id: Uuid,
    pub party_name: String,
    pub not_due: Decimal,
    pub days_0_30: Decimal,
    pub days_31_60: Decimal,
    pub days_61_90: Decimal,
    pub over_90: Decimal,
    pub total: Decimal,
}

impl PartyAging {
    fn new(party_id: Uuid, party_name: String) -> Self {
        Self {
            party_id,
            party_name,
            not_due: Decimal::ZERO,
            days_0_30: Decimal::ZERO,
            days_31_60: Decimal::ZERO,
            days_61_90: Decimal::ZERO,
            over_90: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    fn add(&mut self, bucket: AgingBucket, amount: Decimal) {
        let slot = match bucket {
            AgingBucket::NotDue => &mut self.not_due,
            AgingBucket::Days0To30 => &mut self.days_0_30,
            AgingBucket::Days31To60 => &mut self.days_31_60,
            AgingBucket::Days61To90 => &mut self.days_61_90,
            AgingBucket::Over90 => &mut self.over_90,
        };
        *slot += amount;
        self.total += amount;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub buckets: Vec<BucketTotal>,
    pub parties: Vec<PartyAging>,
    pub total_outstanding: Decimal,
}

pub fn bucket(items: &[AgingItem], as_of: NaiveDate) -> AgingReport {
    let mut buckets: Vec<BucketTotal> = AgingBucket::ALL
        .iter()
        .map(|b| BucketTotal {
            label: b.label(),
            amount: Decimal::ZERO,
            count: 0,
        })
        .collect();

    let mut parties: Vec<PartyAging> = Vec::new();
    let mut party_index: HashMap<Uuid, usize> = HashMap::new();
    let mut total_outstanding = Decimal::ZERO;

    for item in items.iter().filter(|item| item.outstanding > Decimal::ZERO) {
        let days = (as_of - item.due_date).num_days();
        let which = AgingBucket::for_days_past_due(days);

        let slot = &mut buckets[which.index()];
        slot.amount += item.outstanding;
        slot.count += 1;
        total_outstanding += item.outstanding;

        let idx = *party_index.entry(item.party_id).or_insert_with(|| {
            parties.push(PartyAging::new(item.party_id, item.party_name.clone()));
            parties.len() - 1
        });
        parties[idx].add(which, item.outstanding);
    }

    parties.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.party_name.cmp(&b.party_name))
    });

    AgingReport {
        as_of,
        buckets,
        parties,
        total_outstanding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(party: Uuid, name: &str, due: NaiveDate, amount: i64) -> AgingItem {
        AgingItem {
            party_id: party,
            party_name: name.to_string(),
            due_date: due,
            outstanding: Decimal::new(amount, 2),
        }
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(AgingBucket::for_days_past_due(-5), AgingBucket::NotDue);
        assert_eq!(AgingBucket::for_days_past_due(0), AgingBucket::NotDue);
        assert_eq!(AgingBucket::for_days_past_due(1), AgingBucket::Days0To30);
        assert_eq!(AgingBucket::for_days_past_due(30), AgingBucket::Days0To30);
        assert_eq!(AgingBucket::for_days_past_due(31), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_days_past_due(60), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_days_past_due(61), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::for_days_past_due(90), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::for_days_past_due(91), AgingBucket::Over90);
    }

    #[test]
    fn buckets_sum_to_total_outstanding() {
        let as_of = date(2026, 6, 30);
        let acme = Uuid::new_v4();
        let globex = Uuid::new_v4();
        let items = vec![
            item(acme, "Acme", date(2026, 7, 15), 10_000),
            item(acme, "Acme", date(2026, 6, 10), 25_050),
            item(globex, "Globex", date(2026, 5, 1), 4_000),
            item(globex, "Globex", date(2026, 4, 1), 1_999),
            item(globex, "Globex", date(2025, 12, 1), 75_000),
        ];

        let report = bucket(&items, as_of);
        let bucket_sum: Decimal = report.buckets.iter().map(|b| b.amount).sum();

        assert_eq!(report.total_outstanding, Decimal::new(116_049, 2));
        assert_eq!(bucket_sum, report.total_outstanding);

        let amounts: Vec<Decimal> = report.buckets.iter().map(|b| b.amount).collect();
        assert_eq!(
            amounts,
            vec![
                Decimal::new(10_000, 2),
                Decimal::new(25_050, 2),
                Decimal::new(4_000, 2),
                Decimal::new(1_999, 2),
                Decimal::new(75_000, 2),
            ]
        );

        let party_sum: Decimal = report.parties.iter().map(|p| p.total).sum();
        assert_eq!(party_sum, report.total_outstanding);
        assert_eq!(report.parties[0].party_name, "Globex");
        assert_eq!(report.parties[1].days_0_30, Decimal::new(25_050, 2));
    }

    #[test]
    fn settled_items_are_ignored() {
        let as_of = date(2026, 1, 31);
        let party = Uuid::new_v4();
        let items = vec![
            item(party, "Initech", date(2025, 1, 1), 0),
            item(party, "Initech", date(2025, 1, 1), -500),
        ];

        let report = bucket(&items, as_of);
        assert!(report.total_outstanding.is_zero());
        assert!(report.parties.is_empty());
        assert!(report.buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn labels_are_in_bucket_order() {
        let report = bucket(&[], date(2026, 1, 1));
        let labels: Vec<&str> = report.buckets.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["Not due", "0-30", "31-60", "61-90", "90+"]);
    }
}
