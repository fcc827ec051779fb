//! GST breakdown by rate.
//!
//! Intra-state tax is split evenly into CGST and SGST (SGST takes the rounding
//! remainder so the halves always add back up); inter-state tax is all IGST.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::breakdown::round_money;

#[derive(Debug, Clone)]
pub struct TaxLine {
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub is_inter_state: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaxRateRow {
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaxSide {
    pub rows: Vec<TaxRateRow>,
    pub taxable_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxSummary {
    pub output_tax: TaxSide,
    pub input_tax: TaxSide,
    pub net_tax_payable: Decimal,
}

pub fn split_intra_state(tax: Decimal) -> (Decimal, Decimal) {
    let cgst = round_money(tax / Decimal::TWO);
    (cgst, tax - cgst)
}

pub fn summarize_side(lines: &[TaxLine]) -> TaxSide {
    let mut by_rate: BTreeMap<Decimal, TaxRateRow> = BTreeMap::new();

    for line in lines {
        let rate = line.rate.normalize();
        let row = by_rate.entry(rate).or_insert_with(|| TaxRateRow {
            rate,
            ..TaxRateRow::default()
        });

        row.taxable_amount += line.taxable_amount;
        row.total_tax += line.tax_amount;
        if line.is_inter_state {
            row.igst += line.tax_amount;
        } else {
            let (cgst, sgst) = split_intra_state(line.tax_amount);
            row.cgst += cgst;
            row.sgst += sgst;
        }
    }

    let mut side = TaxSide::default();
    for row in by_rate.into_values() {
        side.taxable_amount += row.taxable_amount;
        side.cgst += row.cgst;
        side.sgst += row.sgst;
        side.igst += row.igst;
        side.total_tax += row.total_tax;
        side.rows.push(row);
    }
    side
}

pub fn summarize(output_lines: &[TaxLine], input_lines: &[TaxLine]) -> TaxSummary {
    let output_tax = summarize_side(output_lines);
    let input_tax = summarize_side(input_lines);
    let net_tax_payable = output_tax.total_tax - input_tax.total_tax;

    TaxSummary {
        output_tax,
        input_tax,
        net_tax_payable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(rate: i64, taxable: i64, tax: i64, inter_state: bool) -> TaxLine {
        TaxLine {
            rate: Decimal::new(rate, 0),
            taxable_amount: Decimal::new(taxable, 2),
            tax_amount: Decimal::new(tax, 2),
            is_inter_state: inter_state,
        }
    }

    #[test]
    fn odd_cents_split_without_loss() {
        let (cgst, sgst) = split_intra_state(Decimal::new(1001, 2));
        assert_eq!(cgst + sgst, Decimal::new(1001, 2));
    }

    #[test]
    fn groups_by_rate_and_splits_by_supply_type() {
        let lines = vec![
            line(18, 10_000, 1_800, false),
            line(18, 5_000, 900, true),
            line(5, 20_000, 1_000, false),
        ];

        let side = summarize_side(&lines);
        assert_eq!(side.rows.len(), 2);
        assert_eq!(side.rows[0].rate, Decimal::new(5, 0));
        assert_eq!(side.rows[1].cgst, Decimal::new(900, 2));
        assert_eq!(side.rows[1].sgst, Decimal::new(900, 2));
        assert_eq!(side.rows[1].igst, Decimal::new(900, 2));
        assert_eq!(side.total_tax, Decimal::new(3_700, 2));
        assert_eq!(side.cgst + side.sgst + side.igst, side.total_tax);
        assert_eq!(side.taxable_amount, Decimal::new(35_000, 2));
    }

    #[test]
    fn equal_rates_with_different_scale_share_a_row() {
        let mut a = line(12, 100, 12, false);
        a.rate = Decimal::new(1200, 2);
        let b = line(12, 100, 12, false);

        let side = summarize_side(&[a, b]);
        assert_eq!(side.rows.len(), 1);
    }

    #[test]
    fn net_payable_can_be_a_credit() {
        let summary = summarize(&[line(18, 1_000, 180, false)], &[line(18, 5_000, 900, false)]);
        assert_eq!(summary.net_tax_payable, Decimal::new(-720, 2));
    }
}
