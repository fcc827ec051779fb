//! Line and document totals shared by purchase orders and invoices.

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    reporting::round_money,
};

/// Largest value a `NUMERIC(12,2)` money column holds: 9,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

#[derive(Debug, Clone, Deserialize)]
pub struct LineInput {
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub qty: Option<i32>,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

/// A validated line, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub qty: i32,
    pub price: Decimal,
    pub tax_rate: Decimal,
    pub amounts: LineAmounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

fn within_ceiling(amount: Decimal) -> Option<Decimal> {
    (amount <= MAX_AMOUNT).then_some(amount)
}

/// Fails when any amount would not fit a money column.
pub fn compute_line(qty: i32, price: Decimal, tax_rate: Decimal) -> AppResult<LineAmounts> {
    let too_large = || AppError::validation("Item amount is too large.");

    let subtotal = Decimal::from(qty)
        .checked_mul(price)
        .map(round_money)
        .and_then(within_ceiling)
        .ok_or_else(too_large)?;
    let tax_amount = subtotal
        .checked_mul(tax_rate)
        .map(|tax| round_money(tax / Decimal::ONE_HUNDRED))
        .ok_or_else(too_large)?;
    let line_total = subtotal
        .checked_add(tax_amount)
        .and_then(within_ceiling)
        .ok_or_else(too_large)?;

    Ok(LineAmounts {
        subtotal,
        tax_amount,
        line_total,
    })
}

pub fn price_line(line: &LineInput) -> AppResult<PricedLine> {
    let qty = line
        .qty
        .filter(|qty| *qty > 0)
        .ok_or_else(|| AppError::validation("Item quantity must be greater than zero."))?;
    let price = line
        .price
        .filter(|price| !price.is_sign_negative())
        .ok_or_else(|| AppError::validation("Item price must be zero or more."))?;
    if price > MAX_AMOUNT {
        return Err(AppError::validation("Item price is too large."));
    }
    let tax_rate = line.tax_rate.unwrap_or(Decimal::ZERO);
    if tax_rate.is_sign_negative() || tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::validation("Tax rate must be between 0 and 100."));
    }

    Ok(PricedLine {
        product_id: line.product_id,
        description: line
            .description
            .as_ref()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        qty,
        price,
        tax_rate,
        amounts: compute_line(qty, price, tax_rate)?,
    })
}

pub fn price_lines(lines: &[LineInput]) -> AppResult<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(AppError::validation("At least one item is required."));
    }
    lines.iter().map(price_line).collect()
}

/// Total is `subtotal - discount + tax`; the discount may not exceed the subtotal.
pub fn document_totals(lines: &[PricedLine], discount: Decimal) -> AppResult<DocumentTotals> {
    let subtotal: Decimal = lines.iter().map(|line| line.amounts.subtotal).sum();
    let tax: Decimal = lines.iter().map(|line| line.amounts.tax_amount).sum();
    let discount = round_money(discount);

    if discount.is_sign_negative() || discount > subtotal {
        return Err(AppError::validation("Discount must be between 0 and the subtotal."));
    }
    let total = subtotal - discount + tax;
    if subtotal > MAX_AMOUNT || total > MAX_AMOUNT {
        return Err(AppError::validation("Document total is too large."));
    }

    Ok(DocumentTotals {
        subtotal,
        discount,
        tax,
        total,
    })
}
