use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::line_item::LineInput;
use crate::utils::numbering::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    Sales,
    Purchase,
}

impl InvoiceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sales" | "sale" => Some(Self::Sales),
            "purchase" => Some(Self::Purchase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Purchase => "purchase",
        }
    }

    pub fn document_kind(&self) -> DocumentKind {
        match self {
            Self::Sales => DocumentKind::SalesInvoice,
            Self::Purchase => DocumentKind::PurchaseInvoice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
        }
    }

    /// Status follows from the amounts and dates; it is never set directly.
    pub fn derive(total: Decimal, amount_paid: Decimal, due_date: NaiveDate, today: NaiveDate) -> Self {
        if amount_paid >= total {
            Self::Paid
        } else if due_date < today {
            Self::Overdue
        } else {
            Self::Pending
        }
    }
}

pub const INVOICE_SELECT: &str = r#"
    SELECT i.id, i.user_id, i.client_id, c.client_name, i.invoice_type, i.invoice_number,
           i.invoice_date, i.due_date, i.is_inter_state, i.subtotal, i.discount, i.tax,
           i.total, i.amount_paid, i.status, i.notes, i.created_at, i.updated_at
    FROM invoices i
    LEFT JOIN clients c ON c.id = i.client_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub invoice_type: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub is_inter_state: bool,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn outstanding(&self) -> Decimal {
        (self.total - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn kind(&self) -> InvoiceType {
        InvoiceType::parse(&self.invoice_type).unwrap_or(InvoiceType::Sales)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub qty: i32,
    pub price: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicePayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    pub client: Option<Uuid>,
    pub invoice_type: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub is_inter_state: Option<bool>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineInput>>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub outstanding: Decimal,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<InvoicePayment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn paid_wins_over_overdue() {
        let total = Decimal::from(100);
        assert_eq!(InvoiceStatus::derive(total, total, day(1), day(20)), InvoiceStatus::Paid);
        assert_eq!(
            InvoiceStatus::derive(total, Decimal::from(150), day(1), day(20)),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn unpaid_past_due_is_overdue() {
        let total = Decimal::from(100);
        let partial = Decimal::from(40);
        assert_eq!(InvoiceStatus::derive(total, partial, day(10), day(11)), InvoiceStatus::Overdue);
        assert_eq!(InvoiceStatus::derive(total, partial, day(10), day(10)), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::derive(total, Decimal::ZERO, day(15), day(10)), InvoiceStatus::Pending);
    }

    #[test]
    fn invoice_type_maps_to_numbering() {
        assert_eq!(InvoiceType::parse("Sales"), Some(InvoiceType::Sales));
        assert_eq!(InvoiceType::parse("purchase").map(|t| t.document_kind()), Some(DocumentKind::PurchaseInvoice));
        assert_eq!(InvoiceType::parse("credit"), None);
    }
}
