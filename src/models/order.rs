use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::line_item::LineInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Received,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "received" => Some(Self::Received),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Received => "Received",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Only pending orders move, and only to a terminal state.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Received) | (Self::Pending, Self::Cancelled)
        )
    }
}

pub const ORDER_SELECT: &str = r#"
    SELECT o.id, o.user_id, o.client_id, c.client_name, o.order_number, o.order_date,
           o.expected_delivery_date, o.subtotal, o.tax, o.total, o.notes,
           o.order_status, o.created_at, o.updated_at
    FROM purchase_orders o
    LEFT JOIN clients c ON c.id = o.client_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub order_number: String,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::parse(&self.order_status).unwrap_or(OrderStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub qty: i32,
    pub price: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub client: Option<Uuid>,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineInput>>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub order_status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_orders_close_once() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Received));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Received.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use OrderStatus::*;
        let all = [Pending, Received, Cancelled];
        for from in all {
            for to in all {
                let allowed = from == Pending && to != Pending;
                assert_eq!(from.can_transition(to), allowed, "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn status_names_are_case_insensitive() {
        assert_eq!(OrderStatus::parse("received"), Some(OrderStatus::Received));
        assert_eq!(OrderStatus::parse("CANCELLED"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::Received.as_str(), "Received");
    }
}
