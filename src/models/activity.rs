use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    PaymentRecorded,
    StockAdjusted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
            Action::StatusChanged => "status_changed",
            Action::PaymentRecorded => "payment_recorded",
            Action::StockAdjusted => "stock_adjusted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Company,
    Client,
    ProductCategory,
    Product,
    PurchaseOrder,
    Invoice,
    Expense,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Client => "client",
            EntityType::ProductCategory => "product_category",
            EntityType::Product => "product",
            EntityType::PurchaseOrder => "purchase_order",
            EntityType::Invoice => "invoice",
            EntityType::Expense => "expense",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
