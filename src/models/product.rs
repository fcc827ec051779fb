use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::reporting::round_money;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductCategory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_name: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub category_name: Option<String>,
    pub is_active: Option<bool>,
}

/// Products joined with their category name.
pub const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.category_id, c.category_name, p.name, p.item_sku,
           p.description, p.unit_of_measurement, p.stock_level, p.reorder_point,
           p.weight, p.selling_price, p.cost_price, p.profit_margin, p.tax,
           p.gst_category, p.discount_percentage, p.product_image, p.final_price,
           p.is_track_inventory, p.is_inter_state_sale, p.is_active, p.is_deleted,
           p.created_at, p.updated_at
    FROM products p
    LEFT JOIN product_categories c ON c.id = p.category_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub name: String,
    pub item_sku: String,
    pub description: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub stock_level: i32,
    pub reorder_point: i32,
    pub weight: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub tax: Option<String>,
    pub gst_category: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub product_image: Option<String>,
    pub final_price: Option<Decimal>,
    pub is_track_inventory: bool,
    pub is_inter_state_sale: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.is_track_inventory && self.stock_level <= self.reorder_point
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub item_sku: Option<String>,
    pub description: Option<String>,
    pub category: Option<Uuid>,
    pub unit_of_measurement: Option<String>,
    pub stock_level: Option<i32>,
    pub reorder_point: Option<i32>,
    pub weight: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub tax: Option<String>,
    pub gst_category: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub is_track_inventory: Option<bool>,
    pub is_inter_state_sale: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustmentRequest {
    pub quantity: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductListItem {
    pub id: Uuid,
    pub name: String,
    pub item_sku: String,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub stock_level: i32,
    pub reorder_point: i32,
    pub selling_price: Option<Decimal>,
    pub final_price: Option<Decimal>,
    pub product_image: Option<String>,
    pub is_low_stock: bool,
    pub is_active: bool,
}

impl From<Product> for ProductListItem {
    fn from(product: Product) -> Self {
        let is_low_stock = product.is_low_stock();
        Self {
            id: product.id,
            name: product.name,
            item_sku: product.item_sku,
            category_id: product.category_id,
            category_name: product.category_name,
            stock_level: product.stock_level,
            reorder_point: product.reorder_point,
            selling_price: product.selling_price,
            final_price: product.final_price,
            product_image: product.product_image,
            is_low_stock,
            is_active: product.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub profit_margin: Option<Decimal>,
    pub final_price: Option<Decimal>,
}

/// Margin needs both prices and a non-zero selling price. The final price
/// applies the discount first, then GST.
pub fn derive_pricing(
    selling_price: Option<Decimal>,
    cost_price: Option<Decimal>,
    discount_percentage: Option<Decimal>,
    gst_rate: Option<Decimal>,
) -> Pricing {
    let hundred = Decimal::ONE_HUNDRED;

    let profit_margin = match (selling_price, cost_price) {
        (Some(selling), Some(cost)) if !selling.is_zero() => {
            Some(round_money((selling - cost) / selling * hundred))
        }
        _ => None,
    };

    let final_price = selling_price.map(|selling| {
        let discount = discount_percentage.unwrap_or(Decimal::ZERO);
        let gst = gst_rate.unwrap_or(Decimal::ZERO);
        round_money(selling * (Decimal::ONE - discount / hundred) * (Decimal::ONE + gst / hundred))
    });

    Pricing {
        profit_margin,
        final_price,
    }
}

/// Applies a signed adjustment; `None` when the result would be negative.
pub fn adjusted_stock(current: i32, delta: i32) -> Option<i32> {
    current.checked_add(delta).filter(|level| *level >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn derives_margin_and_final_price() {
        let pricing = derive_pricing(
            Some(dec("200")),
            Some(dec("150")),
            Some(dec("10")),
            Some(dec("18")),
        );
        assert_eq!(pricing.profit_margin, Some(dec("25.00")));
        assert_eq!(pricing.final_price, Some(dec("212.40")));
    }

    #[test]
    fn margin_needs_both_prices() {
        let pricing = derive_pricing(Some(dec("99.99")), None, None, None);
        assert_eq!(pricing.profit_margin, None);
        assert_eq!(pricing.final_price, Some(dec("99.99")));

        let pricing = derive_pricing(Some(Decimal::ZERO), Some(dec("5")), None, None);
        assert_eq!(pricing.profit_margin, None);

        let pricing = derive_pricing(None, Some(dec("5")), None, None);
        assert_eq!(pricing.final_price, None);
    }

    #[test]
    fn stock_never_goes_negative() {
        assert_eq!(adjusted_stock(10, -4), Some(6));
        assert_eq!(adjusted_stock(3, -4), None);
        assert_eq!(adjusted_stock(0, 12), Some(12));
    }
}
