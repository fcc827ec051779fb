use axum::{
    extract::{Query, State},
    response::Response,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppResult,
    handlers::{
        invoices::refresh_statuses,
        reports::{inventory_value, today, DateRange, ReportQuery},
    },
    middleware::CurrentUser,
    models::InvoiceType,
    utils::response,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvoiceHeadline {
    pub invoice_count: i64,
    pub total: Decimal,
    pub collected: Decimal,
    pub outstanding: Decimal,
    pub overdue_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub range: DateRange,
    pub sales: InvoiceHeadline,
    pub purchases: InvoiceHeadline,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub client_count: i64,
    pub supplier_count: i64,
    pub product_count: i64,
    pub low_stock_count: i64,
    pub pending_order_count: i64,
    pub inventory_value: Decimal,
}

async fn invoice_headline(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    range: DateRange,
) -> AppResult<InvoiceHeadline> {
    let (invoice_count, total, collected, overdue_count): (i64, Decimal, Decimal, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(total), 0),
               COALESCE(SUM(amount_paid), 0),
               COUNT(*) FILTER (WHERE status = 'Overdue')
        FROM invoices
        WHERE user_id = $1 AND invoice_type = $2 AND is_deleted = FALSE
          AND invoice_date BETWEEN $3 AND $4
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_one(db)
    .await?;

    Ok(InvoiceHeadline {
        invoice_count,
        total,
        collected,
        outstanding: total - collected,
        overdue_count,
    })
}

pub async fn dashboard(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    refresh_statuses(&db, user.id).await?;

    let sales = invoice_headline(&db, user.id, InvoiceType::Sales, range).await?;
    let purchases = invoice_headline(&db, user.id, InvoiceType::Purchase, range).await?;

    let total_expenses: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM user_expenses
        WHERE user_id = $1 AND is_deleted = FALSE AND expense_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user.id)
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_one(&db)
    .await?;

    let (client_count, supplier_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE user_type = 'client'),
               COUNT(*) FILTER (WHERE user_type = 'supplier')
        FROM clients
        WHERE user_id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    let (product_count, low_stock_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE is_track_inventory AND stock_level <= reorder_point)
        FROM products
        WHERE user_id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    let pending_order_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM purchase_orders WHERE user_id = $1 AND is_deleted = FALSE AND order_status = 'Pending'",
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    let dashboard = Dashboard {
        range,
        net_profit: sales.total - purchases.total - total_expenses,
        sales,
        purchases,
        total_expenses,
        client_count,
        supplier_count,
        product_count,
        low_stock_count,
        pending_order_count,
        inventory_value: inventory_value(&db, user.id).await?,
    };

    Ok(response::ok("Dashboard fetched successfully.", dashboard))
}
