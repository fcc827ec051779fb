use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{
        activities::log_activity,
        clients::find_client,
        documents::{
            begin, ensure_products_owned, is_number_collision, move_stock, next_document_number,
            numbering_exhausted, NUMBERING_ATTEMPTS,
        },
    },
    middleware::CurrentUser,
    models::{
        document_totals, price_lines, Action, ClientType, DocumentTotals, EntityType, LineInput,
        OrderDetail, OrderItem, OrderRequest, OrderStatus, OrderStatusRequest, PricedLine, PurchaseOrder,
        ORDER_SELECT,
    },
    utils::{
        numbering::DocumentKind,
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{optional_text, require},
        ApiJson,
    },
};

#[derive(Debug, Deserialize)]
pub struct OrderFilters {
    status: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

fn push_order_filters(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, status: Option<OrderStatus>) {
    builder.push(" WHERE o.user_id = ");
    builder.push_bind(user_id);
    builder.push(" AND o.is_deleted = FALSE");
    if let Some(status) = status {
        builder.push(" AND o.order_status = ");
        builder.push_bind(status.as_str());
    }
}

pub async fn orders_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<OrderFilters>,
) -> AppResult<Paginated<PurchaseOrder>> {
    let request = PageRequest::from_query(&filters.page)?;
    let status = match optional_text(filters.status) {
        Some(raw) => Some(OrderStatus::parse(&raw).ok_or_else(|| AppError::validation("Invalid order status."))?),
        None => None,
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM purchase_orders o");
    push_order_filters(&mut count, user.id, status);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new(ORDER_SELECT);
    push_order_filters(&mut rows, user.id, status);
    rows.push(" ORDER BY o.created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let orders = rows.build_query_as::<PurchaseOrder>().fetch_all(&db).await?;

    Ok(Paginated::new(orders, total, request, uri))
}

/// Validated order contents, priced and ready to write.
struct OrderPlan {
    client_id: Uuid,
    order_date: NaiveDate,
    expected_delivery_date: Option<NaiveDate>,
    notes: Option<String>,
    lines: Vec<PricedLine>,
    totals: DocumentTotals,
}

async fn plan_order(
    db: &Database,
    user_id: Uuid,
    body: OrderRequest,
    current: Option<&PurchaseOrder>,
) -> AppResult<OrderPlan> {
    let client_id = match (body.client, current) {
        (Some(client_id), _) => client_id,
        (None, Some(order)) => order.client_id,
        (None, None) => return Err(AppError::validation("Supplier is required.")),
    };
    let supplier = find_client(db, user_id, client_id).await?;
    if supplier.user_type != ClientType::Supplier.as_str() {
        return Err(AppError::validation("Purchase orders must be placed with a supplier."));
    }

    let order_date = body
        .order_date
        .or(current.map(|order| order.order_date))
        .unwrap_or_else(|| Utc::now().date_naive());
    let expected_delivery_date = body
        .expected_delivery_date
        .or(current.and_then(|order| order.expected_delivery_date));
    if expected_delivery_date.map_or(false, |date| date < order_date) {
        return Err(AppError::validation("Expected delivery date cannot be before the order date."));
    }

    let items = match (body.items, current) {
        (Some(items), _) => items,
        (None, Some(order)) => load_items(db, order.id)
            .await?
            .into_iter()
            .map(|item| LineInput {
                product_id: Some(item.product_id),
                description: None,
                qty: Some(item.qty),
                price: Some(item.price),
                tax_rate: Some(item.tax_rate),
            })
            .collect(),
        (None, None) => Vec::new(),
    };

    let lines = price_lines(&items)?;
    let mut product_ids = Vec::with_capacity(lines.len());
    for line in &lines {
        let product_id = line
            .product_id
            .ok_or_else(|| AppError::validation("Product is required for every item."))?;
        product_ids.push(product_id);
    }
    ensure_products_owned(db, user_id, &product_ids).await?;

    let totals = document_totals(&lines, Decimal::ZERO)?;
    let notes = match body.notes {
        Some(notes) => optional_text(Some(notes)),
        None => current.and_then(|order| order.notes.clone()),
    };

    Ok(OrderPlan {
        client_id,
        order_date,
        expected_delivery_date,
        notes,
        lines,
        totals,
    })
}

async fn insert_items(conn: &mut sqlx::PgConnection, order_id: Uuid, lines: &[PricedLine]) -> AppResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, qty, price, tax_rate, tax_amount, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.qty)
        .bind(line.price)
        .bind(line.tax_rate)
        .bind(line.amounts.tax_amount)
        .bind(line.amounts.line_total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_order(db: &Database, user: &CurrentUser, plan: &OrderPlan) -> AppResult<Uuid> {
    let mut tx = begin(db).await?;

    let order_number = next_document_number(
        &mut tx,
        user.id,
        DocumentKind::PurchaseOrder,
        &user.fullname,
        plan.order_date.year(),
    )
    .await?;

    let order_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO purchase_orders (user_id, client_id, order_number, order_date,
                                     expected_delivery_date, subtotal, tax, total, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(plan.client_id)
    .bind(&order_number)
    .bind(plan.order_date)
    .bind(plan.expected_delivery_date)
    .bind(plan.totals.subtotal)
    .bind(plan.totals.tax)
    .bind(plan.totals.total)
    .bind(&plan.notes)
    .fetch_one(&mut *tx)
    .await?;

    insert_items(&mut tx, order_id, &plan.lines).await?;
    tx.commit().await?;

    Ok(order_id)
}

pub async fn create_order(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<OrderRequest>,
) -> AppResult<Response> {
    if body.client.is_none() {
        return Err(AppError::validation("Supplier is required."));
    }
    if body.items.as_ref().map_or(true, |items| items.is_empty()) {
        return Err(AppError::validation("At least one item is required."));
    }

    let plan = plan_order(&db, user.id, body, None).await?;

    for attempt in 1..=NUMBERING_ATTEMPTS {
        match insert_order(&db, &user, &plan).await {
            Ok(order_id) => {
                let detail = load_detail(&db, user.id, order_id).await?;
                log_activity(
                    &db,
                    user.id,
                    Action::Created,
                    EntityType::PurchaseOrder,
                    Some(order_id),
                    format!("Created purchase order {}", detail.order.order_number),
                )
                .await;
                return Ok(response::created("Purchase order created successfully.", detail));
            }
            Err(err) if is_number_collision(&err) => {
                log::warn!("order number collision for user {} (attempt {})", user.id, attempt);
            }
            Err(err) => return Err(err),
        }
    }

    Err(numbering_exhausted())
}

async fn find_order(db: &Database, user_id: Uuid, order_id: Uuid) -> AppResult<PurchaseOrder> {
    let query = format!("{} WHERE o.id = $1 AND o.user_id = $2 AND o.is_deleted = FALSE", ORDER_SELECT);
    sqlx::query_as::<_, PurchaseOrder>(&query)
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Purchase Order Not Found."))
}

async fn load_items(db: &Database, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT i.id, i.order_id, i.product_id, p.name AS product_name, i.qty, i.price,
               i.tax_rate, i.tax_amount, i.line_total
        FROM order_items i
        LEFT JOIN products p ON p.id = i.product_id
        WHERE i.order_id = $1
        ORDER BY i.created_at
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;
    Ok(items)
}

async fn load_detail(db: &Database, user_id: Uuid, order_id: Uuid) -> AppResult<OrderDetail> {
    let order = find_order(db, user_id, order_id).await?;
    let items = load_items(db, order.id).await?;
    Ok(OrderDetail { order, items })
}

pub async fn order_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Response> {
    let detail = load_detail(&db, user.id, order_id).await?;
    Ok(response::ok("Purchase order fetched successfully.", detail))
}

fn ensure_pending(order: &PurchaseOrder) -> AppResult<()> {
    if order.status() == OrderStatus::Pending {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Purchase order is already {}.",
            order.status().as_str()
        )))
    }
}

fn ensure_transition(previous: OrderStatus, next: OrderStatus) -> AppResult<()> {
    if previous.can_transition(next) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Cannot change order status from {} to {}.",
            previous.as_str(),
            next.as_str()
        )))
    }
}

pub async fn update_order(
    State(db): State<Database>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    ApiJson(body): ApiJson<OrderRequest>,
) -> AppResult<Response> {
    let current = find_order(&db, user.id, order_id).await?;
    ensure_pending(&current)?;

    let plan = plan_order(&db, user.id, body, Some(&current)).await?;

    let mut tx = begin(&db).await?;
    // The status may have moved on since `current` was read.
    let updated = sqlx::query(
        r#"
        UPDATE purchase_orders
        SET client_id = $1, order_date = $2, expected_delivery_date = $3, subtotal = $4,
            tax = $5, total = $6, notes = $7, updated_at = NOW()
        WHERE id = $8 AND order_status = $9 AND is_deleted = FALSE
        "#,
    )
    .bind(plan.client_id)
    .bind(plan.order_date)
    .bind(plan.expected_delivery_date)
    .bind(plan.totals.subtotal)
    .bind(plan.totals.tax)
    .bind(plan.totals.total)
    .bind(&plan.notes)
    .bind(current.id)
    .bind(OrderStatus::Pending.as_str())
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::validation("Only pending purchase orders can be edited."));
    }

    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(current.id)
        .execute(&mut *tx)
        .await?;
    insert_items(&mut tx, current.id, &plan.lines).await?;
    tx.commit().await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::PurchaseOrder,
        Some(current.id),
        format!("Updated purchase order {}", current.order_number),
    )
    .await;

    let detail = load_detail(&db, user.id, current.id).await?;
    Ok(response::ok("Purchase order updated successfully.", detail))
}

pub async fn delete_order(
    State(db): State<Database>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Response> {
    let order = find_order(&db, user.id, order_id).await?;
    if order.status() == OrderStatus::Received {
        return Err(AppError::validation("Received purchase orders cannot be deleted."));
    }

    let deleted = sqlx::query(
        r#"
        UPDATE purchase_orders SET is_deleted = TRUE, updated_at = NOW()
        WHERE id = $1 AND is_deleted = FALSE AND order_status <> $2
        "#,
    )
    .bind(order.id)
    .bind(OrderStatus::Received.as_str())
    .execute(&db)
    .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::validation("Received purchase orders cannot be deleted."));
    }

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::PurchaseOrder,
        Some(order.id),
        format!("Deleted purchase order {}", order.order_number),
    )
    .await;

    Ok(response::message("Purchase order deleted successfully."))
}

pub async fn update_order_status(
    State(db): State<Database>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    ApiJson(body): ApiJson<OrderStatusRequest>,
) -> AppResult<Response> {
    let raw = require(&body.order_status, "Order status is required.")?;
    let next = OrderStatus::parse(raw).ok_or_else(|| AppError::validation("Invalid order status."))?;

    let order = find_order(&db, user.id, order_id).await?;
    let previous = order.status();
    ensure_transition(previous, next)?;

    let mut tx = begin(&db).await?;

    // Conditional on the old status: a receipt must add stock exactly once.
    let changed = sqlx::query(
        "UPDATE purchase_orders SET order_status = $1, updated_at = NOW() WHERE id = $2 AND order_status = $3",
    )
    .bind(next.as_str())
    .bind(order.id)
    .bind(&order.order_status)
    .execute(&mut *tx)
    .await?;
    if changed.rows_affected() == 0 {
        return Err(AppError::Conflict("Order status changed. Please reload.".to_string()));
    }

    if next == OrderStatus::Received {
        for item in load_items(&db, order.id).await? {
            move_stock(&mut tx, user.id, item.product_id, item.qty).await?;
        }
    }
    tx.commit().await?;

    log_activity(
        &db,
        user.id,
        Action::StatusChanged,
        EntityType::PurchaseOrder,
        Some(order.id),
        format!(
            "Purchase order {} moved from {} to {}",
            order.order_number,
            previous.as_str(),
            next.as_str()
        ),
    )
    .await;

    let detail = load_detail(&db, user.id, order.id).await?;
    Ok(response::ok("Order status updated successfully.", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_orders_cannot_move() {
        assert!(ensure_transition(OrderStatus::Pending, OrderStatus::Received).is_ok());
        assert!(ensure_transition(OrderStatus::Pending, OrderStatus::Cancelled).is_ok());

        let err = ensure_transition(OrderStatus::Received, OrderStatus::Cancelled).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change order status from Received to Cancelled.");
        assert!(ensure_transition(OrderStatus::Cancelled, OrderStatus::Received).is_err());
    }
}
