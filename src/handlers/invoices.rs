use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
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
        document_totals, due_date_for_term, price_lines, Action, ClientType, DocumentTotals,
        EntityType, Invoice, InvoiceDetail, InvoiceItem, InvoicePayment, InvoiceRequest, LineAmounts,
        InvoiceStatus, InvoiceType, PaymentRequest, PricedLine, INVOICE_SELECT,
    },
    reporting::round_money,
    utils::{
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{optional_text, parse_date_param},
        ApiJson,
    },
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Re-derives the stored status of the caller's open invoices so lists and
/// reports see `Overdue` as soon as the due date has passed.
pub async fn refresh_statuses(db: &Database, user_id: Uuid) -> AppResult<()> {
    let changed = sqlx::query(
        r#"
        UPDATE invoices
        SET status = CASE
                WHEN amount_paid >= total THEN 'Paid'
                WHEN due_date < $2 THEN 'Overdue'
                ELSE 'Pending'
            END,
            updated_at = NOW()
        WHERE user_id = $1 AND is_deleted = FALSE
          AND status <> CASE
                WHEN amount_paid >= total THEN 'Paid'
                WHEN due_date < $2 THEN 'Overdue'
                ELSE 'Pending'
            END
        "#,
    )
    .bind(user_id)
    .bind(today())
    .execute(db)
    .await?;

    if changed.rows_affected() > 0 {
        log::debug!("refreshed {} invoice statuses for {}", changed.rows_affected(), user_id);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct InvoiceFilters {
    invoice_type: Option<String>,
    status: Option<String>,
    client: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

#[derive(Default)]
struct InvoiceScope {
    invoice_type: Option<InvoiceType>,
    status: Option<InvoiceStatus>,
    client_id: Option<Uuid>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

impl InvoiceScope {
    fn from_filters(filters: &InvoiceFilters) -> AppResult<Self> {
        let invoice_type = match filters.invoice_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(InvoiceType::parse(raw).ok_or_else(invalid_invoice_type)?),
            None => None,
        };
        let status = match filters.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(InvoiceStatus::parse(raw).ok_or_else(|| AppError::validation("Invalid invoice status."))?),
            None => None,
        };
        let client_id = match filters.client.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| AppError::not_found("Client not found."))?),
            None => None,
        };

        Ok(Self {
            invoice_type,
            status,
            client_id,
            date_from: parse_date_param(filters.date_from.as_deref(), "date_from")?,
            date_to: parse_date_param(filters.date_to.as_deref(), "date_to")?,
        })
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid) {
        builder.push(" WHERE i.user_id = ");
        builder.push_bind(user_id);
        builder.push(" AND i.is_deleted = FALSE");

        if let Some(invoice_type) = self.invoice_type {
            builder.push(" AND i.invoice_type = ");
            builder.push_bind(invoice_type.as_str());
        }
        if let Some(status) = self.status {
            builder.push(" AND i.status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(client_id) = self.client_id {
            builder.push(" AND i.client_id = ");
            builder.push_bind(client_id);
        }
        if let Some(date_from) = self.date_from {
            builder.push(" AND i.invoice_date >= ");
            builder.push_bind(date_from);
        }
        if let Some(date_to) = self.date_to {
            builder.push(" AND i.invoice_date <= ");
            builder.push_bind(date_to);
        }
    }
}

fn invalid_invoice_type() -> AppError {
    AppError::validation("Invoice type must be sales or purchase.")
}

pub async fn invoices_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<InvoiceFilters>,
) -> AppResult<Paginated<Invoice>> {
    let request = PageRequest::from_query(&filters.page)?;
    let scope = InvoiceScope::from_filters(&filters)?;

    refresh_statuses(&db, user.id).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM invoices i");
    scope.push_where(&mut count, user.id);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new(INVOICE_SELECT);
    scope.push_where(&mut rows, user.id);
    rows.push(" ORDER BY i.invoice_date DESC, i.created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let invoices = rows.build_query_as::<Invoice>().fetch_all(&db).await?;

    Ok(Paginated::new(invoices, total, request, uri))
}

/// Validated invoice contents.
struct InvoicePlan {
    client_id: Uuid,
    invoice_type: InvoiceType,
    invoice_date: NaiveDate,
    due_date: NaiveDate,
    is_inter_state: bool,
    notes: Option<String>,
    lines: Option<Vec<PricedLine>>,
    totals: DocumentTotals,
}

fn expected_party(invoice_type: InvoiceType) -> ClientType {
    match invoice_type {
        InvoiceType::Sales => ClientType::Client,
        InvoiceType::Purchase => ClientType::Supplier,
    }
}

async fn plan_invoice(
    db: &Database,
    user_id: Uuid,
    body: InvoiceRequest,
    current: Option<(&Invoice, &[InvoiceItem])>,
) -> AppResult<InvoicePlan> {
    let invoice_type = match (body.invoice_type.as_deref().map(str::trim).filter(|s| !s.is_empty()), current) {
        (Some(raw), None) => InvoiceType::parse(raw).ok_or_else(invalid_invoice_type)?,
        (Some(raw), Some((invoice, _))) => {
            let requested = InvoiceType::parse(raw).ok_or_else(invalid_invoice_type)?;
            if requested != invoice.kind() {
                return Err(AppError::validation("Invoice type cannot be changed."));
            }
            requested
        }
        (None, Some((invoice, _))) => invoice.kind(),
        (None, None) => return Err(AppError::validation("Invoice type is required.")),
    };

    let client_id = match (body.client, current) {
        (Some(client_id), _) => client_id,
        (None, Some((invoice, _))) => invoice.client_id,
        (None, None) => return Err(AppError::validation("Client is required.")),
    };
    let client = find_client(db, user_id, client_id).await?;
    let party = expected_party(invoice_type);
    if client.user_type != party.as_str() {
        return Err(AppError::validation(format!(
            "A {} invoice needs a {}.",
            invoice_type.as_str(),
            party.as_str()
        )));
    }

    let invoice_date = body
        .invoice_date
        .or(current.map(|(invoice, _)| invoice.invoice_date))
        .unwrap_or_else(today);

    let due_date = match (body.due_date, current) {
        (Some(due_date), _) => due_date,
        (None, Some((invoice, _))) if body.invoice_date.is_none() => invoice.due_date,
        _ => due_date_for_term(invoice_date, client.payment_term.as_deref())?,
    };
    if due_date < invoice_date {
        return Err(AppError::validation("Due date cannot be before the invoice date."));
    }

    let lines = match body.items {
        Some(items) => {
            let lines = price_lines(&items)?;
            for line in &lines {
                if line.product_id.is_none() && line.description.is_none() {
                    return Err(AppError::validation("Description is required for items without a product."));
                }
            }
            let product_ids: Vec<Uuid> = lines.iter().filter_map(|line| line.product_id).collect();
            ensure_products_owned(db, user_id, &product_ids).await?;
            Some(lines)
        }
        None if current.is_none() => return Err(AppError::validation("At least one item is required.")),
        None => None,
    };

    let discount = body
        .discount
        .or(current.map(|(invoice, _)| invoice.discount))
        .unwrap_or(Decimal::ZERO);

    let totals = match (&lines, current) {
        (Some(lines), _) => document_totals(lines, discount)?,
        (None, Some((_, items))) => {
            let existing: Vec<PricedLine> = items.iter().map(priced_from_item).collect();
            document_totals(&existing, discount)?
        }
        (None, None) => DocumentTotals::default(),
    };

    let notes = match body.notes {
        Some(notes) => optional_text(Some(notes)),
        None => current.and_then(|(invoice, _)| invoice.notes.clone()),
    };

    Ok(InvoicePlan {
        client_id,
        invoice_type,
        invoice_date,
        due_date,
        is_inter_state: body
            .is_inter_state
            .or(current.map(|(invoice, _)| invoice.is_inter_state))
            .unwrap_or(false),
        notes,
        lines,
        totals,
    })
}

fn priced_from_item(item: &InvoiceItem) -> PricedLine {
    PricedLine {
        product_id: item.product_id,
        description: item.description.clone(),
        qty: item.qty,
        price: item.price,
        tax_rate: item.tax_rate,
        amounts: LineAmounts {
            subtotal: round_money(Decimal::from(item.qty) * item.price),
            tax_amount: item.tax_amount,
            line_total: item.line_total,
        },
    }
}

async fn insert_items(conn: &mut PgConnection, invoice_id: Uuid, lines: &[PricedLine]) -> AppResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (invoice_id, product_id, description, qty, price, tax_rate,
                                       tax_amount, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invoice_id)
        .bind(line.product_id)
        .bind(&line.description)
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

/// Sales take stock out; `sign` of -1 applies, +1 reverses.
/// Signed stock movement per line. Sales take stock out (`-1`); deleting or
/// replacing them puts it back (`1`). Lines without a product move nothing.
fn stock_deltas(lines: impl Iterator<Item = (Option<Uuid>, i32)>, sign: i32) -> Vec<(Uuid, i32)> {
    lines
        .filter_map(|(product_id, qty)| product_id.map(|id| (id, sign * qty)))
        .collect()
}

async fn apply_sales_stock(
    conn: &mut PgConnection,
    user_id: Uuid,
    lines: impl Iterator<Item = (Option<Uuid>, i32)>,
    sign: i32,
) -> AppResult<()> {
    for (product_id, delta) in stock_deltas(lines, sign) {
        move_stock(conn, user_id, product_id, delta).await?;
    }
    Ok(())
}

async fn insert_invoice(db: &Database, user: &CurrentUser, plan: &InvoicePlan, lines: &[PricedLine]) -> AppResult<Uuid> {
    let mut tx = begin(db).await?;

    let invoice_number = next_document_number(
        &mut tx,
        user.id,
        plan.invoice_type.document_kind(),
        &user.fullname,
        plan.invoice_date.year(),
    )
    .await?;

    let status = InvoiceStatus::derive(plan.totals.total, Decimal::ZERO, plan.due_date, today());

    let invoice_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO invoices (user_id, client_id, invoice_type, invoice_number, invoice_date,
                              due_date, is_inter_state, subtotal, discount, tax, total,
                              amount_paid, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, $12, $13)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(plan.client_id)
    .bind(plan.invoice_type.as_str())
    .bind(&invoice_number)
    .bind(plan.invoice_date)
    .bind(plan.due_date)
    .bind(plan.is_inter_state)
    .bind(plan.totals.subtotal)
    .bind(plan.totals.discount)
    .bind(plan.totals.tax)
    .bind(plan.totals.total)
    .bind(status.as_str())
    .bind(&plan.notes)
    .fetch_one(&mut *tx)
    .await?;

    insert_items(&mut tx, invoice_id, lines).await?;
    if plan.invoice_type == InvoiceType::Sales {
        apply_sales_stock(&mut tx, user.id, lines.iter().map(|l| (l.product_id, l.qty)), -1).await?;
    }
    tx.commit().await?;

    Ok(invoice_id)
}

pub async fn create_invoice(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<InvoiceRequest>,
) -> AppResult<Response> {
    let plan = plan_invoice(&db, user.id, body, None).await?;
    let lines = plan.lines.clone().unwrap_or_default();

    for attempt in 1..=NUMBERING_ATTEMPTS {
        match insert_invoice(&db, &user, &plan, &lines).await {
            Ok(invoice_id) => {
                let detail = load_detail(&db, user.id, invoice_id).await?;
                log_activity(
                    &db,
                    user.id,
                    Action::Created,
                    EntityType::Invoice,
                    Some(invoice_id),
                    format!("Created {} invoice {}", plan.invoice_type.as_str(), detail.invoice.invoice_number),
                )
                .await;
                return Ok(response::created("Invoice created successfully.", detail));
            }
            Err(err) if is_number_collision(&err) => {
                log::warn!("invoice number collision for user {} (attempt {})", user.id, attempt);
            }
            Err(err) => return Err(err),
        }
    }

    Err(numbering_exhausted())
}

async fn find_invoice(db: &Database, user_id: Uuid, invoice_id: Uuid) -> AppResult<Invoice> {
    let query = format!("{} WHERE i.id = $1 AND i.user_id = $2 AND i.is_deleted = FALSE", INVOICE_SELECT);
    sqlx::query_as::<_, Invoice>(&query)
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found."))
}

async fn load_items(db: &Database, invoice_id: Uuid) -> AppResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT i.id, i.invoice_id, i.product_id, p.name AS product_name, i.description, i.qty,
               i.price, i.tax_rate, i.tax_amount, i.line_total
        FROM invoice_items i
        LEFT JOIN products p ON p.id = i.product_id
        WHERE i.invoice_id = $1
        ORDER BY i.created_at
        "#,
    )
    .bind(invoice_id)
    .fetch_all(db)
    .await?;
    Ok(items)
}

async fn load_payments(db: &Database, invoice_id: Uuid) -> AppResult<Vec<InvoicePayment>> {
    let payments = sqlx::query_as::<_, InvoicePayment>(
        r#"
        SELECT id, invoice_id, amount, payment_date, payment_method, reference, created_at
        FROM invoice_payments
        WHERE invoice_id = $1
        ORDER BY payment_date, created_at
        "#,
    )
    .bind(invoice_id)
    .fetch_all(db)
    .await?;
    Ok(payments)
}

async fn load_detail(db: &Database, user_id: Uuid, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
    let invoice = find_invoice(db, user_id, invoice_id).await?;
    let items = load_items(db, invoice.id).await?;
    let payments = load_payments(db, invoice.id).await?;
    Ok(InvoiceDetail {
        outstanding: invoice.outstanding(),
        invoice,
        items,
        payments,
    })
}

pub async fn invoice_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Response> {
    refresh_statuses(&db, user.id).await?;
    let detail = load_detail(&db, user.id, invoice_id).await?;
    Ok(response::ok("Invoice fetched successfully.", detail))
}

fn ensure_editable(amount_paid: Decimal, items_changed: bool) -> AppResult<()> {
    if items_changed && amount_paid > Decimal::ZERO {
        return Err(AppError::validation("Items cannot be changed after a payment is recorded."));
    }
    Ok(())
}

fn ensure_covers_paid(total: Decimal, amount_paid: Decimal) -> AppResult<()> {
    if total < amount_paid {
        return Err(AppError::validation("Invoice total cannot be less than the amount already paid."));
    }
    Ok(())
}

fn ensure_deletable(amount_paid: Decimal) -> AppResult<()> {
    if amount_paid > Decimal::ZERO {
        return Err(AppError::validation("Invoices with recorded payments cannot be deleted."));
    }
    Ok(())
}

fn ensure_payment_fits(amount: Decimal, total: Decimal, amount_paid: Decimal) -> AppResult<()> {
    if amount > total - amount_paid {
        return Err(AppError::validation("Payment exceeds outstanding amount."));
    }
    Ok(())
}

/// Locks the invoice row for the rest of the transaction and returns its current `amount_paid`.
async fn lock_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT amount_paid FROM invoices WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
    )
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Invoice not found."))
}

async fn stored_quantities(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<Vec<(Option<Uuid>, i32)>> {
    let rows = sqlx::query_as::<_, (Option<Uuid>, i32)>(
        "SELECT product_id, qty FROM invoice_items WHERE invoice_id = $1",
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn update_invoice(
    State(db): State<Database>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    ApiJson(body): ApiJson<InvoiceRequest>,
) -> AppResult<Response> {
    let current = find_invoice(&db, user.id, invoice_id).await?;
    let current_items = load_items(&db, current.id).await?;
    let items_changed = body.items.is_some();
    ensure_editable(current.amount_paid, items_changed)?;

    let plan = plan_invoice(&db, user.id, body, Some((&current, current_items.as_slice()))).await?;
    ensure_covers_paid(plan.totals.total, current.amount_paid)?;

    let mut tx = begin(&db).await?;

    // A payment may have landed since the checks above.
    let amount_paid = lock_invoice(&mut tx, current.id).await?;
    ensure_editable(amount_paid, items_changed)?;
    ensure_covers_paid(plan.totals.total, amount_paid)?;
    let status = InvoiceStatus::derive(plan.totals.total, amount_paid, plan.due_date, today());

    sqlx::query(
        r#"
        UPDATE invoices
        SET client_id = $1, invoice_date = $2, due_date = $3, is_inter_state = $4, subtotal = $5,
            discount = $6, tax = $7, total = $8, status = $9, notes = $10, updated_at = NOW()
        WHERE id = $11
        "#,
    )
    .bind(plan.client_id)
    .bind(plan.invoice_date)
    .bind(plan.due_date)
    .bind(plan.is_inter_state)
    .bind(plan.totals.subtotal)
    .bind(plan.totals.discount)
    .bind(plan.totals.tax)
    .bind(plan.totals.total)
    .bind(status.as_str())
    .bind(&plan.notes)
    .bind(current.id)
    .execute(&mut *tx)
    .await?;

    if let Some(lines) = &plan.lines {
        if plan.invoice_type == InvoiceType::Sales {
            let stored = stored_quantities(&mut tx, current.id).await?;
            apply_sales_stock(&mut tx, user.id, stored.into_iter(), 1).await?;
        }
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(current.id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, current.id, lines).await?;
        if plan.invoice_type == InvoiceType::Sales {
            apply_sales_stock(&mut tx, user.id, lines.iter().map(|l| (l.product_id, l.qty)), -1).await?;
        }
    }
    tx.commit().await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::Invoice,
        Some(current.id),
        format!("Updated invoice {}", current.invoice_number),
    )
    .await;

    let detail = load_detail(&db, user.id, current.id).await?;
    Ok(response::ok("Invoice updated successfully.", detail))
}

pub async fn delete_invoice(
    State(db): State<Database>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Response> {
    let invoice = find_invoice(&db, user.id, invoice_id).await?;
    ensure_deletable(invoice.amount_paid)?;

    let mut tx = begin(&db).await?;
    let amount_paid = lock_invoice(&mut tx, invoice.id).await?;
    ensure_deletable(amount_paid)?;

    sqlx::query("UPDATE invoices SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(invoice.id)
        .execute(&mut *tx)
        .await?;
    if invoice.kind() == InvoiceType::Sales {
        let stored = stored_quantities(&mut tx, invoice.id).await?;
        apply_sales_stock(&mut tx, user.id, stored.into_iter(), 1).await?;
    }
    tx.commit().await?;

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::Invoice,
        Some(invoice.id),
        format!("Deleted invoice {}", invoice.invoice_number),
    )
    .await;

    Ok(response::message("Invoice deleted successfully."))
}

pub async fn record_payment(
    State(db): State<Database>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    ApiJson(body): ApiJson<PaymentRequest>,
) -> AppResult<Response> {
    let amount = body
        .amount
        .map(round_money)
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| AppError::validation("Payment amount must be greater than zero."))?;
    let payment_date = body.payment_date.unwrap_or_else(today);

    let invoice = find_invoice(&db, user.id, invoice_id).await?;

    let mut tx = begin(&db).await?;

    // Re-read under a row lock so concurrent payments see each other.
    let (total, amount_paid, due_date): (Decimal, Decimal, NaiveDate) = sqlx::query_as(
        "SELECT total, amount_paid, due_date FROM invoices WHERE id = $1 FOR UPDATE",
    )
    .bind(invoice.id)
    .fetch_one(&mut *tx)
    .await?;

    ensure_payment_fits(amount, total, amount_paid)?;

    let payment = sqlx::query_as::<_, InvoicePayment>(
        r#"
        INSERT INTO invoice_payments (invoice_id, amount, payment_date, payment_method, reference)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, invoice_id, amount, payment_date, payment_method, reference, created_at
        "#,
    )
    .bind(invoice.id)
    .bind(amount)
    .bind(payment_date)
    .bind(optional_text(body.payment_method))
    .bind(optional_text(body.reference))
    .fetch_one(&mut *tx)
    .await?;

    let paid = amount_paid + amount;
    let status = InvoiceStatus::derive(total, paid, due_date, today());
    sqlx::query("UPDATE invoices SET amount_paid = $1, status = $2, updated_at = NOW() WHERE id = $3")
        .bind(paid)
        .bind(status.as_str())
        .bind(invoice.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log_activity(
        &db,
        user.id,
        Action::PaymentRecorded,
        EntityType::Invoice,
        Some(invoice.id),
        format!("Recorded payment of {} on {}", payment.amount, invoice.invoice_number),
    )
    .await;

    let detail = load_detail(&db, user.id, invoice.id).await?;
    Ok(response::created("Payment recorded successfully.", detail))
}

pub async fn payments_list(
    State(db): State<Database>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Response> {
    let invoice = find_invoice(&db, user.id, invoice_id).await?;
    let payments = load_payments(&db, invoice.id).await?;
    Ok(response::ok("Payments fetched successfully.", payments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_follows_invoice_type() {
        assert_eq!(expected_party(InvoiceType::Sales), ClientType::Client);
        assert_eq!(expected_party(InvoiceType::Purchase), ClientType::Supplier);
    }

    #[test]
    fn scope_rejects_unknown_filters() {
        let filters = InvoiceFilters {
            invoice_type: Some("credit".to_string()),
            status: None,
            client: None,
            date_from: None,
            date_to: None,
            page: PageQuery::default(),
        };
        assert!(InvoiceScope::from_filters(&filters).is_err());

        let filters = InvoiceFilters {
            invoice_type: Some("sales".to_string()),
            status: Some("overdue".to_string()),
            client: None,
            date_from: Some("2026-01-01".to_string()),
            date_to: Some("".to_string()),
            page: PageQuery::default(),
        };
        let scope = InvoiceScope::from_filters(&filters).unwrap();
        assert_eq!(scope.invoice_type, Some(InvoiceType::Sales));
        assert_eq!(scope.status, Some(InvoiceStatus::Overdue));
        assert_eq!(scope.date_from, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(scope.date_to, None);
    }

    #[test]
    fn existing_items_keep_their_amounts() {
        let item = InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            product_id: None,
            product_name: None,
            description: Some("Consulting".to_string()),
            qty: 2,
            price: Decimal::from(50),
            tax_rate: Decimal::from(18),
            tax_amount: Decimal::from(18),
            line_total: Decimal::from(118),
        };
        let line = priced_from_item(&item);
        assert_eq!(line.amounts.subtotal, Decimal::from(100));
        assert_eq!(line.amounts.line_total, Decimal::from(118));
    }

    #[test]
    fn deleting_a_sale_restores_what_it_took() {
        let widget = Uuid::new_v4();
        let lines = vec![(Some(widget), 3), (None, 5), (Some(widget), 2)];

        let taken = stock_deltas(lines.clone().into_iter(), -1);
        assert_eq!(taken, vec![(widget, -3), (widget, -2)]);

        let restored = stock_deltas(lines.into_iter(), 1);
        let net: i32 = taken.iter().chain(restored.iter()).map(|(_, delta)| delta).sum();
        assert_eq!(net, 0);
    }

    #[test]
    fn paid_invoices_are_locked_down() {
        let paid = Decimal::from(40);
        assert!(ensure_editable(Decimal::ZERO, true).is_ok());
        assert!(ensure_editable(paid, false).is_ok());
        let err = ensure_editable(paid, true).unwrap_err();
        assert_eq!(err.to_string(), "Items cannot be changed after a payment is recorded.");

        assert!(ensure_covers_paid(Decimal::from(40), paid).is_ok());
        assert!(ensure_covers_paid(Decimal::from(39), paid).is_err());

        assert!(ensure_deletable(Decimal::ZERO).is_ok());
        let err = ensure_deletable(paid).unwrap_err();
        assert_eq!(err.to_string(), "Invoices with recorded payments cannot be deleted.");
    }

    #[test]
    fn payments_cannot_exceed_outstanding() {
        let total = Decimal::from(100);
        let paid = Decimal::from(60);
        assert!(ensure_payment_fits(Decimal::from(40), total, paid).is_ok());
        assert!(ensure_payment_fits(Decimal::new(1, 2), total, paid).is_ok());

        let err = ensure_payment_fits(Decimal::new(4001, 2), total, paid).unwrap_err();
        assert_eq!(err.to_string(), "Payment exceeds outstanding amount.");
        assert!(ensure_payment_fits(Decimal::ONE, total, total).is_err());
    }
}
