//! Read-only reports over the caller's own invoices, payments, expenses and
//! stock. Handlers fetch rows with plain aggregate queries and hand them to
//! `crate::reporting` for the arithmetic.

use axum::{
    extract::{Query, State},
    response::Response,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::invoices::refresh_statuses,
    middleware::CurrentUser,
    models::{InvoiceType, Product, PRODUCT_SELECT},
    reporting::{
        aging::{self, AgingItem},
        percentages, round_money,
        series::{bucket_by_day, bucket_by_month, DayTotal, MonthTotal},
        statements::{self, BalanceSheetInput, CashFlowInput, ProfitAndLossInput},
        tax::{self, TaxLine},
    },
    utils::{response, validation::parse_date_param},
};

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    date_from: Option<String>,
    date_to: Option<String>,
    as_of: Option<String>,
    group_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl ReportQuery {
    /// Defaults to the first day of the current year through today.
    pub fn range(&self, today: NaiveDate) -> AppResult<DateRange> {
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let date_from = parse_date_param(self.date_from.as_deref(), "date_from")?.unwrap_or(year_start);
        let date_to = parse_date_param(self.date_to.as_deref(), "date_to")?.unwrap_or(today);

        if date_from > date_to {
            return Err(AppError::validation("date_from cannot be after date_to."));
        }
        Ok(DateRange { date_from, date_to })
    }

    pub fn as_of(&self, today: NaiveDate) -> AppResult<NaiveDate> {
        Ok(parse_date_param(self.as_of.as_deref(), "as_of")?.unwrap_or(today))
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// Party totals (sales by client, purchases by supplier)

#[derive(Debug, Clone, Serialize)]
pub struct PartyTotal {
    pub client_id: Uuid,
    pub client_name: String,
    pub invoice_count: i64,
    pub total: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyTotalsReport {
    #[serde(flatten)]
    pub range: DateRange,
    pub grand_total: Decimal,
    pub rows: Vec<PartyTotal>,
}

fn party_totals(range: DateRange, rows: Vec<(Uuid, String, i64, Decimal)>) -> PartyTotalsReport {
    let amounts: Vec<Decimal> = rows.iter().map(|row| row.3).collect();
    let grand_total = amounts.iter().copied().sum();

    let rows = rows
        .into_iter()
        .zip(percentages(&amounts))
        .map(|((client_id, client_name, invoice_count, total), percentage)| PartyTotal {
            client_id,
            client_name,
            invoice_count,
            total,
            percentage,
        })
        .collect();

    PartyTotalsReport {
        range,
        grand_total,
        rows,
    }
}

async fn fetch_party_totals(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    range: DateRange,
) -> AppResult<Vec<(Uuid, String, i64, Decimal)>> {
    let rows = sqlx::query_as(
        r#"
        SELECT c.id, c.client_name, COUNT(i.id), COALESCE(SUM(i.total), 0)
        FROM invoices i
        JOIN clients c ON c.id = i.client_id
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND i.invoice_date BETWEEN $3 AND $4
        GROUP BY c.id, c.client_name
        ORDER BY 4 DESC, c.client_name
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn sales_by_client(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let rows = fetch_party_totals(&db, user.id, InvoiceType::Sales, range).await?;
    Ok(response::ok("Sales by client fetched successfully.", party_totals(range, rows)))
}

pub async fn purchases_by_supplier(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let rows = fetch_party_totals(&db, user.id, InvoiceType::Purchase, range).await?;
    Ok(response::ok("Purchases by supplier fetched successfully.", party_totals(range, rows)))
}

// Sales by product

#[derive(Debug, Clone, Serialize)]
pub struct ProductSales {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i64,
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSalesReport {
    #[serde(flatten)]
    pub range: DateRange,
    pub total_quantity: i64,
    pub total_amount: Decimal,
    pub rows: Vec<ProductSales>,
}

pub async fn sales_by_product(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;

    // Items without a product are grouped under their description.
    let rows: Vec<(Option<Uuid>, String, i64, Decimal)> = sqlx::query_as(
        r#"
        SELECT ii.product_id,
               COALESCE(p.name, ii.description, 'Unlisted item') AS product_name,
               COALESCE(SUM(ii.qty), 0)::BIGINT,
               COALESCE(SUM(ii.qty * ii.price), 0)
        FROM invoice_items ii
        JOIN invoices i ON i.id = ii.invoice_id
        LEFT JOIN products p ON p.id = ii.product_id
        WHERE i.user_id = $1 AND i.invoice_type = 'sales' AND i.is_deleted = FALSE
          AND i.invoice_date BETWEEN $2 AND $3
        GROUP BY ii.product_id, product_name
        ORDER BY 4 DESC, product_name
        "#,
    )
    .bind(user.id)
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(&db)
    .await?;

    let amounts: Vec<Decimal> = rows.iter().map(|row| round_money(row.3)).collect();
    let report = ProductSalesReport {
        range,
        total_quantity: rows.iter().map(|row| row.2).sum(),
        total_amount: amounts.iter().copied().sum(),
        rows: rows
            .into_iter()
            .zip(amounts.iter().copied().zip(percentages(&amounts)))
            .map(|((product_id, product_name, quantity, _), (amount, percentage))| ProductSales {
                product_id,
                product_name,
                quantity,
                amount,
                percentage,
            })
            .collect(),
    };

    Ok(response::ok("Sales by product fetched successfully.", report))
}

// Sales by date

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Day,
    Month,
}

impl GroupBy {
    pub fn parse(value: Option<&str>) -> AppResult<Self> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("day") => Ok(Self::Day),
            Some("month") => Ok(Self::Month),
            Some(_) => Err(AppError::validation("group_by must be day or month.")),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SalesSeries {
    Daily(Vec<DayTotal>),
    Monthly(Vec<MonthTotal>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesByDate {
    #[serde(flatten)]
    pub range: DateRange,
    pub group_by: &'static str,
    pub total: Decimal,
    pub series: SalesSeries,
}

pub fn sales_series(range: DateRange, group_by: GroupBy, points: &[(NaiveDate, Decimal)]) -> SalesByDate {
    let series = match group_by {
        GroupBy::Day => SalesSeries::Daily(bucket_by_day(range.date_from, range.date_to, points)),
        GroupBy::Month => SalesSeries::Monthly(bucket_by_month(range.date_from, range.date_to, points)),
    };

    SalesByDate {
        range,
        group_by: group_by.as_str(),
        total: points.iter().map(|(_, amount)| *amount).sum(),
        series,
    }
}

async fn invoice_points(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    range: DateRange,
) -> AppResult<Vec<(NaiveDate, Decimal)>> {
    let points = sqlx::query_as(
        r#"
        SELECT invoice_date, total
        FROM invoices
        WHERE user_id = $1 AND invoice_type = $2 AND is_deleted = FALSE
          AND invoice_date BETWEEN $3 AND $4
        ORDER BY invoice_date
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;
    Ok(points)
}

pub async fn sales_by_date(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let group_by = GroupBy::parse(query.group_by.as_deref())?;
    let points = invoice_points(&db, user.id, InvoiceType::Sales, range).await?;
    Ok(response::ok("Sales by date fetched successfully.", sales_series(range, group_by, &points)))
}

// Tax summary

async fn tax_lines(db: &Database, user_id: Uuid, invoice_type: InvoiceType, range: DateRange) -> AppResult<Vec<TaxLine>> {
    let rows: Vec<(Decimal, Decimal, Decimal, bool)> = sqlx::query_as(
        r#"
        SELECT ii.tax_rate, ii.qty * ii.price, ii.tax_amount, i.is_inter_state
        FROM invoice_items ii
        JOIN invoices i ON i.id = ii.invoice_id
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND i.invoice_date BETWEEN $3 AND $4
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(rate, taxable_amount, tax_amount, is_inter_state)| TaxLine {
            rate,
            taxable_amount: round_money(taxable_amount),
            tax_amount,
            is_inter_state,
        })
        .collect())
}

#[derive(Debug, Serialize)]
struct TaxReport {
    #[serde(flatten)]
    range: DateRange,
    #[serde(flatten)]
    summary: tax::TaxSummary,
}

pub async fn tax_summary(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let output = tax_lines(&db, user.id, InvoiceType::Sales, range).await?;
    let input = tax_lines(&db, user.id, InvoiceType::Purchase, range).await?;

    let report = TaxReport {
        range,
        summary: tax::summarize(&output, &input),
    };
    Ok(response::ok("Tax summary fetched successfully.", report))
}

// Aging

/// Payments against `i` made on or before `$3`, exposed as `paid.amount`.
const PAID_AS_OF: &str = r#"
        LEFT JOIN LATERAL (
            SELECT COALESCE(SUM(p.amount), 0) AS amount
            FROM invoice_payments p
            WHERE p.invoice_id = i.id AND p.payment_date <= $3
        ) paid ON TRUE"#;

fn aging_query() -> String {
    format!(
        r#"
        SELECT c.id, c.client_name, i.due_date, i.total - paid.amount
        FROM invoices i
        JOIN clients c ON c.id = i.client_id
        {}
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND i.invoice_date <= $3 AND paid.amount < i.total
        ORDER BY i.due_date
        "#,
        PAID_AS_OF
    )
}

async fn aging_items(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    as_of: NaiveDate,
) -> AppResult<Vec<AgingItem>> {
    let query = aging_query();
    let rows: Vec<(Uuid, String, NaiveDate, Decimal)> = sqlx::query_as(&query)
        .bind(user_id)
        .bind(invoice_type.as_str())
        .bind(as_of)
        .fetch_all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(party_id, party_name, due_date, outstanding)| AgingItem {
            party_id,
            party_name,
            due_date,
            outstanding,
        })
        .collect())
}

pub async fn receivables_aging(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let as_of = query.as_of(today())?;
    refresh_statuses(&db, user.id).await?;
    let items = aging_items(&db, user.id, InvoiceType::Sales, as_of).await?;
    Ok(response::ok("Receivables aging fetched successfully.", aging::bucket(&items, as_of)))
}

pub async fn payables_aging(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let as_of = query.as_of(today())?;
    refresh_statuses(&db, user.id).await?;
    let items = aging_items(&db, user.id, InvoiceType::Purchase, as_of).await?;
    Ok(response::ok("Payables aging fetched successfully.", aging::bucket(&items, as_of)))
}

// Profit and loss

/// Invoice value net of discount and tax.
async fn net_invoice_value(db: &Database, user_id: Uuid, invoice_type: InvoiceType, range: DateRange) -> AppResult<Decimal> {
    let value = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(subtotal - discount), 0)
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
    Ok(value)
}

pub async fn expenses_by_category(db: &Database, user_id: Uuid, range: DateRange) -> AppResult<Vec<(String, Decimal)>> {
    let rows = sqlx::query_as(
        r#"
        SELECT category, COALESCE(SUM(amount), 0)
        FROM user_expenses
        WHERE user_id = $1 AND is_deleted = FALSE AND expense_date BETWEEN $2 AND $3
        GROUP BY category
        ORDER BY 2 DESC, category
        "#,
    )
    .bind(user_id)
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[derive(Debug, Serialize)]
struct ProfitLossReport {
    #[serde(flatten)]
    range: DateRange,
    #[serde(flatten)]
    statement: statements::ProfitAndLoss,
}

pub async fn profit_loss(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;

    let input = ProfitAndLossInput {
        revenue: net_invoice_value(&db, user.id, InvoiceType::Sales, range).await?,
        cost_of_purchases: net_invoice_value(&db, user.id, InvoiceType::Purchase, range).await?,
        expenses_by_category: expenses_by_category(&db, user.id, range).await?,
    };

    let report = ProfitLossReport {
        range,
        statement: statements::profit_and_loss(input),
    };
    Ok(response::ok("Profit and loss fetched successfully.", report))
}

// Cash flow

async fn payment_points(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    range: DateRange,
) -> AppResult<Vec<(NaiveDate, Decimal)>> {
    let points = sqlx::query_as(
        r#"
        SELECT p.payment_date, p.amount
        FROM invoice_payments p
        JOIN invoices i ON i.id = p.invoice_id
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND p.payment_date BETWEEN $3 AND $4
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;
    Ok(points)
}

async fn expense_points(db: &Database, user_id: Uuid, range: DateRange) -> AppResult<Vec<(NaiveDate, Decimal)>> {
    let points = sqlx::query_as(
        r#"
        SELECT expense_date, amount
        FROM user_expenses
        WHERE user_id = $1 AND is_deleted = FALSE AND expense_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user_id)
    .bind(range.date_from)
    .bind(range.date_to)
    .fetch_all(db)
    .await?;
    Ok(points)
}

pub async fn cash_flow(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;

    let input = CashFlowInput {
        from: range.date_from,
        to: range.date_to,
        receipts: payment_points(&db, user.id, InvoiceType::Sales, range).await?,
        supplier_payments: payment_points(&db, user.id, InvoiceType::Purchase, range).await?,
        expense_payments: expense_points(&db, user.id, range).await?,
    };

    Ok(response::ok("Cash flow fetched successfully.", statements::cash_flow(input)))
}

// Balance sheet

async fn payments_until(db: &Database, user_id: Uuid, invoice_type: InvoiceType, as_of: NaiveDate) -> AppResult<Decimal> {
    let total = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(p.amount), 0)
        FROM invoice_payments p
        JOIN invoices i ON i.id = p.invoice_id
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND p.payment_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(invoice_type.as_str())
    .bind(as_of)
    .fetch_one(db)
    .await?;
    Ok(total)
}

/// Billed total and tax of invoices dated on or before `as_of`, plus what of
/// the total was paid on or before `as_of`.
fn position_query() -> String {
    format!(
        r#"
        SELECT COALESCE(SUM(i.total), 0), COALESCE(SUM(i.tax), 0), COALESCE(SUM(paid.amount), 0)
        FROM invoices i
        {}
        WHERE i.user_id = $1 AND i.invoice_type = $2 AND i.is_deleted = FALSE
          AND i.invoice_date <= $3
        "#,
        PAID_AS_OF
    )
}

async fn invoice_position(
    db: &Database,
    user_id: Uuid,
    invoice_type: InvoiceType,
    as_of: NaiveDate,
) -> AppResult<(Decimal, Decimal, Decimal)> {
    let query = position_query();
    let row = sqlx::query_as(&query)
        .bind(user_id)
        .bind(invoice_type.as_str())
        .bind(as_of)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn inventory_value(db: &Database, user_id: Uuid) -> AppResult<Decimal> {
    let value = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(stock_level * COALESCE(cost_price, 0)), 0)
        FROM products
        WHERE user_id = $1 AND is_deleted = FALSE AND is_track_inventory = TRUE
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(value)
}

async fn expenses_until(db: &Database, user_id: Uuid, as_of: NaiveDate) -> AppResult<Decimal> {
    let total = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM user_expenses WHERE user_id = $1 AND is_deleted = FALSE AND expense_date <= $2",
    )
    .bind(user_id)
    .bind(as_of)
    .fetch_one(db)
    .await?;
    Ok(total)
}

pub async fn balance_sheet(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let as_of = query.as_of(today())?;

    let (sales_total, output_tax, sales_paid) = invoice_position(&db, user.id, InvoiceType::Sales, as_of).await?;
    let (purchase_total, input_tax, purchase_paid) =
        invoice_position(&db, user.id, InvoiceType::Purchase, as_of).await?;

    let input = BalanceSheetInput {
        cash_received: payments_until(&db, user.id, InvoiceType::Sales, as_of).await?,
        cash_paid_to_suppliers: payments_until(&db, user.id, InvoiceType::Purchase, as_of).await?,
        cash_paid_for_expenses: expenses_until(&db, user.id, as_of).await?,
        receivables: sales_total - sales_paid,
        inventory_value: inventory_value(&db, user.id).await?,
        payables: purchase_total - purchase_paid,
        output_tax,
        input_tax,
    };

    Ok(response::ok("Balance sheet fetched successfully.", statements::balance_sheet(as_of, input)))
}

// Expense summary

#[derive(Debug, Serialize)]
struct ExpenseSummary {
    #[serde(flatten)]
    range: DateRange,
    total: Decimal,
    categories: Vec<statements::CategoryAmount>,
}

pub async fn expense_summary(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let rows = expenses_by_category(&db, user.id, range).await?;

    let summary = ExpenseSummary {
        range,
        total: rows.iter().map(|(_, amount)| *amount).sum(),
        categories: statements::category_shares(rows),
    };
    Ok(response::ok("Expense summary fetched successfully.", summary))
}

// Inventory valuation

#[derive(Debug, Clone, Serialize)]
pub struct ValuationRow {
    pub product_id: Uuid,
    pub name: String,
    pub item_sku: String,
    pub category_name: Option<String>,
    pub stock_level: i32,
    pub reorder_point: i32,
    pub cost_price: Decimal,
    pub stock_value: Decimal,
    pub is_low_stock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryValuation {
    pub total_value: Decimal,
    pub total_units: i64,
    pub low_stock_count: usize,
    pub products: Vec<ValuationRow>,
}

pub fn valuation(products: &[Product]) -> InventoryValuation {
    let rows: Vec<ValuationRow> = products
        .iter()
        .filter(|product| product.is_track_inventory)
        .map(|product| {
            let cost_price = product.cost_price.unwrap_or(Decimal::ZERO);
            ValuationRow {
                product_id: product.id,
                name: product.name.clone(),
                item_sku: product.item_sku.clone(),
                category_name: product.category_name.clone(),
                stock_level: product.stock_level,
                reorder_point: product.reorder_point,
                cost_price,
                stock_value: round_money(Decimal::from(product.stock_level) * cost_price),
                is_low_stock: product.is_low_stock(),
            }
        })
        .collect();

    InventoryValuation {
        total_value: rows.iter().map(|row| row.stock_value).sum(),
        total_units: rows.iter().map(|row| i64::from(row.stock_level)).sum(),
        low_stock_count: rows.iter().filter(|row| row.is_low_stock).count(),
        products: rows,
    }
}

pub async fn inventory_valuation(State(db): State<Database>, user: CurrentUser) -> AppResult<Response> {
    let query = format!("{} WHERE p.user_id = $1 AND p.is_deleted = FALSE ORDER BY p.name", PRODUCT_SELECT);
    let products = sqlx::query_as::<_, Product>(&query)
        .bind(user.id)
        .fetch_all(&db)
        .await?;

    Ok(response::ok("Inventory valuation fetched successfully.", valuation(&products)))
}

// Monthly chart

#[derive(Debug, Clone, Serialize)]
pub struct ChartMonth {
    pub month: String,
    pub label: String,
    pub sales: Decimal,
    pub purchases: Decimal,
    pub expenses: Decimal,
}

pub fn monthly_chart_rows(
    range: DateRange,
    sales: &[(NaiveDate, Decimal)],
    purchases: &[(NaiveDate, Decimal)],
    expenses: &[(NaiveDate, Decimal)],
) -> Vec<ChartMonth> {
    let sales = bucket_by_month(range.date_from, range.date_to, sales);
    let purchases = bucket_by_month(range.date_from, range.date_to, purchases);
    let expenses = bucket_by_month(range.date_from, range.date_to, expenses);

    sales
        .into_iter()
        .zip(purchases)
        .zip(expenses)
        .map(|((sales, purchases), expenses)| ChartMonth {
            month: sales.month,
            label: sales.label,
            sales: sales.amount,
            purchases: purchases.amount,
            expenses: expenses.amount,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct MonthlyChart {
    #[serde(flatten)]
    range: DateRange,
    months: Vec<ChartMonth>,
}

pub async fn monthly_chart(
    State(db): State<Database>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let range = query.range(today())?;
    let sales = invoice_points(&db, user.id, InvoiceType::Sales, range).await?;
    let purchases = invoice_points(&db, user.id, InvoiceType::Purchase, range).await?;
    let expenses = expense_points(&db, user.id, range).await?;

    let chart = MonthlyChart {
        range,
        months: monthly_chart_rows(range, &sales, &purchases, &expenses),
    };
    Ok(response::ok("Monthly chart fetched successfully.", chart))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
        DateRange {
            date_from: from,
            date_to: to,
        }
    }

    #[test]
    fn aging_and_balance_sheet_count_the_same_payments() {
        for query in [aging_query(), position_query()] {
            assert!(query.contains(PAID_AS_OF));
            assert!(!query.contains("amount_paid"));
        }
        assert!(aging_query().contains("i.total - paid.amount"));
    }

    #[test]
    fn range_defaults_to_year_to_date() {
        let today = date(2026, 10, 18);
        let range = ReportQuery::default().range(today).unwrap();
        assert_eq!(range.date_from, date(2026, 1, 1));
        assert_eq!(range.date_to, today);
    }

    #[test]
    fn range_rejects_inverted_dates() {
        let query = ReportQuery {
            date_from: Some("2026-05-01".to_string()),
            date_to: Some("2026-04-01".to_string()),
            ..ReportQuery::default()
        };
        assert!(query.range(date(2026, 10, 18)).is_err());

        let query = ReportQuery {
            as_of: Some("bad".to_string()),
            ..ReportQuery::default()
        };
        assert!(query.as_of(date(2026, 10, 18)).is_err());
    }

    #[test]
    fn group_by_accepts_day_and_month() {
        assert_eq!(GroupBy::parse(None).unwrap(), GroupBy::Day);
        assert_eq!(GroupBy::parse(Some("Month")).unwrap(), GroupBy::Month);
        assert!(GroupBy::parse(Some("week")).is_err());
    }

    #[test]
    fn party_percentages_cover_the_total() {
        let report = party_totals(
            range(date(2026, 1, 1), date(2026, 3, 31)),
            vec![
                (Uuid::new_v4(), "Acme".to_string(), 3, dec("750.00")),
                (Uuid::new_v4(), "Globex".to_string(), 1, dec("250.00")),
            ],
        );
        assert_eq!(report.grand_total, dec("1000.00"));
        assert_eq!(report.rows[0].percentage, dec("75"));
        assert_eq!(report.rows[1].percentage, dec("25"));
    }

    #[test]
    fn empty_party_report_has_zero_total() {
        let report = party_totals(range(date(2026, 1, 1), date(2026, 1, 31)), Vec::new());
        assert_eq!(report.grand_total, Decimal::ZERO);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn monthly_sales_fill_empty_months() {
        let points = vec![(date(2026, 1, 5), dec("100")), (date(2026, 3, 9), dec("50"))];
        let report = sales_series(range(date(2026, 1, 1), date(2026, 3, 31)), GroupBy::Month, &points);
        assert_eq!(report.total, dec("150"));
        match report.series {
            SalesSeries::Monthly(months) => {
                assert_eq!(months.len(), 3);
                assert_eq!(months[1].amount, Decimal::ZERO);
            }
            SalesSeries::Daily(_) => panic!("expected a monthly series"),
        }
    }

    #[test]
    fn chart_lines_up_the_three_series() {
        let rows = monthly_chart_rows(
            range(date(2026, 1, 1), date(2026, 2, 28)),
            &[(date(2026, 1, 10), dec("500"))],
            &[(date(2026, 2, 1), dec("200"))],
            &[(date(2026, 2, 20), dec("30"))],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sales, dec("500"));
        assert_eq!(rows[1].purchases, dec("200"));
        assert_eq!(rows[1].expenses, dec("30"));
        assert_eq!(rows[1].label, "Feb 2026");
    }

    fn product(tracked: bool, stock: i32, reorder: i32, cost: Option<&str>) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            category_name: Some("hardware".to_string()),
            name: "Widget".to_string(),
            item_sku: "W-1".to_string(),
            description: None,
            unit_of_measurement: None,
            stock_level: stock,
            reorder_point: reorder,
            weight: None,
            selling_price: None,
            cost_price: cost.map(dec),
            profit_margin: None,
            tax: None,
            gst_category: None,
            discount_percentage: None,
            product_image: None,
            final_price: None,
            is_track_inventory: tracked,
            is_inter_state_sale: false,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn valuation_counts_tracked_stock_only() {
        let products = vec![
            product(true, 10, 2, Some("4.50")),
            product(true, 1, 5, None),
            product(false, 100, 0, Some("9.99")),
        ];
        let report = valuation(&products);
        assert_eq!(report.products.len(), 2);
        assert_eq!(report.total_value, dec("45.00"));
        assert_eq!(report.total_units, 11);
        assert_eq!(report.low_stock_count, 1);
    }
}
