use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::activities::log_activity,
    middleware::CurrentUser,
    models::{Action, EntityType, Expense, ExpenseRequest, MAX_AMOUNT},
    reporting::round_money,
    utils::{
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{optional_text, parse_date_param, require},
        ApiJson,
    },
};

const EXPENSE_COLUMNS: &str =
    "id, user_id, category, amount, expense_date, description, payment_method, reference, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ExpenseFilters {
    category: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

struct ExpenseScope {
    user_id: Uuid,
    category: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

impl ExpenseScope {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE user_id = ");
        builder.push_bind(self.user_id);
        builder.push(" AND is_deleted = FALSE");

        if let Some(category) = &self.category {
            builder.push(" AND LOWER(category) = LOWER(");
            builder.push_bind(category.clone());
            builder.push(")");
        }
        if let Some(date_from) = self.date_from {
            builder.push(" AND expense_date >= ");
            builder.push_bind(date_from);
        }
        if let Some(date_to) = self.date_to {
            builder.push(" AND expense_date <= ");
            builder.push_bind(date_to);
        }
    }
}

pub async fn expenses_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<ExpenseFilters>,
) -> AppResult<Paginated<Expense>> {
    let request = PageRequest::from_query(&filters.page)?;
    let scope = ExpenseScope {
        user_id: user.id,
        date_from: parse_date_param(filters.date_from.as_deref(), "date_from")?,
        date_to: parse_date_param(filters.date_to.as_deref(), "date_to")?,
        category: optional_text(filters.category),
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM user_expenses");
    scope.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM user_expenses", EXPENSE_COLUMNS));
    scope.push_where(&mut rows);
    rows.push(" ORDER BY expense_date DESC, created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let expenses = rows.build_query_as::<Expense>().fetch_all(&db).await?;

    Ok(Paginated::new(expenses, total, request, uri))
}

fn positive_amount(amount: Option<Decimal>) -> AppResult<Decimal> {
    let amount = amount.ok_or_else(|| AppError::validation("Amount is required."))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be greater than zero."));
    }
    let amount = round_money(amount);
    if amount > MAX_AMOUNT {
        return Err(AppError::validation("Amount is too large."));
    }
    Ok(amount)
}

pub async fn add_expense(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ExpenseRequest>,
) -> AppResult<Response> {
    let category = require(&body.category, "Category is required.")?.to_string();
    let amount = positive_amount(body.amount)?;
    let expense_date = body
        .expense_date
        .ok_or_else(|| AppError::validation("Expense date is required."))?;

    let expense = sqlx::query_as::<_, Expense>(&format!(
        r#"
        INSERT INTO user_expenses (user_id, category, amount, expense_date, description,
                                   payment_method, reference)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        EXPENSE_COLUMNS
    ))
    .bind(user.id)
    .bind(&category)
    .bind(amount)
    .bind(expense_date)
    .bind(optional_text(body.description))
    .bind(optional_text(body.payment_method))
    .bind(optional_text(body.reference))
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Created,
        EntityType::Expense,
        Some(expense.id),
        format!("Added {} expense of {}", expense.category, expense.amount),
    )
    .await;

    Ok(response::created("Expense added successfully.", expense))
}

async fn find_expense(db: &Database, user_id: Uuid, expense_id: Uuid) -> AppResult<Expense> {
    sqlx::query_as::<_, Expense>(&format!(
        "SELECT {} FROM user_expenses WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
        EXPENSE_COLUMNS
    ))
    .bind(expense_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Expense not found."))
}

pub async fn expense_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<Response> {
    let expense = find_expense(&db, user.id, expense_id).await?;
    Ok(response::ok("Expense fetched successfully.", expense))
}

pub async fn update_expense(
    State(db): State<Database>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
    ApiJson(body): ApiJson<ExpenseRequest>,
) -> AppResult<Response> {
    let current = find_expense(&db, user.id, expense_id).await?;

    let category = match &body.category {
        Some(_) => require(&body.category, "Category is required.")?.to_string(),
        None => current.category.clone(),
    };
    let amount = match body.amount {
        Some(_) => positive_amount(body.amount)?,
        None => current.amount,
    };

    let expense = sqlx::query_as::<_, Expense>(&format!(
        r#"
        UPDATE user_expenses
        SET category = $1, amount = $2, expense_date = $3, description = $4,
            payment_method = $5, reference = $6, updated_at = NOW()
        WHERE id = $7
        RETURNING {}
        "#,
        EXPENSE_COLUMNS
    ))
    .bind(category)
    .bind(amount)
    .bind(body.expense_date.unwrap_or(current.expense_date))
    .bind(optional_text(body.description).or(current.description))
    .bind(optional_text(body.payment_method).or(current.payment_method))
    .bind(optional_text(body.reference).or(current.reference))
    .bind(current.id)
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::Expense,
        Some(expense.id),
        format!("Updated {} expense", expense.category),
    )
    .await;

    Ok(response::ok("Expense updated successfully.", expense))
}

pub async fn delete_expense(
    State(db): State<Database>,
    user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<Response> {
    let expense = find_expense(&db, user.id, expense_id).await?;

    sqlx::query("UPDATE user_expenses SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(expense.id)
        .execute(&db)
        .await?;

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::Expense,
        Some(expense.id),
        format!("Deleted {} expense of {}", expense.category, expense.amount),
    )
    .await;

    Ok(response::message("Expense deleted successfully."))
}

pub async fn expense_categories(State(db): State<Database>, user: CurrentUser) -> AppResult<Response> {
    let categories: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT category
        FROM user_expenses
        WHERE user_id = $1 AND is_deleted = FALSE
        ORDER BY category
        "#,
    )
    .bind(user.id)
    .fetch_all(&db)
    .await?;

    Ok(response::ok("Expense categories fetched successfully.", categories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn amount_must_be_positive() {
        assert!(positive_amount(None).is_err());
        assert!(positive_amount(Some(Decimal::ZERO)).is_err());
        assert!(positive_amount(Some(Decimal::from(-5))).is_err());
        assert_eq!(
            positive_amount(Some(Decimal::from_str("12.346").unwrap())).unwrap(),
            Decimal::from_str("12.35").unwrap()
        );
    }

    #[test]
    fn amount_must_fit_the_ledger() {
        assert_eq!(positive_amount(Some(MAX_AMOUNT)).unwrap(), MAX_AMOUNT);
        let err = positive_amount(Some(Decimal::from(10_000_000_000i64))).unwrap_err();
        assert_eq!(err.to_string(), "Amount is too large.");
    }
}
