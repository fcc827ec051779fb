//! Helpers shared by purchase orders and invoices: numbering inside a
//! transaction and stock movement for tracked products.

use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{is_unique_violation, AppError, AppResult},
    utils::numbering::{base_prefix, next_number, DocumentKind},
};

/// Creation attempts before a numbering collision is reported to the caller.
pub const NUMBERING_ATTEMPTS: usize = 3;

/// Next free number for `kind`, read inside the transaction that inserts it.
pub async fn next_document_number(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: DocumentKind,
    fullname: &str,
    year: i32,
) -> AppResult<String> {
    let base = base_prefix(kind, fullname, year);
    let pattern = format!("{}-%", base.replace('%', "\\%").replace('_', "\\_"));

    let existing: Vec<String> = match kind {
        DocumentKind::PurchaseOrder => {
            sqlx::query_scalar("SELECT order_number FROM purchase_orders WHERE user_id = $1 AND order_number LIKE $2")
                .bind(user_id)
                .bind(&pattern)
                .fetch_all(&mut *conn)
                .await?
        }
        DocumentKind::SalesInvoice | DocumentKind::PurchaseInvoice => {
            sqlx::query_scalar("SELECT invoice_number FROM invoices WHERE user_id = $1 AND invoice_number LIKE $2")
                .bind(user_id)
                .bind(&pattern)
                .fetch_all(&mut *conn)
                .await?
        }
    };

    Ok(next_number(&base, existing.iter().map(String::as_str)))
}

/// True when the error is the unique index on a document number, which means
/// another request took the same number first.
pub fn is_number_collision(err: &AppError) -> bool {
    matches!(err, AppError::Database(db_err) if is_unique_violation(db_err))
}

pub fn numbering_exhausted() -> AppError {
    AppError::Conflict("Could not allocate a document number. Please retry.".to_string())
}

pub async fn begin(db: &Database) -> AppResult<Transaction<'static, Postgres>> {
    Ok(db.begin().await?)
}

/// Stock level after moving by `delta`; it may never drop below zero.
fn shifted_level(name: &str, level: i32, delta: i32) -> AppResult<i32> {
    level
        .checked_add(delta)
        .filter(|level| *level >= 0)
        .ok_or_else(|| AppError::validation(format!("Insufficient stock for {}.", name)))
}

/// Moves stock of a tracked product by `delta`. Untracked products are left
/// alone; a decrement below zero is rejected.
pub async fn move_stock(conn: &mut PgConnection, user_id: Uuid, product_id: Uuid, delta: i32) -> AppResult<()> {
    if delta == 0 {
        return Ok(());
    }

    let row: Option<(String, bool, i32)> = sqlx::query_as(
        "SELECT name, is_track_inventory, stock_level FROM products WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(product_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((name, tracked, level)) = row else {
        return Err(AppError::validation("Product Not Found."));
    };
    if !tracked {
        return Ok(());
    }

    let new_level = shifted_level(&name, level, delta)?;

    sqlx::query("UPDATE products SET stock_level = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_level)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Every product id must be one of the caller's live products.
pub async fn ensure_products_owned(db: &Database, user_id: Uuid, product_ids: &[Uuid]) -> AppResult<()> {
    if product_ids.is_empty() {
        return Ok(());
    }

    let mut unique = product_ids.to_vec();
    unique.sort();
    unique.dedup();

    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND user_id = $2 AND is_deleted = FALSE",
    )
    .bind(&unique)
    .bind(user_id)
    .fetch_one(db)
    .await?;

    if found as usize == unique.len() {
        Ok(())
    } else {
        Err(AppError::validation("Product Not Found."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_a_collision() {
        assert!(!is_number_collision(&AppError::validation("x")));
        assert!(!is_number_collision(&AppError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn stock_moves_stay_non_negative() {
        assert_eq!(shifted_level("Widget", 10, -4).unwrap(), 6);
        assert_eq!(shifted_level("Widget", 4, -4).unwrap(), 0);
        assert_eq!(shifted_level("Widget", 0, 7).unwrap(), 7);

        let err = shifted_level("Widget", 3, -4).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient stock for Widget.");
        assert!(shifted_level("Widget", i32::MAX, 1).is_err());
    }

    #[test]
    fn exhausted_numbering_is_a_conflict() {
        assert_eq!(numbering_exhausted().status(), axum::http::StatusCode::CONFLICT);
    }
}
