use axum::extract::{OriginalUri, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppResult,
    middleware::CurrentUser,
    models::{Action, ActivityLog, EntityType},
    utils::{
        pagination::{PageQuery, PageRequest, Paginated},
        validation::optional_text,
    },
};

/// Appends to the audit trail. A failed write is logged and otherwise ignored
/// so it never undoes the change it describes.
pub async fn log_activity(
    db: &Database,
    user_id: Uuid,
    action: Action,
    entity_type: EntityType,
    entity_id: Option<Uuid>,
    description: impl Into<String>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO activity_logs (user_id, action, entity_type, entity_id, description)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(action.as_str())
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(description.into())
    .execute(db)
    .await;

    if let Err(e) = result {
        log::warn!(
            "failed to record {} {} activity for user {}: {}",
            entity_type.as_str(),
            action.as_str(),
            user_id,
            e
        );
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivityFilters {
    entity_type: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

pub async fn activity_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<ActivityFilters>,
) -> AppResult<Paginated<ActivityLog>> {
    let request = PageRequest::from_query(&filters.page)?;
    let entity_type = optional_text(filters.entity_type).map(|value| value.to_lowercase());

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM activity_logs
        WHERE user_id = $1 AND ($2::text IS NULL OR entity_type = $2)
        "#,
    )
    .bind(user.id)
    .bind(&entity_type)
    .fetch_one(&db)
    .await?;

    request.ensure_in_range(total)?;

    let entries = sqlx::query_as::<_, ActivityLog>(
        r#"
        SELECT id, action, entity_type, entity_id, description, created_at
        FROM activity_logs
        WHERE user_id = $1 AND ($2::text IS NULL OR entity_type = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user.id)
    .bind(&entity_type)
    .bind(request.limit())
    .bind(request.offset())
    .fetch_all(&db)
    .await?;

    Ok(Paginated::new(entries, total, request, uri))
}
