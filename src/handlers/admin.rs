use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{
        auth::load_user,
        profile::{apply_user_update, soft_delete_user},
    },
    middleware::AdminUser,
    models::{AdminUserListItem, UpdateUser, User, UserResponse},
    utils::{
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{like_pattern, optional_text},
        ApiJson,
    },
};

#[derive(Debug, Deserialize)]
pub struct UserFilters {
    search: Option<String>,
    active: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, search: &Option<String>, active_only: bool) {
    builder.push(" WHERE is_admin = FALSE AND is_deleted = FALSE");
    if let Some(search) = search {
        let pattern = like_pattern(search);
        builder.push(" AND (email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR fullname ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
    if active_only {
        builder.push(" AND is_active = TRUE");
    }
}

pub async fn users_list(
    State(db): State<Database>,
    AdminUser(_admin): AdminUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<UserFilters>,
) -> AppResult<Paginated<AdminUserListItem>> {
    let request = PageRequest::from_query(&filters.page)?;
    let search = optional_text(filters.search);
    let active_only = filters.active.as_deref() == Some("true");

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_user_filters(&mut count, &search, active_only);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new(
        "SELECT id, fullname, email, phone_number, is_active, is_email_verified, created_at FROM users",
    );
    push_user_filters(&mut rows, &search, active_only);
    rows.push(" ORDER BY created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let users = rows
        .build_query_as::<AdminUserListItem>()
        .fetch_all(&db)
        .await?;

    Ok(Paginated::new(users, total, request, uri))
}

async fn managed_user(db: &Database, user_id: Uuid) -> AppResult<User> {
    let user = load_user(db, user_id).await?;
    if user.is_admin {
        return Err(AppError::not_found("User not found"));
    }
    Ok(user)
}

pub async fn user_detail(
    State(db): State<Database>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Response> {
    let user = managed_user(&db, user_id).await?;
    Ok(response::ok("User retrieved successfully.", UserResponse::from(user)))
}

pub async fn update_user(
    State(db): State<Database>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ApiJson(body): ApiJson<UpdateUser>,
) -> AppResult<Response> {
    let user = managed_user(&db, user_id).await?;
    let updated = apply_user_update(&db, &user, body).await?;
    log::info!("admin {} updated user {}", admin.id, user_id);
    Ok(response::ok("User updated successfully.", UserResponse::from(updated)))
}

pub async fn delete_user(
    State(db): State<Database>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Response> {
    let user = managed_user(&db, user_id).await?;
    soft_delete_user(&db, user.id).await?;
    log::info!("admin {} deleted user {}", admin.id, user_id);
    Ok(response::message("User deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_search_skips_admins_and_deleted_accounts() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM users");
        push_user_filters(&mut builder, &Some("j_doe".to_string()), true);
        assert_eq!(
            builder.sql(),
            "SELECT id FROM users WHERE is_admin = FALSE AND is_deleted = FALSE \
             AND (email ILIKE $1 ESCAPE '\\' OR fullname ILIKE $2 ESCAPE '\\') AND is_active = TRUE"
        );
    }
}
