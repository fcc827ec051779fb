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
    handlers::activities::log_activity,
    middleware::CurrentUser,
    models::{payment_term_days, Action, Client, ClientListItem, ClientRequest, ClientType, EntityType},
    utils::{
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{like_pattern, optional_text, require, validate_email},
        ApiJson,
    },
};

#[derive(Debug, Deserialize)]
pub struct ClientFilters {
    search: Option<String>,
    user_type: Option<String>,
    is_favorite: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

struct ClientScope {
    user_id: Uuid,
    search: Option<String>,
    user_type: Option<ClientType>,
    favorites_only: bool,
}

impl ClientScope {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE user_id = ");
        builder.push_bind(self.user_id);
        builder.push(" AND is_deleted = FALSE");

        if let Some(search) = &self.search {
            let pattern = like_pattern(search);
            builder.push(" AND (client_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR phone_number ILIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }
        if let Some(user_type) = self.user_type {
            builder.push(" AND user_type = ");
            builder.push_bind(user_type.as_str());
        }
        if self.favorites_only {
            builder.push(" AND is_favorite = TRUE");
        }
    }
}

pub async fn clients_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<ClientFilters>,
) -> AppResult<Paginated<ClientListItem>> {
    let request = PageRequest::from_query(&filters.page)?;

    let user_type = match optional_text(filters.user_type) {
        Some(raw) => Some(
            ClientType::parse(&raw).ok_or_else(|| AppError::validation("User type must be client or supplier."))?,
        ),
        None => None,
    };
    let scope = ClientScope {
        user_id: user.id,
        search: optional_text(filters.search),
        user_type,
        favorites_only: filters.is_favorite.as_deref() == Some("true"),
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clients");
    scope.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new("SELECT * FROM clients");
    scope.push_where(&mut rows);
    rows.push(" ORDER BY created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let clients = rows.build_query_as::<Client>().fetch_all(&db).await?;
    let results = clients.into_iter().map(ClientListItem::from).collect();

    Ok(Paginated::new(results, total, request, uri))
}

pub async fn create_client(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ClientRequest>,
) -> AppResult<Response> {
    let client_name = require(&body.client_name, "Client Name is required.")?.to_string();
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let phone_number = require(&body.phone_number, "Phone Number is required.")?.to_string();
    validate_email(&email)?;

    let user_type = match optional_text(body.user_type.clone()) {
        Some(raw) => ClientType::parse(&raw)
            .ok_or_else(|| AppError::validation("User type must be client or supplier."))?,
        None => ClientType::Client,
    };
    if body.credit_limit.map_or(false, |limit| limit.is_sign_negative()) {
        return Err(AppError::validation("Credit limit cannot be negative."));
    }
    payment_term_days(body.payment_term.as_deref())?;

    let client = sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (user_id, client_name, contact_person, phone_number, email,
                             billing_address, shipping_address, city, state, country, zip_code,
                             tax_number, gst_type, pan_number, payment_term, credit_limit,
                             preferred_payment_method, bank_details, notes, category, user_type,
                             is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&client_name)
    .bind(optional_text(body.contact_person))
    .bind(&phone_number)
    .bind(&email)
    .bind(optional_text(body.billing_address))
    .bind(optional_text(body.shipping_address))
    .bind(optional_text(body.city))
    .bind(optional_text(body.state))
    .bind(optional_text(body.country))
    .bind(optional_text(body.zip_code))
    .bind(optional_text(body.tax_number))
    .bind(optional_text(body.gst_type))
    .bind(optional_text(body.pan_number))
    .bind(optional_text(body.payment_term))
    .bind(body.credit_limit)
    .bind(optional_text(body.preferred_payment_method))
    .bind(optional_text(body.bank_details))
    .bind(optional_text(body.notes))
    .bind(optional_text(body.category))
    .bind(user_type.as_str())
    .bind(body.is_active.unwrap_or(true))
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Created,
        EntityType::Client,
        Some(client.id),
        format!("Added {} {}", client.user_type, client.client_name),
    )
    .await;

    Ok(response::created("Client added successfully.", client))
}

/// Loads one of the caller's clients, hiding other tenants' rows behind a 404.
pub async fn find_client(db: &Database, user_id: Uuid, client_id: Uuid) -> AppResult<Client> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE")
        .bind(client_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Client not found."))
}

pub async fn client_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Response> {
    let client = find_client(&db, user.id, client_id).await?;
    Ok(response::ok("Client fetched successfully.", client))
}

pub async fn update_client(
    State(db): State<Database>,
    user: CurrentUser,
    Path(client_id): Path<Uuid>,
    ApiJson(body): ApiJson<ClientRequest>,
) -> AppResult<Response> {
    let current = find_client(&db, user.id, client_id).await?;

    let client_name = match &body.client_name {
        Some(_) => require(&body.client_name, "Client Name is required.")?.to_string(),
        None => current.client_name.clone(),
    };
    let email = match &body.email {
        Some(_) => {
            let email = require(&body.email, "Email is required.")?.to_lowercase();
            validate_email(&email)?;
            email
        }
        None => current.email.clone(),
    };
    let phone_number = match &body.phone_number {
        Some(_) => require(&body.phone_number, "Phone Number is required.")?.to_string(),
        None => current.phone_number.clone(),
    };
    let user_type = match optional_text(body.user_type.clone()) {
        Some(raw) => ClientType::parse(&raw)
            .ok_or_else(|| AppError::validation("User type must be client or supplier."))?
            .as_str()
            .to_string(),
        None => current.user_type.clone(),
    };
    if body.credit_limit.map_or(false, |limit| limit.is_sign_negative()) {
        return Err(AppError::validation("Credit limit cannot be negative."));
    }
    payment_term_days(body.payment_term.as_deref())?;

    let keep = |value: Option<String>, stored: &Option<String>| optional_text(value).or_else(|| stored.clone());

    let client = sqlx::query_as::<_, Client>(
        r#"
        UPDATE clients
        SET client_name = $1, contact_person = $2, phone_number = $3, email = $4,
            billing_address = $5, shipping_address = $6, city = $7, state = $8, country = $9,
            zip_code = $10, tax_number = $11, gst_type = $12, pan_number = $13,
            payment_term = $14, credit_limit = $15, preferred_payment_method = $16,
            bank_details = $17, notes = $18, category = $19, user_type = $20, is_active = $21,
            updated_at = NOW()
        WHERE id = $22 AND user_id = $23
        RETURNING *
        "#,
    )
    .bind(client_name)
    .bind(keep(body.contact_person, &current.contact_person))
    .bind(phone_number)
    .bind(email)
    .bind(keep(body.billing_address, &current.billing_address))
    .bind(keep(body.shipping_address, &current.shipping_address))
    .bind(keep(body.city, &current.city))
    .bind(keep(body.state, &current.state))
    .bind(keep(body.country, &current.country))
    .bind(keep(body.zip_code, &current.zip_code))
    .bind(keep(body.tax_number, &current.tax_number))
    .bind(keep(body.gst_type, &current.gst_type))
    .bind(keep(body.pan_number, &current.pan_number))
    .bind(keep(body.payment_term, &current.payment_term))
    .bind(body.credit_limit.or(current.credit_limit))
    .bind(keep(body.preferred_payment_method, &current.preferred_payment_method))
    .bind(keep(body.bank_details, &current.bank_details))
    .bind(keep(body.notes, &current.notes))
    .bind(keep(body.category, &current.category))
    .bind(user_type)
    .bind(body.is_active.unwrap_or(current.is_active))
    .bind(client_id)
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::Client,
        Some(client.id),
        format!("Updated {}", client.client_name),
    )
    .await;

    Ok(response::ok("Client updated successfully.", client))
}

pub async fn delete_client(
    State(db): State<Database>,
    user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Response> {
    let client = find_client(&db, user.id, client_id).await?;

    sqlx::query("UPDATE clients SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(client.id)
        .execute(&db)
        .await?;

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::Client,
        Some(client.id),
        format!("Deleted {}", client.client_name),
    )
    .await;

    Ok(response::message("Client deleted successfully."))
}

pub async fn toggle_favorite(
    State(db): State<Database>,
    user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Response> {
    let client = find_client(&db, user.id, client_id).await?;

    let client = sqlx::query_as::<_, Client>(
        "UPDATE clients SET is_favorite = NOT is_favorite, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(client.id)
    .fetch_one(&db)
    .await?;

    let message = if client.is_favorite {
        "Client added to favorites."
    } else {
        "Client removed from favorites."
    };

    Ok(response::ok(message, ClientListItem::from(client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_clause(scope: &ClientScope) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM clients");
        scope.push_where(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn deleted_clients_are_always_excluded() {
        let scope = ClientScope {
            user_id: Uuid::new_v4(),
            search: None,
            user_type: None,
            favorites_only: false,
        };
        let sql = where_clause(&scope);
        assert_eq!(sql, "SELECT * FROM clients WHERE user_id = $1 AND is_deleted = FALSE");
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let scope = ClientScope {
            user_id: Uuid::new_v4(),
            search: Some("100%".to_string()),
            user_type: Some(ClientType::Supplier),
            favorites_only: true,
        };
        let sql = where_clause(&scope);
        assert!(sql.contains("client_name ILIKE $2 ESCAPE '\\' OR email ILIKE $3 ESCAPE '\\'"));
        assert!(sql.contains("phone_number ILIKE $4 ESCAPE '\\')"));
        assert!(sql.contains("AND user_type = $5"));
        assert!(sql.ends_with("AND is_favorite = TRUE"));
    }
}
