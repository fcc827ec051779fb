use axum::{
    extract::{OriginalUri, Query, State},
    response::Response,
};
use axum_extra::extract::Multipart;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{activities::log_activity, auth::{email_in_use, load_user}},
    middleware::{CurrentUser, AUTH_COOKIE},
    models::{Action, Company, CompanyRequest, EntityType, LoginHistory, UpdateUser, User, UserResponse},
    state::AppState,
    utils::{
        media::{read_image_field, save_image},
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{optional_text, require, validate_email},
        ApiJson,
    },
};

pub async fn get_profile(user: CurrentUser) -> AppResult<Response> {
    Ok(response::ok(
        "User profile retrieved successfully.",
        UserResponse::from(user.user),
    ))
}

pub async fn update_profile(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<UpdateUser>,
) -> AppResult<Response> {
    let updated = apply_user_update(&db, &user.user, body).await?;
    Ok(response::ok("User profile updated successfully.", UserResponse::from(updated)))
}

pub async fn delete_profile(
    State(db): State<Database>,
    cookies: Cookies,
    user: CurrentUser,
) -> AppResult<Response> {
    soft_delete_user(&db, user.id).await?;
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
    Ok(response::message("User deleted successfully."))
}

pub async fn upload_profile_image(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let upload = read_image_field(multipart, "profile_image")
        .await?
        .ok_or_else(|| AppError::validation("Please Select Valid Image."))?;

    let path = save_image(&state.config.media_root, "profile_images", upload, "Please Select Valid Image.").await?;

    sqlx::query("UPDATE users SET profile_image = $1, updated_at = NOW() WHERE id = $2")
        .bind(&path)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    let updated = load_user(&state.db, user.id).await?;
    Ok(response::ok("Profile image updated successfully.", UserResponse::from(updated)))
}

/// Shared by the profile and admin user-detail endpoints. Absent fields keep
/// their stored values; a changed email must not belong to another account.
pub async fn apply_user_update(db: &Database, current: &User, body: UpdateUser) -> AppResult<User> {
    let email = match optional_text(body.email) {
        Some(email) => {
            let email = email.to_lowercase();
            validate_email(&email)?;
            if email != current.email.to_lowercase() && email_in_use(db, &email, Some(current.id)).await? {
                return Err(AppError::validation("This Email already exists."));
            }
            email
        }
        None => current.email.clone(),
    };

    let fullname = match &body.fullname {
        Some(_) => require(&body.fullname, "Fullname is required.")?.to_string(),
        None => current.fullname.clone(),
    };

    sqlx::query(
        r#"
        UPDATE users
        SET fullname = $1, email = $2, country_code = $3, phone_number = $4,
            date_of_birth = $5, address = $6, work_address = $7, is_active = $8,
            updated_at = NOW()
        WHERE id = $9
        "#,
    )
    .bind(fullname)
    .bind(email)
    .bind(optional_text(body.country_code).or_else(|| current.country_code.clone()))
    .bind(optional_text(body.phone_number).or_else(|| current.phone_number.clone()))
    .bind(body.date_of_birth.or(current.date_of_birth))
    .bind(optional_text(body.address).or_else(|| current.address.clone()))
    .bind(optional_text(body.work_address).or_else(|| current.work_address.clone()))
    .bind(body.is_active.unwrap_or(current.is_active))
    .bind(current.id)
    .execute(db)
    .await?;

    load_user(db, current.id).await
}

pub async fn soft_delete_user(db: &Database, user_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE users SET is_deleted = TRUE, is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    log::info!("soft deleted user {}", user_id);
    Ok(())
}

pub async fn get_company(State(db): State<Database>, user: CurrentUser) -> AppResult<Response> {
    let company = find_company(&db, user.id).await?;
    Ok(response::ok("Company details retrieved successfully.", company))
}

/// Creates the company profile on first save, updates it afterwards.
pub async fn upsert_company(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CompanyRequest>,
) -> AppResult<Response> {
    let existing = find_company(&db, user.id).await?;

    let company_name = match (&body.company_name, &existing) {
        (None, Some(company)) => company.company_name.clone(),
        _ => require(&body.company_name, "Company Name is required.")?.to_string(),
    };

    if let Some(email) = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        validate_email(email)?;
    }

    let keep = |value: Option<String>, current: Option<&String>| {
        optional_text(value).or_else(|| current.cloned())
    };
    let current = existing.as_ref();

    let company = sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO user_companies (user_id, company_name, gst_number, pan_number, address, city,
                                    state, country, zip_code, phone_number, email, website)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (user_id) DO UPDATE SET
            company_name = EXCLUDED.company_name,
            gst_number = EXCLUDED.gst_number,
            pan_number = EXCLUDED.pan_number,
            address = EXCLUDED.address,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            country = EXCLUDED.country,
            zip_code = EXCLUDED.zip_code,
            phone_number = EXCLUDED.phone_number,
            email = EXCLUDED.email,
            website = EXCLUDED.website,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(company_name)
    .bind(keep(body.gst_number, current.and_then(|c| c.gst_number.as_ref())))
    .bind(keep(body.pan_number, current.and_then(|c| c.pan_number.as_ref())))
    .bind(keep(body.address, current.and_then(|c| c.address.as_ref())))
    .bind(keep(body.city, current.and_then(|c| c.city.as_ref())))
    .bind(keep(body.state, current.and_then(|c| c.state.as_ref())))
    .bind(keep(body.country, current.and_then(|c| c.country.as_ref())))
    .bind(keep(body.zip_code, current.and_then(|c| c.zip_code.as_ref())))
    .bind(keep(body.phone_number, current.and_then(|c| c.phone_number.as_ref())))
    .bind(keep(body.email, current.and_then(|c| c.email.as_ref())))
    .bind(keep(body.website, current.and_then(|c| c.website.as_ref())))
    .fetch_one(&db)
    .await?;

    let action = if existing.is_some() { Action::Updated } else { Action::Created };
    log_activity(
        &db,
        user.id,
        action,
        EntityType::Company,
        Some(company.id),
        format!("Company profile {}", company.company_name),
    )
    .await;

    Ok(response::ok("Company details saved successfully.", company))
}

async fn find_company(db: &Database, user_id: Uuid) -> AppResult<Option<Company>> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM user_companies WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(company)
}

pub async fn login_history(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(page): Query<PageQuery>,
) -> AppResult<Paginated<LoginHistory>> {
    let request = PageRequest::from_query(&page)?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_login_history WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&db)
        .await?;

    request.ensure_in_range(total)?;

    let entries = sqlx::query_as::<_, LoginHistory>(
        r#"
        SELECT id, ip_address, user_agent, logged_in_at
        FROM user_login_history
        WHERE user_id = $1
        ORDER BY logged_in_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.id)
    .bind(request.limit())
    .bind(request.offset())
    .fetch_all(&db)
    .await?;

    Ok(Paginated::new(entries, total, request, uri))
}
