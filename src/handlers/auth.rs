use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap},
    response::Response,
};
use chrono::{Duration, Utc};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    middleware::{CurrentUser, AUTH_COOKIE},
    models::{
        AuthResponse, ChangePasswordRequest, LoginRequest, Otp, OtpResponse, RegisterRequest,
        ResetPasswordRequest, Role, SendOtpRequest, User, VerifyOtpRequest,
        ADMIN_ROLE, CUSTOMER_ROLE, USER_SELECT,
    },
    state::AppState,
    utils::{
        create_token, hash_password,
        otp::{check_otp, generate_otp, otp_code_visible, OtpCheck, OtpType},
        password::is_long_enough,
        response,
        validation::{optional_text, require, validate_email},
        verify_password, ApiJson,
    },
};

pub async fn role_list(State(db): State<Database>) -> AppResult<Response> {
    let roles = sqlx::query_as::<_, Role>(
        "SELECT id, role_name, is_active FROM roles WHERE role_name <> $1 AND is_active = TRUE ORDER BY role_name",
    )
    .bind(ADMIN_ROLE)
    .fetch_all(&db)
    .await?;

    Ok(response::ok("Roles retrieved successfully.", roles))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let auth = register_account(&state, body, CUSTOMER_ROLE).await?;
    Ok(response::ok("User registered successfully.", auth))
}

pub async fn admin_register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let auth = register_account(&state, body, ADMIN_ROLE).await?;
    Ok(response::ok("Admin registered successfully.", auth))
}

/// Required fields of a registration, checked before any query runs.
#[derive(Debug)]
struct Registration<'a> {
    fullname: &'a str,
    email: String,
    phone_number: Option<&'a str>,
    password: &'a str,
}

/// Customer accounts must carry a phone number; admin accounts may omit it.
fn validate_registration(body: &RegisterRequest, phone_required: bool) -> AppResult<Registration<'_>> {
    let fullname = require(&body.fullname, "Fullname is required.")?;
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let phone_number = if phone_required {
        Some(require(&body.phone_number, "Phone number is required.")?)
    } else {
        body.phone_number.as_deref().map(str::trim).filter(|phone| !phone.is_empty())
    };
    let password = require(&body.password, "Password is required.")?;

    if !is_long_enough(password) {
        return Err(AppError::validation("Password must be at least 8 characters long."));
    }
    if body.confirm_password.as_deref() != Some(password) {
        return Err(AppError::validation("Passwords do not match."));
    }
    validate_email(&email)?;

    Ok(Registration {
        fullname,
        email,
        phone_number,
        password,
    })
}

async fn register_account(state: &AppState, body: RegisterRequest, role_name: &str) -> AppResult<AuthResponse> {
    let is_admin = role_name == ADMIN_ROLE;
    let Registration {
        fullname,
        email,
        phone_number,
        password,
    } = validate_registration(&body, !is_admin)?;

    if email_in_use(&state.db, &email, None).await? {
        return Err(AppError::validation("Email already exists."));
    }

    let password_hash = hash_password(password).await?;

    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (role_id, fullname, email, password_hash, country_code, phone_number,
                           date_of_birth, address, work_address, is_admin)
        VALUES ((SELECT id FROM roles WHERE role_name = $1), $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(role_name)
    .bind(fullname)
    .bind(&email)
    .bind(&password_hash)
    .bind(optional_text(body.country_code.clone()))
    .bind(phone_number)
    .bind(body.date_of_birth)
    .bind(optional_text(body.address.clone()))
    .bind(optional_text(body.work_address.clone()))
    .bind(is_admin)
    .fetch_one(&state.db)
    .await?;

    let user = load_user(&state.db, user_id).await?;
    log::info!("registered {} account {}", role_name, user.id);

    issue_token(state, user)
}

fn issue_token(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = create_token(
        user.id,
        user.email.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let password = require(&body.password, "Password is required.")?;

    let query = format!(
        "{} WHERE lower(u.email) = $1 AND u.is_admin = $2 AND u.is_active = TRUE AND u.is_deleted = FALSE",
        USER_SELECT
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(&email)
        .bind(body.is_admin)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found."))?;

    if !verify_password(password, &user.password_hash).await? {
        return Err(AppError::unauthorized("Invalid password."));
    }

    record_login(&state.db, user.id, &headers).await;

    let auth = issue_token(&state, user)?;

    let cookie = Cookie::build((AUTH_COOKIE, auth.token.clone()))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(state.config.jwt_expiry_hours))
        .build();
    cookies.add(cookie);

    Ok(response::ok("User logged in successfully.", auth))
}

/// Login history is informational; a failed insert does not block the login.
async fn record_login(db: &Database, user_id: Uuid, headers: &HeaderMap) {
    let ip_address = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let result = sqlx::query(
        "INSERT INTO user_login_history (user_id, ip_address, user_agent) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(ip_address)
    .bind(user_agent)
    .execute(db)
    .await;

    if let Err(e) = result {
        log::warn!("failed to record login for {}: {}", user_id, e);
    }
}

pub async fn logout(cookies: Cookies) -> Response {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
    response::message("User logged out successfully.")
}

pub async fn change_password(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> AppResult<Response> {
    let old_password = require(&body.old_password, "Old password is required.")?;
    let new_password = require(&body.new_password, "New password is required.")?;
    let confirm_password = require(&body.confirm_password, "Confirm password is required.")?;

    if !is_long_enough(new_password) {
        return Err(AppError::validation("New password should be at least 8 characters long."));
    }
    if new_password != confirm_password {
        return Err(AppError::validation("Confirm password does not match."));
    }
    if !verify_password(old_password, &user.user.password_hash).await? {
        return Err(AppError::validation("Old password is incorrect."));
    }
    if verify_password(new_password, &user.user.password_hash).await? {
        return Err(AppError::validation("New password should not be the same as the old password."));
    }

    set_password(&db, user.id, new_password).await?;
    log::info!("password changed for {}", user.email);

    Ok(response::message("Password changed successfully."))
}

pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendOtpRequest>,
) -> AppResult<Response> {
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let otp_type = parse_otp_type(&body.otp_type)?;

    let user = find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::validation("User With This Email Not Exist."))?;

    if otp_type == OtpType::VerifyEmail && user.is_email_verified {
        return Err(AppError::validation("Email is already verified."));
    }

    let expiry_time = Utc::now() + Duration::minutes(state.config.otp_expiry_minutes);
    let otp = sqlx::query_as::<_, Otp>(
        r#"
        INSERT INTO otps (email, otp, otp_type, expiry_time)
        VALUES ($1, $2, $3, $4)
        RETURNING id, email, otp, otp_type, expiry_time, is_verified, created_at
        "#,
    )
    .bind(&email)
    .bind(generate_otp())
    .bind(otp_type.as_str())
    .bind(expiry_time)
    .fetch_one(&state.db)
    .await?;

    log::info!("issued {} code for {}", otp.otp_type, otp.email);
    log::debug!("{} code for {}: {}", otp.otp_type, otp.email, otp.otp);

    let show_code = otp_code_visible(otp_type, state.config.expose_otp_codes);
    Ok(response::ok("OTP Created successfully.", OtpResponse::new(otp, show_code)))
}

pub async fn verify_otp(
    State(db): State<Database>,
    ApiJson(body): ApiJson<VerifyOtpRequest>,
) -> AppResult<Response> {
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let otp_code = require(&body.otp_code, "OTP is required.")?;
    let otp_type = parse_otp_type(&body.otp_type)?;

    let user = find_user_by_email(&db, &email)
        .await?
        .ok_or_else(|| AppError::validation("User With This Email Not Exist."))?;

    let otp = consume_otp(&db, &email, otp_code, otp_type).await?;

    if otp_type == OtpType::VerifyEmail {
        sqlx::query("UPDATE users SET is_email_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&db)
            .await?;
    }

    Ok(response::ok("OTP verified successfully.", OtpResponse::new(otp, false)))
}

pub async fn reset_password(
    State(db): State<Database>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<Response> {
    let email = require(&body.email, "Email is required.")?.to_lowercase();
    let otp_code = require(&body.otp_code, "OTP is required.")?;
    let new_password = require(&body.new_password, "New password is required.")?;
    let confirm_password = require(&body.confirm_password, "Confirm password is required.")?;

    if !is_long_enough(new_password) {
        return Err(AppError::validation("New password should be at least 8 characters long."));
    }
    if new_password != confirm_password {
        return Err(AppError::validation("Confirm password does not match."));
    }

    let user = find_user_by_email(&db, &email)
        .await?
        .ok_or_else(|| AppError::validation("User With This Email Not Exist."))?;

    consume_otp(&db, &email, otp_code, OtpType::ResetPassword).await?;
    set_password(&db, user.id, new_password).await?;

    Ok(response::message("Password reset successfully."))
}

fn parse_otp_type(value: &Option<String>) -> AppResult<OtpType> {
    let raw = require(value, "OTP Type is required.")?;
    OtpType::parse(raw).ok_or_else(|| AppError::validation("Invalid OTP Type."))
}

/// Checks the newest unused code of this type and marks it verified.
async fn consume_otp(db: &Database, email: &str, supplied: &str, otp_type: OtpType) -> AppResult<Otp> {
    let otp = sqlx::query_as::<_, Otp>(
        r#"
        SELECT id, email, otp, otp_type, expiry_time, is_verified, created_at
        FROM otps
        WHERE email = $1 AND otp_type = $2 AND is_verified = FALSE
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(email)
    .bind(otp_type.as_str())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::validation("Invalid OTP."))?;

    match check_otp(&otp.otp, supplied, otp.expiry_time, Utc::now()) {
        OtpCheck::Mismatch => return Err(AppError::validation("Invalid OTP.")),
        OtpCheck::Expired => return Err(AppError::validation("OTP has expired.")),
        OtpCheck::Valid => {}
    }

    // A concurrent request may have used the same code since the read above.
    sqlx::query_as::<_, Otp>(
        r#"
        UPDATE otps SET is_verified = TRUE WHERE id = $1 AND is_verified = FALSE
        RETURNING id, email, otp, otp_type, expiry_time, is_verified, created_at
        "#,
    )
    .bind(otp.id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::validation("Invalid OTP."))
}

async fn set_password(db: &Database, user_id: Uuid, password: &str) -> AppResult<()> {
    let password_hash = hash_password(password).await?;
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn find_user_by_email(db: &Database, email: &str) -> AppResult<Option<User>> {
    let query = format!("{} WHERE lower(u.email) = $1 AND u.is_deleted = FALSE", USER_SELECT);
    let user = sqlx::query_as::<_, User>(&query)
        .bind(email.to_lowercase())
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn load_user(db: &Database, user_id: Uuid) -> AppResult<User> {
    let query = format!("{} WHERE u.id = $1 AND u.is_deleted = FALSE", USER_SELECT);
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// True when another active account already owns `email`.
pub async fn email_in_use(db: &Database, email: &str, except: Option<Uuid>) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM users
            WHERE lower(email) = lower($1) AND is_active = TRUE AND is_deleted = FALSE
              AND ($2::uuid IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(email)
    .bind(except)
    .fetch_one(db)
    .await?;

    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(phone_number: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            fullname: Some("Jane Doe".to_string()),
            email: Some(" Jane@Example.com ".to_string()),
            phone_number: phone_number.map(str::to_string),
            password: Some("longenough1".to_string()),
            confirm_password: Some("longenough1".to_string()),
            country_code: None,
            date_of_birth: None,
            address: None,
            work_address: None,
        }
    }

    #[test]
    fn customers_need_a_phone_number() {
        let body = request(None);
        let err = validate_registration(&body, true).unwrap_err();
        assert_eq!(err.to_string(), "Phone number is required.");
    }

    #[test]
    fn admins_may_register_without_a_phone_number() {
        let body = request(None);
        let registration = validate_registration(&body, false).unwrap();
        assert_eq!(registration.phone_number, None);
        assert_eq!(registration.email, "jane@example.com");

        let blank = request(Some("  "));
        assert_eq!(validate_registration(&blank, false).unwrap().phone_number, None);

        let given = request(Some("5550100"));
        assert_eq!(validate_registration(&given, false).unwrap().phone_number, Some("5550100"));
    }

    #[test]
    fn short_multibyte_password_is_rejected() {
        let mut body = request(Some("5550100"));
        body.password = Some("éééé".to_string());
        body.confirm_password = body.password.clone();
        let err = validate_registration(&body, true).unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 8 characters long.");
    }

    #[test]
    fn email_shape_is_checked() {
        let mut body = request(Some("5550100"));
        body.email = Some("not-an-email".to_string());
        assert!(validate_registration(&body, true).is_err());
    }
}
