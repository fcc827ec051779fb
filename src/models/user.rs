use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

/// Column list for loading a `User` together with its role name.
pub const USER_SELECT: &str = r#"
    SELECT u.id, u.role_id, r.role_name, u.fullname, u.email, u.password_hash,
           u.country_code, u.phone_number, u.date_of_birth, u.profile_image,
           u.address, u.work_address, u.is_active, u.is_email_verified,
           u.is_phone_verified, u.is_admin, u.is_deleted, u.created_at, u.updated_at
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub fullname: String,
    pub email: String,
    pub password_hash: String,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
    pub address: Option<String>,
    pub work_address: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub is_admin: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin_role(&self) -> bool {
        self.role_name.as_deref() == Some("admin")
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub country_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub work_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Partial profile update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub work_address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
    pub address: Option<String>,
    pub work_address: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            email: user.email,
            role_id: user.role_id,
            role_name: user.role_name,
            country_code: user.country_code,
            phone_number: user.phone_number,
            date_of_birth: user.date_of_birth,
            profile_image: user.profile_image,
            address: user.address,
            work_address: user.work_address,
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            is_phone_verified: user.is_phone_verified,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct LoginHistory {
    pub id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct AdminUserListItem {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}
