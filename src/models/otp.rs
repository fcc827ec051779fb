use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub email: String,
    pub otp: String,
    pub otp_type: String,
    pub expiry_time: DateTime<Utc>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub email: Option<String>,
    pub otp_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp_code: Option<String>,
    pub otp_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub otp_code: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
    pub otp_type: String,
    pub expiry_time: String,
}

impl OtpResponse {
    /// The code itself is only included when `show_code` is set.
    pub fn new(otp: Otp, show_code: bool) -> Self {
        Self {
            user: otp.email,
            otp_code: show_code.then_some(otp.otp),
            otp_type: otp.otp_type,
            expiry_time: otp.expiry_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn otp(otp_type: &str) -> Otp {
        let now = Utc::now();
        Otp {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            otp: "482913".to_string(),
            otp_type: otp_type.to_string(),
            expiry_time: now + Duration::minutes(5),
            is_verified: false,
            created_at: now,
        }
    }

    #[test]
    fn hidden_code_is_left_out_of_the_body() {
        let body = serde_json::to_value(OtpResponse::new(otp("reset_password"), false)).unwrap();
        assert!(body.get("otp_code").is_none());
        assert_eq!(body["user"], "jane@example.com");
        assert_eq!(body["otp_type"], "reset_password");
    }

    #[test]
    fn shown_code_is_serialized() {
        let body = serde_json::to_value(OtpResponse::new(otp("verify_email"), true)).unwrap();
        assert_eq!(body["otp_code"], "482913");
    }
}
