use chrono::{DateTime, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpType {
    VerifyEmail,
    ResetPassword,
}

impl OtpType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verify_email" => Some(OtpType::VerifyEmail),
            "reset_password" => Some(OtpType::ResetPassword),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OtpType::VerifyEmail => "verify_email",
            OtpType::ResetPassword => "reset_password",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
}

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Codes never leave the server for password resets. Email verification codes
/// are returned only when the deployment opts in (`EXPOSE_OTP_CODES`).
pub fn otp_code_visible(otp_type: OtpType, expose_codes: bool) -> bool {
    expose_codes && otp_type == OtpType::VerifyEmail
}

/// A code is still valid at the exact instant it expires.
pub fn check_otp(expected: &str, supplied: &str, expiry_time: DateTime<Utc>, now: DateTime<Utc>) -> OtpCheck {
    if expected != supplied.trim() {
        OtpCheck::Mismatch
    } else if now > expiry_time {
        OtpCheck::Expired
    } else {
        OtpCheck::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn generated_codes_have_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn parses_known_types_only() {
        assert_eq!(OtpType::parse("verify_email"), Some(OtpType::VerifyEmail));
        assert_eq!(OtpType::parse("reset_password"), Some(OtpType::ResetPassword));
        assert_eq!(OtpType::parse("sms"), None);
    }

    #[test]
    fn checks_code_before_expiry() {
        let now = Utc::now();
        let expiry = now + Duration::minutes(5);

        assert_eq!(check_otp("123456", "123456", expiry, now), OtpCheck::Valid);
        assert_eq!(check_otp("123456", "654321", expiry, now), OtpCheck::Mismatch);
        assert_eq!(
            check_otp("123456", "123456", expiry, now + Duration::minutes(6)),
            OtpCheck::Expired
        );
    }

    #[test]
    fn expiry_boundary() {
        let expiry = Utc::now();

        assert_eq!(check_otp("123456", "123456", expiry, expiry), OtpCheck::Valid);
        assert_eq!(
            check_otp("123456", "123456", expiry, expiry + Duration::seconds(1)),
            OtpCheck::Expired
        );
        assert_eq!(
            check_otp("123456", " 123456 ", expiry, expiry - Duration::minutes(4)),
            OtpCheck::Valid
        );
    }

    #[test]
    fn an_expired_wrong_code_is_a_mismatch() {
        let expiry = Utc::now();
        assert_eq!(
            check_otp("123456", "000000", expiry, expiry + Duration::hours(1)),
            OtpCheck::Mismatch
        );
    }

    #[test]
    fn reset_codes_are_never_returned() {
        assert!(!otp_code_visible(OtpType::ResetPassword, true));
        assert!(!otp_code_visible(OtpType::ResetPassword, false));
        assert!(!otp_code_visible(OtpType::VerifyEmail, false));
        assert!(otp_code_visible(OtpType::VerifyEmail, true));
    }
}
