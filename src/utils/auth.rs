use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{Duration, Utc};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, expiry_hours: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiry_hours);

        Self {
            sub: user_id.to_string(),
            email,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

pub fn create_token(
    user_id: Uuid,
    email: String,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, email, expiry_hours);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn is_expired(err: &jsonwebtoken::errors::Error) -> bool {
    matches!(err.kind(), ErrorKind::ExpiredSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "jane@example.com".to_string(), SECRET, 24).unwrap();

        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id(), Some(user_id));
        assert_eq!(claims.email, "jane@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(Uuid::new_v4(), "a@b.c".to_string(), SECRET, 24).unwrap();
        let err = verify_token(&token, "other-secret").unwrap_err();
        assert!(!is_expired(&err));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let token = create_token(Uuid::new_v4(), "a@b.c".to_string(), SECRET, -2).unwrap();
        let err = verify_token(&token, SECRET).unwrap_err();
        assert!(is_expired(&err));
    }
}
