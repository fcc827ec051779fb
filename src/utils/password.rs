use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length is counted in characters, so multi-byte passwords are not favoured.
pub fn is_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// bcrypt is CPU bound; both helpers run it on the blocking pool.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

pub async fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("password check task failed: {}", e)))?
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hashed = bcrypt::hash("s3cret-pass", 4).unwrap();
        assert!(verify_password("s3cret-pass", &hashed).await.unwrap());
        assert!(!verify_password("wrong-pass", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        assert!(verify_password("s3cret-pass", "not-a-bcrypt-hash").await.is_err());
    }

    #[test]
    fn length_counts_characters() {
        assert!(is_long_enough("abcdefgh"));
        assert!(!is_long_enough("abcdefg"));
        // Four two-byte characters: eight bytes, four characters.
        assert!(!is_long_enough("éééé"));
        assert!(is_long_enough("éééééééé"));
    }
}
