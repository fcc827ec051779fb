pub mod auth;
pub mod extract;
pub mod media;
pub mod numbering;
pub mod otp;
pub mod pagination;
pub mod password;
pub mod response;
pub mod validation;

pub use auth::{create_token, verify_token};
pub use password::{hash_password, verify_password};
pub use extract::ApiJson;
