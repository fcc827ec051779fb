pub mod permission;

pub use permission::{AdminUser, CurrentUser, AUTH_COOKIE};
