pub mod activity;
pub mod client;
pub mod company;
pub mod expense;
pub mod invoice;
pub mod line_item;
pub mod order;
pub mod otp;
pub mod product;
pub mod role;
pub mod user;

pub use activity::*;
pub use client::*;
pub use company::*;
pub use expense::*;
pub use invoice::*;
pub use line_item::*;
pub use order::*;
pub use otp::*;
pub use product::*;
pub use role::*;
pub use user::*;
