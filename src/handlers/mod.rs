pub mod activities;
pub mod admin;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod documents;
pub mod expenses;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod profile;
pub mod reports;
