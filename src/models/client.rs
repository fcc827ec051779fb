use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

pub const MAX_PAYMENT_TERM_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Client,
    Supplier,
}

impl ClientType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "client" => Some(Self::Client),
            "supplier" => Some(Self::Supplier),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Supplier => "supplier",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_name: String,
    pub contact_person: Option<String>,
    pub phone_number: String,
    pub email: String,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub tax_number: Option<String>,
    pub gst_type: Option<String>,
    pub pan_number: Option<String>,
    pub payment_term: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub preferred_payment_method: Option<String>,
    pub bank_details: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub user_type: String,
    pub is_favorite: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for both create and update. On update, absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct ClientRequest {
    pub client_name: Option<String>,
    pub contact_person: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub tax_number: Option<String>,
    pub gst_type: Option<String>,
    pub pan_number: Option<String>,
    pub payment_term: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub preferred_payment_method: Option<String>,
    pub bank_details: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub user_type: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ClientListItem {
    pub id: Uuid,
    pub client_name: String,
    pub contact_person: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub city: Option<String>,
    pub user_type: String,
    pub is_favorite: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Client> for ClientListItem {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            client_name: client.client_name,
            contact_person: client.contact_person,
            email: client.email,
            phone_number: client.phone_number,
            city: client.city,
            user_type: client.user_type,
            is_favorite: client.is_favorite,
            is_active: client.is_active,
            created_at: client.created_at,
        }
    }
}

/// First run of ASCII digits in `text`.
fn first_number(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Days granted by a payment term such as `Net 30` or `45 days`. The number
/// after `net` wins (`2/10 Net 30` is 30 days), otherwise the first number.
/// Terms without digits (e.g. `Due on receipt`) grant none.
pub fn payment_term_days(term: Option<&str>) -> AppResult<Option<i64>> {
    let Some(term) = term else {
        return Ok(None);
    };
    let lower = term.to_ascii_lowercase();
    let number = lower
        .find("net")
        .and_then(|at| first_number(&lower[at..]))
        .or_else(|| first_number(&lower));

    match number {
        None => Ok(None),
        Some(digits) => digits
            .parse::<i64>()
            .ok()
            .filter(|days| *days <= MAX_PAYMENT_TERM_DAYS)
            .map(Some)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Payment term cannot exceed {} days.",
                    MAX_PAYMENT_TERM_DAYS
                ))
            }),
    }
}

/// Due date implied by a client's payment term; the invoice date when the term grants no days.
pub fn due_date_for_term(invoice_date: NaiveDate, term: Option<&str>) -> AppResult<NaiveDate> {
    match payment_term_days(term)? {
        None => Ok(invoice_date),
        Some(days) => invoice_date
            .checked_add_signed(Duration::days(days))
            .ok_or_else(|| AppError::validation("Due date is out of range.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_type() {
        assert_eq!(ClientType::parse("Supplier"), Some(ClientType::Supplier));
        assert_eq!(ClientType::parse(" client "), Some(ClientType::Client));
        assert_eq!(ClientType::parse("vendor"), None);
        assert_eq!(ClientType::Supplier.as_str(), "supplier");
    }

    #[test]
    fn reads_days_from_payment_term() {
        assert_eq!(payment_term_days(Some("Net 30")).unwrap(), Some(30));
        assert_eq!(payment_term_days(Some("45 days")).unwrap(), Some(45));
        assert_eq!(payment_term_days(Some("Due on receipt")).unwrap(), None);
        assert_eq!(payment_term_days(None).unwrap(), None);
    }

    #[test]
    fn discount_terms_use_the_net_days() {
        assert_eq!(payment_term_days(Some("2/10 Net 30")).unwrap(), Some(30));
        assert_eq!(payment_term_days(Some("NET60")).unwrap(), Some(60));
        assert_eq!(payment_term_days(Some("15 or 30 days")).unwrap(), Some(15));
    }

    #[test]
    fn oversized_terms_are_rejected() {
        assert_eq!(payment_term_days(Some("Net 3650")).unwrap(), Some(3650));
        assert!(payment_term_days(Some("Net 3651")).is_err());

        let err = payment_term_days(Some("Net 100000000000")).unwrap_err();
        assert_eq!(err.to_string(), "Payment term cannot exceed 3650 days.");
        assert!(payment_term_days(Some("Net 99999999999999999999999")).is_err());
    }

    #[test]
    fn due_date_follows_term() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(
            due_date_for_term(date, Some("Net 30")).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
        );
        assert_eq!(due_date_for_term(date, Some("Due on receipt")).unwrap(), date);
        assert_eq!(due_date_for_term(date, None).unwrap(), date);
        assert!(due_date_for_term(date, Some("Net 100000000000")).is_err());
        assert!(due_date_for_term(NaiveDate::MAX, Some("Net 1")).is_err());
    }
}
