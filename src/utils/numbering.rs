//! Document numbers for purchase orders and invoices.
//!
//! Numbers look like `JD-2026-07`: the first two letters of the owner's full
//! name, the year, and a sequence that is at least two digits wide. Invoices
//! carry an extra `INV-` (sales) or `BILL-` (purchase) prefix.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    SalesInvoice,
    PurchaseInvoice,
}

pub fn name_prefix(fullname: &str) -> String {
    let prefix: String = fullname
        .chars()
        .filter(|c| c.is_alphabetic())
        .take(2)
        .collect::<String>()
        .to_uppercase();

    if prefix.is_empty() {
        "NA".to_string()
    } else {
        prefix
    }
}

pub fn base_prefix(kind: DocumentKind, fullname: &str, year: i32) -> String {
    let owner = name_prefix(fullname);
    match kind {
        DocumentKind::PurchaseOrder => format!("{}-{}", owner, year),
        DocumentKind::SalesInvoice => format!("INV-{}-{}", owner, year),
        DocumentKind::PurchaseInvoice => format!("BILL-{}-{}", owner, year),
    }
}

/// Picks the next number under `base` given the numbers already issued.
/// The highest numeric suffix wins, so `-100` correctly follows `-99`.
pub fn next_number<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let head = format!("{}-", base);
    let last = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(head.as_str()))
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    format!("{}{:02}", head, last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_uses_first_two_letters() {
        assert_eq!(name_prefix("john doe"), "JO");
        assert_eq!(name_prefix("  9 Émile"), "ÉM");
        assert_eq!(name_prefix("X"), "X");
        assert_eq!(name_prefix("123"), "NA");
    }

    #[test]
    fn base_prefix_per_document_kind() {
        assert_eq!(base_prefix(DocumentKind::PurchaseOrder, "Jane", 2026), "JA-2026");
        assert_eq!(base_prefix(DocumentKind::SalesInvoice, "Jane", 2026), "INV-JA-2026");
        assert_eq!(base_prefix(DocumentKind::PurchaseInvoice, "Jane", 2026), "BILL-JA-2026");
    }

    #[test]
    fn first_number_of_the_year() {
        assert_eq!(next_number("JA-2026", Vec::<&str>::new()), "JA-2026-01");
    }

    #[test]
    fn follows_numeric_maximum_not_lexical() {
        let existing = ["JA-2026-09", "JA-2026-99", "JA-2026-100", "JA-2026-11"];
        assert_eq!(next_number("JA-2026", existing), "JA-2026-101");
    }

    #[test]
    fn ignores_other_prefixes_and_garbage() {
        let existing = ["JA-2025-40", "JA-2026-x1", "JA-2026-", "JA-2026-03"];
        assert_eq!(next_number("JA-2026", existing), "JA-2026-04");
    }

    #[test]
    fn numbers_are_unique_within_a_year() {
        let mut issued: Vec<String> = Vec::new();
        for _ in 0..120 {
            let next = next_number("JA-2026", issued.iter().map(String::as_str));
            assert!(!issued.contains(&next));
            issued.push(next);
        }
        assert_eq!(issued.last().map(String::as_str), Some("JA-2026-120"));
    }
}
