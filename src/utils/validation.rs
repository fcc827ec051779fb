use chrono::NaiveDate;

use crate::error::{AppError, AppResult};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Returns the trimmed value, or a 400 with `message` when it is missing or blank.
pub fn require<'a>(value: &'a Option<String>, message: &str) -> AppResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(AppError::validation(message)),
    }
}

/// Blank strings become `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Wraps a search term for `ILIKE ... ESCAPE '\\'` so `%` and `_` match literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::validation("Enter a valid email address."))
    }
}

/// Parses an optional `YYYY-MM-DD` query value. Empty strings count as absent.
pub fn parse_date_param(value: Option<&str>, field: &str) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::validation(format!("Invalid {}. Use YYYY-MM-DD.", field))),
    }
}

pub fn image_extension(filename: &str) -> Option<String> {
    let extension = filename.rsplit_once('.')?.1.to_lowercase();
    IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_rejects_blank() {
        assert!(require(&None, "Email is required.").is_err());
        assert!(require(&Some("   ".to_string()), "Email is required.").is_err());
        assert_eq!(require(&Some(" a@b.co ".to_string()), "x").unwrap(), "a@b.co");

        let err = require(&None, "Fullname is required.").unwrap_err();
        assert_eq!(err.to_string(), "Fullname is required.");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\tmp"), "%c:\\\\tmp%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("jane doe@example.com").is_err());
    }

    #[test]
    fn date_params() {
        assert_eq!(parse_date_param(None, "date_from").unwrap(), None);
        assert_eq!(parse_date_param(Some(""), "date_from").unwrap(), None);
        assert_eq!(
            parse_date_param(Some("2026-03-01"), "date_from").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert!(parse_date_param(Some("03/01/2026"), "date_from").is_err());
    }

    #[test]
    fn only_common_image_types() {
        assert_eq!(image_extension("avatar.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("photo.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("doc.pdf"), None);
        assert_eq!(image_extension("noextension"), None);
    }
}
