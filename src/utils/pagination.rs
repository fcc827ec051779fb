use axum::{
    http::Uri,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Raw paging parameters. Kept as strings so an empty `?page=` does not fail
/// the whole query extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub api_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub app_shape: bool,
}

impl PageRequest {
    pub fn from_query(query: &PageQuery) -> AppResult<Self> {
        let page = match query.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(invalid_page()),
            },
        };

        let page_size = query
            .page_size
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self {
            page,
            page_size,
            app_shape: query.api_type.as_deref() == Some("app"),
        })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit() - 1) / self.limit()
        }
    }

    /// The first page of an empty result set is valid; any page past the last is not.
    pub fn ensure_in_range(&self, total: i64) -> AppResult<()> {
        let pages = self.total_pages(total).max(1);
        if i64::from(self.page) > pages {
            Err(invalid_page())
        } else {
            Ok(())
        }
    }
}

fn invalid_page() -> AppError {
    AppError::not_found("Invalid page.")
}

#[derive(Debug)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub total: i64,
    pub request: PageRequest,
    pub uri: Uri,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(results: Vec<T>, total: i64, request: PageRequest, uri: Uri) -> Self {
        Self {
            results,
            total,
            request,
            uri,
        }
    }

    pub fn to_json(&self) -> Value {
        let total_pages = self.request.total_pages(self.total);
        let page = i64::from(self.request.page);
        let page_size = if (self.results.len() as u32) < self.request.page_size {
            self.results.len() as u32
        } else {
            self.request.page_size
        };

        let next = (page < total_pages).then(|| page_link(&self.uri, page + 1));
        let previous = (page > 1).then(|| page_link(&self.uri, page - 1));

        let links = json!({ "next": next, "previous": previous });
        let results = serde_json::to_value(&self.results).unwrap_or(Value::Array(Vec::new()));

        if self.request.app_shape {
            json!({
                "success": true,
                "data": {
                    "links": links,
                    "total": self.total,
                    "page": page,
                    "page_size": page_size,
                    "total_pages": total_pages.max(1),
                    "results": results,
                }
            })
        } else {
            json!({
                "links": links,
                "total": self.total,
                "page": page,
                "page_size": page_size,
                "total_pages": total_pages.max(1),
                "success": true,
                "results": results,
            })
        }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        Json(self.to_json()).into_response()
    }
}

/// Rebuilds the request path with `page` replaced, keeping every other query pair.
pub fn page_link(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    pairs.push(format!("page={}", urlencoding::encode(&page.to_string())));

    format!("{}?{}", uri.path(), pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, page_size: Option<&str>, api_type: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            api_type: api_type.map(str::to_string),
        }
    }

    #[test]
    fn defaults_to_first_page_of_ten() {
        let request = PageRequest::from_query(&PageQuery::default()).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);
        assert!(!request.app_shape);
    }

    #[test]
    fn caps_page_size() {
        let request = PageRequest::from_query(&query(Some("3"), Some("500"), None)).unwrap();
        assert_eq!(request.page_size, MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 100);
    }

    #[test]
    fn rejects_garbage_page() {
        assert!(PageRequest::from_query(&query(Some("zero"), None, None)).is_err());
        assert!(PageRequest::from_query(&query(Some("0"), None, None)).is_err());
    }

    #[test]
    fn out_of_range_page_is_invalid() {
        let request = PageRequest::from_query(&query(Some("3"), Some("10"), None)).unwrap();
        assert!(request.ensure_in_range(25).is_ok());
        assert!(request.ensure_in_range(20).is_err());

        let first = PageRequest::from_query(&PageQuery::default()).unwrap();
        assert!(first.ensure_in_range(0).is_ok());
    }

    #[test]
    fn web_shape_reports_links_and_short_page_size() {
        let request = PageRequest::from_query(&query(Some("2"), Some("10"), None)).unwrap();
        let uri: Uri = "/api/v1/user/client/?search=acme&page=2".parse().unwrap();
        let body = Paginated::new(vec![1, 2, 3], 13, request, uri).to_json();

        assert_eq!(body["success"], true);
        assert_eq!(body["total"], 13);
        assert_eq!(body["page"], 2);
        assert_eq!(body["page_size"], 3);
        assert_eq!(body["total_pages"], 2);
        assert_eq!(body["links"]["next"], Value::Null);
        assert_eq!(body["links"]["previous"], "/api/v1/user/client/?search=acme&page=1");
    }

    #[test]
    fn app_shape_wraps_in_data() {
        let request = PageRequest::from_query(&query(None, None, Some("app"))).unwrap();
        let uri: Uri = "/api/v1/expense/".parse().unwrap();
        let body = Paginated::<i32>::new(Vec::new(), 0, request, uri).to_json();

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total"], 0);
        assert_eq!(body["data"]["total_pages"], 1);
        assert_eq!(body["data"]["links"]["next"], Value::Null);
        assert!(body["data"]["results"].as_array().unwrap().is_empty());
    }
}
