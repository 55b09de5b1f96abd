//! Response envelope and paging DTOs.
//!
//! Every backend response body has the shape
//! `{ "code": int, "data": T, "message": string, "success": bool }`.
//! Fields the server omits fall back to their defaults so that an error body
//! with only a `message` still decodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// The backend response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success: bool,
}

impl<T> ApiResponse<T> {
    /// Business success: `success == true` or `code == 200`.
    pub fn is_success(&self) -> bool {
        self.success || self.code == 200
    }

    /// The server message, or `None` when it is blank.
    pub fn message(&self) -> Option<&str> {
        let msg = self.message.trim();
        (!msg.is_empty()).then_some(msg)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Paging parameters (the backend binds these PascalCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_descending: Option<bool>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            order_by: None,
            is_descending: None,
        }
    }
}

impl PageRequest {
    /// Pages are 1-based and never empty.
    pub fn new(page: u32, page_size: u32) -> CoreResult<Self> {
        if page == 0 {
            return Err(CoreError::validation("page must start at 1"));
        }
        if page_size == 0 {
            return Err(CoreError::validation("page size must be positive"));
        }
        Ok(Self {
            page,
            page_size,
            ..Self::default()
        })
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(field.into());
        self.is_descending = Some(descending);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_flag_or_code_200_marks_success() {
        let by_flag: ApiResponse = serde_json::from_value(json!({
            "code": 0, "data": null, "message": "", "success": true
        }))
        .unwrap();
        assert!(by_flag.is_success());

        let by_code: ApiResponse = serde_json::from_value(json!({ "code": 200 })).unwrap();
        assert!(by_code.is_success());

        let failed: ApiResponse = serde_json::from_value(json!({
            "code": 400, "message": "name taken", "success": false
        }))
        .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.message(), Some("name taken"));
    }

    #[test]
    fn blank_message_is_none() {
        let resp: ApiResponse = serde_json::from_value(json!({ "message": "  " })).unwrap();
        assert_eq!(resp.message(), None);
        assert_eq!(resp.data, None);
    }

    #[test]
    fn page_request_serializes_pascal_case() {
        let req = PageRequest {
            order_by: Some("createTime".into()),
            ..PageRequest::default()
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, json!({ "Page": 1, "PageSize": 10, "OrderBy": "createTime" }));
    }

    #[test]
    fn page_request_rejects_zero() {
        assert!(matches!(PageRequest::new(0, 10), Err(CoreError::Validation(_))));
        assert!(matches!(PageRequest::new(1, 0), Err(CoreError::Validation(_))));

        let req = PageRequest::new(3, 20).unwrap().order_by("createTime", true);
        assert_eq!(req.page, 3);
        assert_eq!(req.is_descending, Some(true));
    }
}
