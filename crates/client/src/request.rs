//! Replayable request descriptor.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub use reqwest::Method;

use crate::error::{TransportError, TransportResult};

/// Everything needed to (re)issue a request: method, path, query, headers
/// and body.
///
/// The descriptor is never mutated by the transport; credentials are attached
/// to the outgoing HTTP request only, so a replay starts from the caller's
/// original parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    id: Uuid,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Flatten a serializable struct/map into query pairs.
    ///
    /// `null` fields are skipped; strings are passed verbatim and other
    /// scalars use their JSON text.
    pub fn with_query<Q: Serialize + ?Sized>(mut self, params: &Q) -> TransportResult<Self> {
        let value = serde_json::to_value(params).map_err(|e| TransportError::Encode(e.to_string()))?;
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::Null => {}
                        Value::String(s) => self.query.push((key, s)),
                        other => self.query.push((key, other.to_string())),
                    }
                }
            }
            other => {
                return Err(TransportError::Encode(format!(
                    "query parameters must serialize to an object, got {other}"
                )));
            }
        }
        Ok(self)
    }

    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> TransportResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
