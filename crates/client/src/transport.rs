//! Transport Pipeline.
//!
//! Dispatches an [`ApiRequest`] and classifies the response into a tagged
//! [`Classification`]. A 401 is not an error at this layer: it comes back as
//! [`Classification::AuthChallenge`] and the caller routes it to the refresh
//! coordinator.

use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use adminconsole_auth::Credential;
use adminconsole_core::ApiResponse;

use crate::config::ClientConfig;
use crate::dto::{RefreshTokenInput, RefreshTokenOutput};
use crate::error::{TransportError, TransportResult};
use crate::request::ApiRequest;

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// 2xx with a successful envelope; carries the unwrapped `data`.
    Success(Value),
    /// 2xx whose envelope reports failure.
    Business { code: i64, message: String },
    /// Non-2xx other than 401.
    Http { status: u16, message: String },
    /// HTTP 401, whatever the body.
    AuthChallenge,
}

impl Classification {
    /// Map to the caller-facing result. A challenge that reaches this point
    /// was not recovered and ends the session for this caller.
    pub fn into_result(self) -> TransportResult<Value> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Business { code, message } => Err(TransportError::Business { code, message }),
            Self::Http { status, message } => Err(TransportError::Http { status, message }),
            Self::AuthChallenge => Err(TransportError::auth_expired("request was rejected as unauthenticated")),
        }
    }
}

/// Classify a raw HTTP response.
///
/// Only a non-empty 2xx body that is not a valid envelope is an error here.
pub fn classify(status: u16, body: &[u8]) -> TransportResult<Classification> {
    if status == StatusCode::UNAUTHORIZED.as_u16() {
        return Ok(Classification::AuthChallenge);
    }

    if (200..300).contains(&status) {
        if body.is_empty() {
            return Ok(Classification::Success(Value::Null));
        }
        let envelope: ApiResponse = serde_json::from_slice(body)
            .map_err(|err| TransportError::Decode(format!("invalid response envelope: {err}")))?;

        return Ok(if envelope.is_success() {
            Classification::Success(envelope.data.unwrap_or(Value::Null))
        } else {
            Classification::Business {
                code: envelope.code,
                message: envelope.message().unwrap_or_default().to_string(),
            }
        });
    }

    let message = serde_json::from_slice::<ApiResponse>(body)
        .ok()
        .and_then(|envelope| envelope.message().map(str::to_owned))
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_owned)
        })
        .unwrap_or_default();

    Ok(Classification::Http { status, message })
}

/// The network seam. [`HttpTransport`] is the real implementation; tests
/// substitute scripted ones.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `request`, attaching `bearer` as the Authorization header when
    /// present.
    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> TransportResult<Classification>;

    /// Exchange the refresh token in `credential` for a new credential.
    async fn refresh(&self, credential: &Credential) -> TransportResult<Credential>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> TransportResult<Classification> {
        let url = self.config.endpoint(request.path());
        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            %url,
            authenticated = bearer.is_some(),
            "dispatching request"
        );

        let mut builder = self.http.request(request.method().clone(), &url);
        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            let err = TransportError::from(err);
            tracing::warn!(request_id = %request.id(), %url, error = %err, "request failed before a response");
            err
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let classification = classify(status, &body)?;
        match &classification {
            Classification::Success(_) => {
                tracing::debug!(request_id = %request.id(), status, "request succeeded");
            }
            Classification::AuthChallenge => {
                tracing::debug!(request_id = %request.id(), "request challenged");
            }
            Classification::Business { code, message } => {
                tracing::warn!(request_id = %request.id(), code, %message, "business error");
            }
            Classification::Http { status, message } => {
                tracing::warn!(request_id = %request.id(), status, %message, "http error");
            }
        }
        Ok(classification)
    }

    async fn refresh(&self, credential: &Credential) -> TransportResult<Credential> {
        let refresh_token = credential
            .refresh_token()
            .ok_or_else(|| TransportError::auth_expired("no refresh token"))?;

        let input = RefreshTokenInput {
            refresh_token: refresh_token.to_string(),
            access_token: credential.access_token().unwrap_or_default().to_string(),
        };
        let request = ApiRequest::post(self.config.refresh_path.clone()).with_json(&input)?;

        match self.dispatch(&request, None).await? {
            Classification::Success(data) => {
                let output: RefreshTokenOutput = serde_json::from_value(data)
                    .map_err(|err| TransportError::auth_expired(format!("malformed refresh response: {err}")))?;
                output
                    .into_credential()
                    .map_err(|err| TransportError::auth_expired(format!("refresh returned {err}")))
            }
            Classification::AuthChallenge => Err(TransportError::auth_expired("refresh token rejected")),
            Classification::Business { message, .. } => Err(TransportError::auth_expired(message)),
            Classification::Http { status, message } => Err(TransportError::auth_expired(format!(
                "refresh failed with status {status}: {message}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn success_unwraps_data() {
        let out = classify(200, &body(json!({ "code": 200, "data": { "id": 1 }, "success": true }))).unwrap();
        assert_eq!(out, Classification::Success(json!({ "id": 1 })));
    }

    #[test]
    fn code_200_alone_is_success() {
        let out = classify(200, &body(json!({ "code": 200, "success": false }))).unwrap();
        assert_eq!(out, Classification::Success(Value::Null));
    }

    #[test]
    fn failed_envelope_is_business_error() {
        let out = classify(200, &body(json!({ "code": 400, "message": "name taken", "success": false }))).unwrap();
        assert_eq!(
            out,
            Classification::Business {
                code: 400,
                message: "name taken".into()
            }
        );
    }

    #[test]
    fn unauthorized_is_challenge_regardless_of_body() {
        assert_eq!(classify(401, b"").unwrap(), Classification::AuthChallenge);
        assert_eq!(
            classify(401, &body(json!({ "code": 200, "success": true }))).unwrap(),
            Classification::AuthChallenge
        );
    }

    #[test]
    fn http_errors_keep_status_and_message() {
        assert_eq!(
            classify(403, &body(json!({ "code": 403, "message": "no access" }))).unwrap(),
            Classification::Http {
                status: 403,
                message: "no access".into()
            }
        );
        assert_eq!(
            classify(500, b"<html>oops</html>").unwrap(),
            Classification::Http {
                status: 500,
                message: "Internal Server Error".into()
            }
        );
    }

    #[test]
    fn garbage_2xx_body_is_decode_error() {
        assert!(matches!(classify(200, b"not json"), Err(TransportError::Decode(_))));
    }

    #[test]
    fn empty_2xx_body_is_null_success() {
        assert_eq!(classify(204, b"").unwrap(), Classification::Success(Value::Null));
    }

    #[tokio::test]
    async fn invalid_header_is_encode_error() {
        let transport = HttpTransport::new(ClientConfig::default()).unwrap();
        let request = ApiRequest::get("/users").with_header("bad header", "value");

        let err = transport.dispatch(&request, None).await.unwrap_err();

        assert!(matches!(err, TransportError::Encode(_)), "got {err:?}");
    }

    #[test]
    fn unrecovered_challenge_maps_to_auth_expired() {
        assert!(Classification::AuthChallenge.into_result().unwrap_err().is_auth_expired());
    }
}
