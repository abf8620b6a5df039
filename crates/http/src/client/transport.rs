//! Request model and the transports that carry it
//!
//! Requests are plain data so they can be replayed after a token refresh,
//! multipart bodies included.

use super::error::{ClientError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder, Method, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

const DEFAULT_USER_AGENT: &str = "skillverse-client/0.1.0";

/// Percent-encode an id for use as a single path segment
pub fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// Single file form upload
    Multipart {
        field: String,
        file_name: String,
        mime: String,
        bytes: Bytes,
    },
}

/// A replayable API request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
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

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a query parameter when a value is present
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Add a caller header; `Authorization` is always replaced by the client
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    /// Set a single-file multipart body
    #[must_use]
    pub fn multipart(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.body = Some(RequestBody::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// Drop any caller-supplied authorization header
    pub(crate) fn strip_authorization(&mut self) {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case(reqwest::header::AUTHORIZATION.as_str()));
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// JSON body, if any
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }
}

/// Status and body of a received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response with a JSON body
    pub fn json_ok(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode the body; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert a non-2xx response into the matching error
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::from_status(self.status, &self.body))
        }
    }
}

/// Carries a request to the backend
///
/// Transports report what happened on the wire. Status interpretation and
/// the refresh protocol live in the client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, attaching `bearer` as the authorization credential
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        (**self).send(request, bearer).await
    }
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url`
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
        user_agent: Option<String>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;

        let mut builder = ClientBuilder::new()
            .user_agent(user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            if !name.eq_ignore_ascii_case(reqwest::header::AUTHORIZATION.as_str()) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart {
                field,
                file_name,
                mime,
                bytes,
            }) => {
                let part = multipart::Part::bytes(bytes.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(mime)?;
                builder.multipart(multipart::Form::new().part(field.clone(), part))
            }
            None => builder,
        };

        // Set last so nothing above can override it
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        trace!(method = %request.method, path = %request.path, status, "Response received");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_caller_authorization() {
        let mut request = ApiRequest::get("/api/trend-signals")
            .header("authorization", "Bearer forged")
            .header("X-Trace", "1");
        request.strip_authorization();
        assert_eq!(request.headers, vec![("X-Trace".to_string(), "1".to_string())]);
    }

    #[test]
    fn ids_are_encoded_as_one_segment() {
        assert_eq!(path_segment("user_1"), "user_1");
        assert_eq!(path_segment("team/a?x=1"), "team%2Fa%3Fx%3D1");
        assert_eq!(path_segment("a b+c"), "a%20b%2Bc");
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let response = ApiResponse::new(204, Bytes::new());
        response.json::<()>().unwrap();
        let value: Value = response.json().unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpTransport::new("not a url", None, None);
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn error_for_status_maps_failures() {
        let ok = ApiResponse::new(201, "{}");
        assert!(ok.error_for_status().is_ok());
        let err = ApiResponse::new(403, "").error_for_status().unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));
    }
}
