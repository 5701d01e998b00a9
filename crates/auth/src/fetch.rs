//! Authorized HTTP access to the backend
//!
//! Every backend call outside the login endpoints goes through [`ApiClient`],
//! which attaches the bearer token from the session cookies and logs the
//! session out when the backend answers 401.

use log::{debug, warn};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::manager::SessionManager;
use crate::types::LogoutReason;
use crate::AuthError;

/// The backend's JSON envelope: `{status, response, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub status: u16,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl Envelope<Value> {
    /// Deserializes `data` into the requested type
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, AuthError> {
        let data = self.data.ok_or(AuthError::MissingField("data"))?;
        Ok(serde_json::from_value(data)?)
    }

    /// Human-readable message carried by an error envelope
    pub fn message_or(&self, fallback: &str) -> String {
        match &self.data {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => self
                .response
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// Fails with an API error unless the envelope status is `expected`
    pub fn expect_status(self, expected: u16, fallback: &str) -> Result<Self, AuthError> {
        if self.status == expected {
            Ok(self)
        } else {
            let message = self.message_or(fallback);
            Err(AuthError::ApiError {
                status: self.status,
                message,
            })
        }
    }
}

enum Body {
    Json(Vec<u8>),
    Multipart(Form),
}

/// Shared fetch wrapper bound to a session
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: Client,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(base_url: &str, http_client: Client, session: SessionManager) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str) -> ApiRequest<'_> {
        ApiRequest {
            client: self,
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::DELETE, path)
    }
}

/// A request under construction
pub struct ApiRequest<'a> {
    client: &'a ApiClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Body>,
}

impl<'a> ApiRequest<'a> {
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AuthError> {
        self.body = Some(Body::Json(serde_json::to_vec(body)?));
        Ok(self)
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = Some(Body::Multipart(form));
        self
    }

    fn build(self) -> Result<RequestBuilder, AuthError> {
        let mut url = Url::parse(&self.client.url(&self.path))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        let mut req = self.client.http_client.request(self.method, url);

        if let Some(token) = self.client.session.token() {
            req = req.bearer_auth(token);
        }

        req = match self.body {
            Some(Body::Json(bytes)) => req.header("Content-Type", "application/json").body(bytes),
            Some(Body::Multipart(form)) => req.multipart(form),
            None => req,
        };

        Ok(req)
    }

    /// Sends the request and returns the raw response. A 401 logs the session
    /// out before returning.
    pub async fn send(self) -> Result<Response, AuthError> {
        let session = self.client.session.clone();
        let description = format!("{} {}", self.method, self.path);

        let response = self.build()?.send().await?;
        debug!("{} -> {}", description, response.status());

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("{} rejected with 401, ending session", description);
            session.logout_with(LogoutReason::Rejected);
        }

        Ok(response)
    }

    /// Sends the request and parses a successful JSON response
    pub async fn execute<T: DeserializeOwned>(self) -> Result<T, AuthError> {
        let response = self.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::api(status.as_u16(), error_text, "Request failed"));
        }

        Ok(response.json::<T>().await?)
    }

    /// Sends the request and parses the JSON envelope whatever the HTTP
    /// status, since the backend reports outcomes in the body
    pub async fn envelope(self) -> Result<Envelope, AuthError> {
        let response = self.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }

        let text = response.text().await?;
        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(AuthError::SerializationError(e)),
            Err(_) => Err(AuthError::api(status.as_u16(), text, "Request failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_decode() {
        let env: Envelope = serde_json::from_value(json!({
            "status": 200,
            "response": "OK",
            "data": [1, 2, 3]
        }))
        .unwrap();
        let data: Vec<u32> = env.decode().unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn test_envelope_messages() {
        let env: Envelope =
            serde_json::from_value(json!({"status": 400, "data": "email already used"})).unwrap();
        assert_eq!(env.message_or("fallback"), "email already used");

        let env: Envelope =
            serde_json::from_value(json!({"status": 500, "response": "Internal"})).unwrap();
        assert_eq!(env.message_or("fallback"), "Internal");

        let env: Envelope = serde_json::from_value(json!({"status": 500})).unwrap();
        match env.expect_status(200, "fallback") {
            Err(AuthError::ApiError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "fallback");
            }
            other => panic!("unexpected {:?}", other.map(|e| e.status)),
        }
    }
}
