use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::Application;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Invoked whenever the backend answers 401. Registered by the shell.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    Http { status: u16, message: String },
    Network(String),
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => f.write_str("Unauthorized"),
            ApiError::Http { message, .. } => f.write_str(message),
            ApiError::Network(message) => f.write_str(message),
            ApiError::Decode(message) => write!(f, "invalid response from server: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Data and error travel together: a 400 from `/jobs` can carry both.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: ApiError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn partial(data: T, error: ApiError) -> Self {
        Self {
            data: Some(data),
            error: Some(error),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.error, Some(ApiError::Unauthorized))
    }

    /// Drop any partial data and fail on error.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(ApiError::Decode("empty response".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobsPayload {
    #[serde(default)]
    applications: Vec<Application>,
}

#[derive(Debug, Deserialize)]
struct JobsErrorPayload {
    error: String,
    #[serde(default)]
    applications: Vec<Application>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base: String,
    http: Client,
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base)
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
            on_unauthorized: None,
        })
    }

    pub fn with_unauthorized_handler(mut self, handler: UnauthorizedHandler) -> Self {
        self.on_unauthorized = Some(handler);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn jobs_url(&self, date: Option<&str>) -> Result<Url> {
        let endpoint = format!("{}/jobs", self.base);
        let url = match date {
            Some(date) => Url::parse_with_params(&endpoint, &[("date", date)]),
            None => Url::parse(&endpoint),
        };
        url.with_context(|| format!("Invalid API base URL: {}", self.base))
    }

    pub fn get_jobs(&self, date: Option<&str>) -> ApiResponse<Vec<Application>> {
        let url = match self.jobs_url(date) {
            Ok(url) => url,
            Err(e) => return ApiResponse::failed(ApiError::Network(format!("{:#}", e))),
        };

        match self.send(Method::GET, url.as_str(), None) {
            Ok((status, body)) => {
                let response = interpret_jobs_response(status, &body);
                self.notify(&response);
                response
            }
            Err(error) => ApiResponse::failed(error),
        }
    }

    pub fn check_session(&self) -> ApiResponse<SessionStatus> {
        self.request(Method::GET, "/auth/session", None)
    }

    pub fn login(&self, password: &str) -> ApiResponse<LoginOutcome> {
        let body = serde_json::to_string(&LoginRequest { password }).unwrap_or_default();
        self.request(Method::POST, "/auth/login", Some(body))
    }

    pub fn logout(&self) -> ApiResponse<()> {
        self.request(Method::POST, "/auth/logout", None)
    }

    fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> ApiResponse<T> {
        let url = format!("{}{}", self.base, endpoint);
        match self.send(method, &url, body) {
            Ok((status, text)) => {
                let response = interpret_response(status, &text);
                self.notify(&response);
                response
            }
            Err(error) => ApiResponse::failed(error),
        }
    }

    fn send(&self, method: Method, url: &str, body: Option<String>) -> Result<(u16, String), ApiError> {
        debug!(%method, url, "sending request");
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        debug!(url, status, bytes = text.len(), "received response");
        Ok((status, text))
    }

    fn notify<T>(&self, response: &ApiResponse<T>) {
        if !response.is_unauthorized() {
            return;
        }
        warn!(base = %self.base, "backend rejected the session");
        if let Some(handler) = &self.on_unauthorized {
            handler();
        }
    }
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.message)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// Map a raw status and body to an `ApiResponse`. A 204 decodes as JSON `null`.
pub fn interpret_response<T: DeserializeOwned>(status: u16, body: &str) -> ApiResponse<T> {
    if status == 401 {
        return ApiResponse::failed(ApiError::Unauthorized);
    }
    if !(200..300).contains(&status) {
        return ApiResponse::failed(ApiError::Http {
            status,
            message: error_message(status, body),
        });
    }

    let body = if status == 204 || body.trim().is_empty() { "null" } else { body };
    match serde_json::from_str(body) {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => ApiResponse::failed(ApiError::Decode(e.to_string())),
    }
}

/// `/jobs` variant: a 400 carries an error string alongside partial data.
pub fn interpret_jobs_response(status: u16, body: &str) -> ApiResponse<Vec<Application>> {
    match status {
        401 => ApiResponse::failed(ApiError::Unauthorized),
        400 => match serde_json::from_str::<JobsErrorPayload>(body) {
            Ok(payload) => ApiResponse::partial(
                payload.applications,
                ApiError::Http {
                    status,
                    message: payload.error,
                },
            ),
            Err(e) => ApiResponse::failed(ApiError::Decode(e.to_string())),
        },
        200..=299 => match serde_json::from_str::<JobsPayload>(body) {
            Ok(payload) => ApiResponse::ok(payload.applications),
            Err(e) => ApiResponse::failed(ApiError::Decode(e.to_string())),
        },
        _ => ApiResponse::failed(ApiError::Http {
            status,
            message: error_message(status, body),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// Generation counter for in-flight fetches; only the newest token is current.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: u64,
}

impl RequestSequence {
    pub fn begin(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RECORD: &str = r#"{"id": "1", "company": "Acme", "role": "SRE", "location": "Remote",
        "salary": {"type": "salary", "currency": "USD", "amount": 120000, "displayValue": "$120k"},
        "match": 82, "date": "2026-01-29", "status": "Applied", "tags": []}"#;

    #[test]
    fn test_jobs_ok() {
        let body = format!(r#"{{"applications": [{}]}}"#, RECORD);
        let response = interpret_jobs_response(200, &body);
        assert!(response.error.is_none());
        assert_eq!(response.data.unwrap()[0].company, "Acme");
    }

    #[test]
    fn test_jobs_400_keeps_partial_data() {
        let body = format!(r#"{{"error": "No data for 2026-02-30", "applications": [{}]}}"#, RECORD);
        let response = interpret_jobs_response(400, &body);
        assert_eq!(response.data.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            response.error,
            Some(ApiError::Http {
                status: 400,
                message: "No data for 2026-02-30".to_string()
            })
        );
        assert_eq!(response.error.unwrap().to_string(), "No data for 2026-02-30");
    }

    #[test]
    fn test_jobs_401_and_server_errors() {
        assert!(interpret_jobs_response(401, "").is_unauthorized());

        let response = interpret_jobs_response(503, r#"{"message": "maintenance"}"#);
        assert_eq!(response.error.unwrap().to_string(), "maintenance");

        let response = interpret_jobs_response(500, "<html>oops</html>");
        assert_eq!(response.error.unwrap().to_string(), "HTTP 500");
    }

    #[test]
    fn test_jobs_decode_failure() {
        let response = interpret_jobs_response(200, "not json");
        assert!(matches!(response.error, Some(ApiError::Decode(_))));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_interpret_session_and_logout() {
        let session: ApiResponse<SessionStatus> = interpret_response(200, r#"{"authenticated": true}"#);
        assert_eq!(session.into_result(), Ok(SessionStatus { authenticated: true }));

        let logout: ApiResponse<()> = interpret_response(204, "");
        assert_eq!(logout.into_result(), Ok(()));

        let login: ApiResponse<LoginOutcome> = interpret_response(403, r#"{"message": "Invalid password"}"#);
        assert_eq!(login.into_result().unwrap_err().to_string(), "Invalid password");
    }

    #[test]
    fn test_into_result_prefers_error_over_partial_data() {
        let response = ApiResponse::partial(vec![1, 2], ApiError::Network("down".to_string()));
        assert_eq!(response.into_result(), Err(ApiError::Network("down".to_string())));
    }

    #[test]
    fn test_jobs_url_encodes_date_and_trims_base() {
        let client = ApiClient::new("http://localhost:8787/").unwrap();
        assert_eq!(client.base(), "http://localhost:8787");
        assert_eq!(
            client.jobs_url(None).unwrap().as_str(),
            "http://localhost:8787/jobs"
        );
        assert_eq!(
            client.jobs_url(Some("2026-01-29")).unwrap().as_str(),
            "http://localhost:8787/jobs?date=2026-01-29"
        );
        assert_eq!(
            client.jobs_url(Some("a b&c")).unwrap().as_str(),
            "http://localhost:8787/jobs?date=a+b%26c"
        );
    }

    #[test]
    fn test_unauthorized_handler_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let client = ApiClient::new("http://localhost:8787")
            .unwrap()
            .with_unauthorized_handler(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        client.notify(&interpret_jobs_response(401, ""));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        client.notify(&interpret_jobs_response(500, ""));
        client.notify(&interpret_response::<SessionStatus>(200, r#"{"authenticated": false}"#));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_sequence_rejects_stale_tokens() {
        let mut sequence = RequestSequence::default();
        let first = sequence.begin();
        assert!(sequence.is_current(first));

        let second = sequence.begin();
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
        assert!(second > first);
    }
}
