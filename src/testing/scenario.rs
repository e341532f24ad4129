//! Alba-style HTTP scenarios for webhook endpoints
//!
//! Requests run in-process against the router; no server is started.
//!
//! ```rust,ignore
//! use tidehook::testing;
//! use tidehook::webhooks::SignatureAlgorithm;
//!
//! #[tokio::test]
//! async fn test_push_is_dispatched() {
//!     let app = build_app().into_test_router();
//!
//!     testing::post(app, "/webhooks/incoming/github")
//!         .header("X-Github-Event", "push")
//!         .raw_body(r#"{"ref":"refs/heads/main"}"#)
//!         .signed("X-Hub-Signature", SignatureAlgorithm::Sha1, "s3cr3t_16_bytes!")
//!         .execute()
//!         .await
//!         .assert_ok()
//!         .assert_json_field("status", serde_json::json!("dispatched"));
//! }
//! ```

use crate::webhooks::{SignatureAlgorithm, SignatureVerifier};
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header},
};
use serde::{Serialize, de::DeserializeOwned};
use tower::ServiceExt;

/// Produce the `<tag>=<hex>` signature header value for `body`
pub fn sign(algorithm: SignatureAlgorithm, secret: &str, body: &[u8]) -> String {
    format!("{}={}", algorithm.tag(), hex::encode(algorithm.compute(secret.as_bytes(), body)))
}

/// Test scenario builder for a single webhook delivery
pub struct Scenario {
    app: Router,
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Scenario {
    /// Create a new test scenario with the given app
    pub fn new(app: Router) -> Self {
        Self {
            app,
            method: Method::GET,
            uri: "/".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    /// Add a header, keeping any earlier value under the same name
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.append(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Set the body exactly as given
    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set JSON body from a serializable type
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Bytes::from(serde_json::to_vec(body).unwrap());
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// Sign the current body with `secret` and set it as `signature_header`
    ///
    /// Call after the body is set; later body changes are not re-signed.
    pub fn signed(self, signature_header: &str, algorithm: SignatureAlgorithm, secret: &str) -> Self {
        let signature = sign(algorithm, secret, &self.body);
        self.header(signature_header, &signature)
    }

    /// Same as [`Scenario::signed`], using a receiver's verifier
    pub fn signed_by(self, verifier: &SignatureVerifier, secret: &str) -> Self {
        let signature = verifier.sign(secret.as_bytes(), &self.body);
        let header = verifier.header().to_string();
        self.header(&header, &signature)
    }

    /// Execute the request and get an assertion builder
    pub async fn execute(self) -> ScenarioAssert {
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .body(Body::from(self.body))
            .unwrap();
        *request.headers_mut() = self.headers;

        let response = self.app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        ScenarioAssert {
            status,
            headers,
            body,
        }
    }
}

/// Assertion builder for test responses
pub struct ScenarioAssert {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ScenarioAssert {
    /// Assert the response status code
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Assert status is 200 OK
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    /// Assert status is 400 Bad Request
    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    /// Assert status is 401 Unauthorized
    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    /// Assert status is 404 Not Found
    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    /// Assert status is 405 Method Not Allowed
    pub fn assert_method_not_allowed(self) -> Self {
        self.assert_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// Assert status is 500 Internal Server Error
    pub fn assert_server_error(self) -> Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Assert a header exists with the given value
    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .headers
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    /// Assert a JSON field equals a value (dot notation, e.g. "error")
    pub fn assert_json_field(self, path: &str, expected: serde_json::Value) -> Self {
        let json: serde_json::Value = self.json();
        let actual = json_path_get(&json, path)
            .unwrap_or_else(|| panic!("Path '{}' not found in JSON: {}", path, json));
        assert_eq!(actual, &expected, "JSON path '{}' value mismatch", path);
        self
    }

    /// Assert the response body contains the given text
    pub fn assert_contains(self, text: &str) -> Self {
        let body = self.body_string();
        assert!(
            body.contains(text),
            "Response body does not contain '{}'. Body: {}",
            text,
            body
        );
        self
    }

    /// Assert the response body does not contain the given text
    pub fn assert_not_contains(self, text: &str) -> Self {
        let body = self.body_string();
        assert!(
            !body.contains(text),
            "Response body unexpectedly contains '{}'. Body: {}",
            text,
            body
        );
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the JSON response body into a type
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }
}

/// Simple JSON path getter (dot notation like "data.name", numeric parts index arrays)
fn json_path_get<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

/// Convenience function to create a POST request scenario
pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}

/// Convenience function to create a GET request scenario
pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}
