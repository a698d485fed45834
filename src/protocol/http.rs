//! HTTP REST API protocol
//!
//! - `POST /vectorize`: `{"text": "..."}` or `{"text": ["...", "..."]}`,
//!   answered with `{"vector": [[...]], "dimensions": n, "model": "..."}`
//! - `GET /health`: `{"status": "ok", "model": "..."}`
//! - errors: `{"detail": "...", "code": "..."}`

use serde::{Deserialize, Serialize};

use crate::models::TextInput;

/// Body of `POST /vectorize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeRequest {
    pub text: TextInput,
}

impl VectorizeRequest {
    /// Parse and shape-check a request body
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        // serde would also accept a positional array for the struct
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("request body must be a JSON object"));
        }
        serde_json::from_value(value)
    }
}

/// HTTP Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Human-readable message
    pub detail: String,

    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl HttpErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn unreadable_body() -> Self {
        Self::new("Failed to read request body").with_code("UNREADABLE_BODY")
    }

    /// Body is not JSON, or not `{"text": string | [string]}`
    pub fn validation(error: &serde_json::Error) -> Self {
        let detail = if error.is_syntax() || error.is_eof() {
            format!("Invalid JSON: {}", error)
        } else {
            format!(
                "Invalid request body: \"text\" must be a string or a list of strings ({})",
                error
            )
        };
        Self::new(detail).with_code("VALIDATION_ERROR")
    }

    /// The service failed to vectorize; `detail` carries the cause
    pub fn vectorization_failed(detail: impl Into<String>) -> Self {
        Self::new(detail).with_code("VECTORIZATION_FAILED")
    }

    pub fn not_found() -> Self {
        Self::new("Not Found").with_code("NOT_FOUND")
    }

    pub fn method_not_allowed() -> Self {
        Self::new("Method Not Allowed").with_code("METHOD_NOT_ALLOWED")
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

impl HealthResponse {
    pub fn ok(model: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shapes() {
        let req = VectorizeRequest::from_slice(br#"{"text": "hello"}"#).unwrap();
        assert_eq!(req.text, TextInput::Single("hello".to_string()));

        let req = VectorizeRequest::from_slice(br#"{"text": ["a", ""], "extra": 1}"#).unwrap();
        assert_eq!(
            req.text,
            TextInput::Batch(vec!["a".to_string(), String::new()])
        );

        for bad in [
            &br#"{"text": 123}"#[..],
            br#"{"text": null}"#,
            br#"{"text": ["a", 2]}"#,
            br#"{"texts": ["a"]}"#,
            br#"["a"]"#,
        ] {
            let err = VectorizeRequest::from_slice(bad).unwrap_err();
            assert!(err.is_data(), "{}", String::from_utf8_lossy(bad));
        }

        let err = VectorizeRequest::from_slice(b"{not json").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_value(HttpErrorResponse::vectorization_failed("boom")).unwrap();
        assert_eq!(json["detail"], "boom");
        assert_eq!(json["code"], "VECTORIZATION_FAILED");

        let json = serde_json::to_value(HttpErrorResponse::new("plain")).unwrap();
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_validation_messages() {
        let err = VectorizeRequest::from_slice(br#"{"text": 123}"#).unwrap_err();
        let response = HttpErrorResponse::validation(&err);
        assert!(response.detail.starts_with("Invalid request body"));

        let err = VectorizeRequest::from_slice(b"").unwrap_err();
        let response = HttpErrorResponse::validation(&err);
        assert!(response.detail.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_health_response() {
        let json = serde_json::to_string(&HealthResponse::ok("all-MiniLM-L6-v2")).unwrap();
        assert_eq!(json, r#"{"status":"ok","model":"all-MiniLM-L6-v2"}"#);
    }
}
