//! Standardized messages for registry HTTP failures

use reqwest::StatusCode;

/// Describes non-success registry responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Describe a failed registry call for the given operation
    pub fn describe_status(status: StatusCode, error_text: &str, operation: &str) -> String {
        let error_text = Self::truncate(error_text);
        match status.as_u16() {
            401 => format!("Unauthorized to perform {} (status 401): {}", operation, error_text),
            403 => format!(
                "Forbidden: insufficient permissions for {} (status 403): {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {} (status 404): {}", operation, error_text),
            413 => format!("Payload too large for {} (status 413): {}", operation, error_text),
            429 => format!("Rate limited during {} (status 429): {}", operation, error_text),
            500 => format!("Registry server error during {} (status 500): {}", operation, error_text),
            502 | 503 => format!(
                "Registry unavailable for {} (status {}): {}",
                operation, status.as_u16(), error_text
            ),
            _ => format!("{} failed (status {}): {}", operation, status.as_u16(), error_text),
        }
    }

    /// Describe a failed token service call
    pub fn describe_auth_status(status: StatusCode, error_text: &str) -> String {
        match status.as_u16() {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!(
                "Token request failed (status {}): {}",
                status.as_u16(),
                Self::truncate(error_text)
            ),
        }
    }

    fn truncate(text: &str) -> &str {
        const MAX: usize = 512;
        if text.len() <= MAX {
            return text.trim();
        }
        let mut end = MAX;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].trim()
    }
}

/// Network error categorization
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format transport errors with the failing operation
    pub fn describe(error: &reqwest::Error, context: &str) -> String {
        if error.is_timeout() {
            format!("{} timeout: {}", context, error)
        } else if error.is_connect() {
            format!("Connection error during {}: {}", context, error)
        } else if error.to_string().contains("certificate") {
            format!("TLS certificate error during {}: {}", context, error)
        } else {
            format!("{} network error: {}", context, error)
        }
    }
}
