use thiserror::Error;

/// Errors surfaced by the Gemini service layer. Messages are user-facing;
/// the UI shows them verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Gemini API key not configured. Set GEMINI_API_KEY and restart.")]
    MissingApiKey,

    #[error("Too many requests. Please wait a few minutes and try again.")]
    RateLimited,

    #[error("API access denied. Check your API key.")]
    AccessDenied,

    #[error("Invalid request. Try a different message.")]
    BadRequest,

    #[error("Service unavailable ({status}). Try again later.")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    EmptyResponse(String),
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => ApiError::RateLimited,
            403 => ApiError::AccessDenied,
            400 => ApiError::BadRequest,
            code => ApiError::Http { status: code },
        }
    }

    /// Only rate limiting is worth waiting out; everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited | ApiError::Transport(_))
    }
}

/// Errors from local image processing (validation, decode, re-encode).
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Please upload a valid image file (JPEG, PNG, or WebP)")]
    UnsupportedFormat,

    #[error("Image size must be less than 2MB")]
    TooLarge,

    #[error("Failed to process image: {0}")]
    Codec(#[from] image::ImageError),

    #[error("Not a base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Not a data URL")]
    MalformedDataUrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_known_codes() {
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::FORBIDDEN),
            ApiError::AccessDenied
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::BAD_REQUEST),
            ApiError::BadRequest
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Http { status: 500 }
        ));
    }

    #[test]
    fn only_rate_limit_is_retryable_among_http_errors() {
        assert!(ApiError::RateLimited.is_retryable());
        assert!(!ApiError::AccessDenied.is_retryable());
        assert!(!ApiError::Http { status: 503 }.is_retryable());
    }
}
