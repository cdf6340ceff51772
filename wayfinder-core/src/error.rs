use thiserror::Error;

/// Unified error type for Wayfinder.
///
/// Each variant corresponds to one of the error kinds named in the
/// propagation policy: retrieval-layer errors always surface from
/// `request`; verification-layer errors surface only in strict mode.
#[derive(Error, Debug)]
pub enum WayfinderError {
    #[error("invalid ar:// input: {0}")]
    InvalidUrl(String),

    #[error("no gateway available: {0}")]
    NoGatewayAvailable(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("verification failed: {reason}")]
    VerificationFailed {
        reason: String,
        #[source]
        cause: Option<Box<WayfinderError>>,
    },

    #[error("verification skipped: {0}")]
    VerificationSkipped(String),

    #[error("manifest error: {0}")]
    ManifestError(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WayfinderError {
    pub fn verification_failed(reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn verification_failed_with(reason: impl Into<String>, cause: WayfinderError) -> Self {
        Self::VerificationFailed {
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Map to the HTTP status a host application would surface to its own caller.
    pub fn status_code(&self) -> u16 {
        match self {
            WayfinderError::InvalidUrl(_) => 400,
            WayfinderError::NoGatewayAvailable(_) => 503,
            WayfinderError::NetworkError(_) => 502,
            WayfinderError::VerificationFailed { .. } => 409,
            WayfinderError::VerificationSkipped(_) => 200,
            WayfinderError::ManifestError(_) => 422,
            WayfinderError::Cancelled => 499,
            WayfinderError::Http(_) => 502,
            WayfinderError::Serde(_) => 422,
            WayfinderError::Io(_) => 500,
        }
    }

    pub fn to_json_body(&self) -> Vec<u8> {
        let status = self.status_code();
        let msg = self.to_string();
        serde_json::json!({ "error": msg, "status": status })
            .to_string()
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WayfinderError::InvalidUrl("x".into()).status_code(), 400);
        assert_eq!(
            WayfinderError::NoGatewayAvailable("x".into()).status_code(),
            503
        );
        assert_eq!(
            WayfinderError::verification_failed("mismatch").status_code(),
            409
        );
        assert_eq!(
            WayfinderError::ManifestError("bad schema".into()).status_code(),
            422
        );
        assert_eq!(WayfinderError::Cancelled.status_code(), 499);
    }

    #[test]
    fn test_verification_failed_with_cause_displays_reason() {
        let cause = WayfinderError::NetworkError("timeout".into());
        let err = WayfinderError::verification_failed_with("digest mismatch", cause);
        assert_eq!(err.to_string(), "verification failed: digest mismatch");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_json_body_is_valid_json() {
        let err = WayfinderError::NoGatewayAvailable("all providers exhausted".into());
        let body = err.to_json_body();
        let parsed: serde_json::Value =
            serde_json::from_slice(&body).expect("to_json_body must produce valid JSON");
        assert_eq!(parsed["status"], 503);
        assert!(parsed["error"].as_str().is_some());
    }
}
