//! Failure taxonomy surfaced to the player

use super::bili_api::Classified;

/// Why a remote resolution failed
///
/// Every variant keeps the underlying message for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Malformed id, page or keyword; never retried
    InvalidInput(String),
    /// The resource does not exist or has no playable stream
    NotFound(String),
    /// The remote is throttling this client
    RateLimited(String),
    /// Network or transport failure
    Transient(String),
    /// Anything uncategorised, raw detail preserved
    Unexpected(String),
}

/// What the player should tell the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserHint {
    TryAgain,
    NotAvailable,
    RateLimitedWait,
}

impl ResolveError {
    pub fn message(&self) -> &str {
        match self {
            ResolveError::InvalidInput(m)
            | ResolveError::NotFound(m)
            | ResolveError::RateLimited(m)
            | ResolveError::Transient(m)
            | ResolveError::Unexpected(m) => m,
        }
    }

    pub fn user_hint(&self) -> UserHint {
        match self {
            ResolveError::InvalidInput(_) | ResolveError::NotFound(_) => UserHint::NotAvailable,
            ResolveError::RateLimited(_) => UserHint::RateLimitedWait,
            ResolveError::Transient(_) | ResolveError::Unexpected(_) => UserHint::TryAgain,
        }
    }

    /// Whether a metadata lookup may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::RateLimited(_) | ResolveError::Transient(_))
    }

    /// Map an in-body API status code to a failure class
    pub fn from_api_code(code: i64, message: String) -> Self {
        let message = format!("API code {}: {}", code, message);
        match code {
            -404 | 62002 | 62004 | 62012 => ResolveError::NotFound(message),
            -400 => ResolveError::InvalidInput(message),
            -412 | -352 => ResolveError::RateLimited(message),
            _ => ResolveError::Unexpected(message),
        }
    }
}

impl From<Classified> for ResolveError {
    /// Failure class for a non-`Ok` classification
    fn from(classified: Classified) -> Self {
        match classified {
            Classified::Ok(_) => {
                ResolveError::Unexpected("successful response treated as failure".to_string())
            }
            Classified::RateLimited => {
                ResolveError::RateLimited("request was rate limited (HTTP 412)".to_string())
            }
            Classified::MalformedBody(m) => {
                ResolveError::Unexpected(format!("malformed response body: {}", m))
            }
            Classified::NetworkError(m) => ResolveError::Transient(m),
            Classified::ApiError { code, message } => ResolveError::from_api_code(code, message),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::InvalidInput(m) => write!(f, "Invalid input: {}", m),
            ResolveError::NotFound(m) => write!(f, "Not found: {}", m),
            ResolveError::RateLimited(m) => write!(f, "Rate limited, try again later: {}", m),
            ResolveError::Transient(m) => write!(f, "Network error: {}", m),
            ResolveError::Unexpected(m) => write!(f, "Unexpected error: {}", m),
        }
    }
}

impl std::error::Error for ResolveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_code_mapping() {
        assert!(matches!(
            ResolveError::from_api_code(-404, "啥都木有".into()),
            ResolveError::NotFound(_)
        ));
        assert!(matches!(
            ResolveError::from_api_code(62002, "稿件不可见".into()),
            ResolveError::NotFound(_)
        ));
        assert!(matches!(
            ResolveError::from_api_code(-400, "请求错误".into()),
            ResolveError::InvalidInput(_)
        ));
        assert!(matches!(
            ResolveError::from_api_code(-352, "风控校验失败".into()),
            ResolveError::RateLimited(_)
        ));
        assert!(matches!(
            ResolveError::from_api_code(-1, "?".into()),
            ResolveError::Unexpected(_)
        ));
    }

    #[test]
    fn test_from_classified_keeps_message() {
        let err = ResolveError::from(Classified::NetworkError("connection reset".into()));
        assert_eq!(err, ResolveError::Transient("connection reset".into()));
        assert_eq!(err.user_hint(), UserHint::TryAgain);

        let err = ResolveError::from(Classified::MalformedBody("text/html".into()));
        assert!(err.message().contains("text/html"));
    }

    #[test]
    fn test_user_hints() {
        assert_eq!(
            ResolveError::RateLimited(String::new()).user_hint(),
            UserHint::RateLimitedWait
        );
        assert_eq!(
            ResolveError::NotFound(String::new()).user_hint(),
            UserHint::NotAvailable
        );
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ResolveError::RateLimited(String::new()).is_retryable());
        assert!(ResolveError::Transient(String::new()).is_retryable());
        assert!(!ResolveError::NotFound(String::new()).is_retryable());
        assert!(!ResolveError::InvalidInput(String::new()).is_retryable());
        assert!(!ResolveError::Unexpected(String::new()).is_retryable());
    }
}
