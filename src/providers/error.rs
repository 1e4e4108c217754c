use std::fmt;

/// Classified semantic-service error — tells the caller *why* the call
/// failed so its degradation policy can log something useful.
#[derive(Debug)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// 401/403 — bad API key or permissions.
    Auth,
    /// 429 — rate limited.
    RateLimit,
    /// 408 or the bounded request timeout elapsed.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504 — provider-side outage.
    ServerError,
    /// Anything else.
    Unknown,
}

impl SemanticError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => SemanticErrorKind::Auth,
            408 => SemanticErrorKind::Timeout,
            429 => SemanticErrorKind::RateLimit,
            500 | 502 | 503 | 504 => SemanticErrorKind::ServerError,
            _ => SemanticErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            SemanticErrorKind::Timeout
        } else {
            SemanticErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "semantic service error ({:?}, HTTP {}): {}",
                self.kind, status, self.message
            ),
            None => write!(f, "semantic service error ({:?}): {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SemanticError {}

/// Keep error bodies short enough to log without flooding.
fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 300 {
        return trimmed.to_string();
    }
    let mut end = 300;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
