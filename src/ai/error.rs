use serde_json::Value;

/// Failure reported by a [`Transport`](super::Transport).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    /// The request went out but nothing came back (connect failure, timeout).
    #[error("no response received")]
    NoResponse,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            TransportError::NoResponse
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// User-facing error for a chat send. The `Display` text is what the front
/// end shows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid API key or expired")]
    Auth,

    #[error("No permission to access API")]
    Permission,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Server error, please try again later")]
    Server { status: u16 },

    #[error("{message}")]
    MalformedRequest { status: u16, message: String },

    #[error("Cannot connect to server. Please check your internet connection")]
    NoConnection,

    #[error("{0}")]
    Unknown(String),

    #[error("Message must contain text or at least one image")]
    EmptyMessage,

    #[error("No API key configured")]
    MissingApiKey,
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Failures that no resend can fix.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, ChatError::Auth | ChatError::Permission)
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ChatError::Auth,
            403 => ChatError::Permission,
            429 => ChatError::RateLimited,
            s if s >= 500 => ChatError::Server { status: s },
            s => ChatError::MalformedRequest {
                status: s,
                message: client_error_message(s, body),
            },
        }
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Server { status, body } => ChatError::from_status(status, &body),
            TransportError::NoResponse => ChatError::NoConnection,
            TransportError::Other(message) if message.trim().is_empty() => {
                ChatError::Unknown("An error occurred while sending the message".to_string())
            }
            TransportError::Other(message) => ChatError::Unknown(message),
        }
    }
}

/// Prefer the body's `error` field, then `message`, for 4xx responses.
fn client_error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| -> Option<String> {
        match parsed.as_ref()?.get(name)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    };

    if let Some(error) = field("error") {
        return error;
    }
    let detail = field("message").unwrap_or_else(|| "Unknown".to_string());
    format!("Error {status}: {detail}")
}
