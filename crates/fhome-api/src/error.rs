use thiserror::Error;

use crate::auth::SessionState;

/// Top-level error type for the `fhome-api` crate.
///
/// Covers every failure mode of the protocol client: dialing, the login
/// sequence, correlated requests, payload decoding, and connection teardown.
/// The `fhome` binary maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Dial or WebSocket handshake failed.
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// The service opened the socket with something other than the
    /// `authentication_required` greeting.
    #[error("Unexpected greeting: action {action_name:?}, status {status:?}")]
    UnexpectedGreeting {
        action_name: String,
        status: Option<String>,
    },

    /// Writing a frame to a live socket failed.
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    /// The router observed a transport failure (or the connection was
    /// closed) and released every pending waiter.
    #[error("Connection stream closed")]
    StreamClosed,

    // ── Authentication ──────────────────────────────────────────────
    /// A login stage received a non-ok status.
    #[error("Authentication failed during {stage}: {message}")]
    AuthenticationFailed {
        stage: &'static str,
        message: String,
    },

    /// An operation was attempted before the session reached the state it
    /// requires.
    #[error("`{operation}` requires {required}, but the session is {state}")]
    NotAuthenticated {
        operation: &'static str,
        required: SessionState,
        state: SessionState,
    },

    /// A login stage was run a second time.
    #[error("`{operation}` already completed (session is {state})")]
    AlreadyAuthenticated {
        operation: &'static str,
        state: SessionState,
    },

    // ── Protocol ────────────────────────────────────────────────────
    /// The service answered a correlated request with a non-ok status.
    #[error("Service returned status {status:?} for {action_name}")]
    RemoteError { action_name: String, status: String },

    /// Malformed hex value, display string, frame, or embedded document.
    #[error("Parse error: {message}")]
    Parse { message: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The cancellation signal fired while waiting; the client is shutting
    /// down.
    #[error("Client is shutting down")]
    Cancelled,
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Returns `true` if the underlying connection is gone and the whole
    /// login sequence has to be repeated on a new connection pair.
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, Self::StreamClosed | Self::Transport(_))
    }

    /// Returns `true` if this error came out of the login sequence.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::NotAuthenticated { .. }
                | Self::UnexpectedGreeting { .. }
        )
    }

    /// The status string the service sent, if this is a remote error.
    pub fn remote_status(&self) -> Option<&str> {
        match self {
            Self::RemoteError { status, .. } => Some(status),
            Self::AuthenticationFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stream_closed_predicate() {
        assert!(Error::StreamClosed.is_stream_closed());
        assert!(Error::Transport("broken pipe".into()).is_stream_closed());
        assert!(!Error::Cancelled.is_stream_closed());
    }

    #[test]
    fn remote_status_is_exposed() {
        let err = Error::RemoteError {
            action_name: "xevent".into(),
            status: "invalid cell".into(),
        };
        assert_eq!(err.remote_status(), Some("invalid cell"));
        assert!(Error::Cancelled.remote_status().is_none());
    }

    #[test]
    fn not_authenticated_message_names_states() {
        let err = Error::NotAuthenticated {
            operation: "send_device_event",
            required: SessionState::ResourceAuthenticated,
            state: SessionState::CloudAuthenticated,
        };
        let text = err.to_string();
        assert!(text.contains("send_device_event"), "{text}");
        assert!(text.contains("resource-authenticated"), "{text}");
        assert!(text.contains("cloud-authenticated"), "{text}");
        assert!(err.is_auth_failure());
    }
}
