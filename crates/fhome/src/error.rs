//! CLI error types with miette diagnostics.
//!
//! Maps `fhome_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fhome_api::Error as ApiError;
use fhome_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {endpoint}")]
    #[diagnostic(
        code(fhome::connection_failed),
        help(
            "Check your network connection and the endpoint.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Connection to the service was lost")]
    #[diagnostic(
        code(fhome::connection_lost),
        help("The service dropped the connection. Run the command again.")
    )]
    ConnectionLost,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed during {stage}: {message}")]
    #[diagnostic(
        code(fhome::auth_failed),
        help("Verify your email, account password and resource password.")
    )]
    AuthFailed { stage: String, message: String },

    #[error("{field} is not configured")]
    #[diagnostic(
        code(fhome::no_credentials),
        help(
            "Set {env}, or add `{field}` to {path}"
        )
    )]
    MissingCredentials {
        field: String,
        env: String,
        path: String,
    },

    // ── Objects ──────────────────────────────────────────────────────
    #[error("No object matches '{identifier}'")]
    #[diagnostic(
        code(fhome::not_found),
        help("Run: fhome config list to see available objects")
    )]
    NotFound { identifier: String },

    // ── Service ──────────────────────────────────────────────────────
    #[error("Service rejected {action}: {status}")]
    #[diagnostic(code(fhome::remote_error))]
    Remote { action: String, status: String },

    #[error("Unexpected response from the service: {message}")]
    #[diagnostic(code(fhome::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fhome::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(fhome::config))]
    Config(Box<figment::Error>),

    // ── Interrupted ──────────────────────────────────────────────────
    #[error("Interrupted")]
    #[diagnostic(code(fhome::cancelled))]
    Cancelled,

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::MissingCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Cancelled => exit_code::CANCELLED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::ConnectFailed { endpoint, reason } => Self::ConnectionFailed { endpoint, reason },
            ApiError::UnexpectedGreeting { action_name, status } => Self::Protocol {
                message: format!(
                    "greeting {action_name:?} with status {}",
                    status.as_deref().unwrap_or("(none)")
                ),
            },
            ApiError::StreamClosed | ApiError::Transport(_) => Self::ConnectionLost,
            ApiError::AuthenticationFailed { stage, message } => Self::AuthFailed {
                stage: stage.into(),
                message,
            },
            err @ (ApiError::NotAuthenticated { .. } | ApiError::AlreadyAuthenticated { .. }) => {
                Self::AuthFailed {
                    stage: "session".into(),
                    message: err.to_string(),
                }
            }
            ApiError::RemoteError {
                action_name,
                status,
            } => Self::Remote {
                action: action_name,
                status,
            },
            ApiError::Parse { message } => Self::Protocol { message },
            ApiError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::MissingField { field, env } => Self::MissingCredentials {
                field: field.into(),
                env: env.into(),
                path: fhome_config::config_path().display().to_string(),
            },
            ConfigError::Figment(err) => Self::Config(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let connect: CliError = ApiError::ConnectFailed {
            endpoint: "wss://fhome.cloud/webapp-interface/".into(),
            reason: "timed out".into(),
        }
        .into();
        assert_eq!(connect.exit_code(), exit_code::CONNECTION);

        let auth: CliError = ApiError::AuthenticationFailed {
            stage: "cloud login",
            message: "invalid".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing: CliError = ConfigError::MissingField {
            field: "email",
            env: "FHOME_EMAIL",
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::AUTH);

        assert_eq!(
            CliError::from(ApiError::Cancelled).exit_code(),
            exit_code::CANCELLED
        );
        assert_eq!(
            CliError::from(ApiError::StreamClosed).exit_code(),
            exit_code::CONNECTION
        );
    }
}
