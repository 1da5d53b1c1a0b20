// Wire envelope types
//
// Every frame on either connection is a single JSON object. Inbound frames
// are decoded once into a `Frame` (envelope fields only) and keep their raw
// text so a caller can re-decode the action-specific payload later.

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Action names used by the service.
pub mod action {
    /// Greeting the service sends right after the socket opens.
    pub const AUTHENTICATION_REQUIRED: &str = "authentication_required";
    /// Cloud login with email + raw password.
    pub const OPEN_CLIENT_SESSION: &str = "open_client_session";
    /// Lists the controllers ("resources") bound to the account.
    pub const GET_MY_RESOURCES: &str = "get_my_resources";
    /// Opens a session against a single resource.
    pub const OPEN_CLIENT_TO_RESOURCE_SESSION: &str = "open_client_to_resource_session";
    /// Per-cell display metadata set in the configurator app.
    pub const TOUCHES: &str = "touches";
    /// Panel/cell layout set in the web or mobile app.
    pub const GET_USER_CONFIG: &str = "get_user_config";
    /// Sends a value to a cell.
    pub const XEVENT: &str = "xevent";
    /// Snapshot of every cell's current value.
    pub const STATUS_TOUCHES: &str = "statustouches";
    /// Unsolicited push carrying the values of changed cells.
    pub const STATUS_TOUCHES_CHANGED: &str = "statustoucheschanged";
    /// Sent by the service before it drops the connection.
    pub const DISCONNECTING: &str = "disconnecting";
}

/// Status value of a successful response.
pub const STATUS_OK: &str = "ok";

/// Value type attached to every `xevent`.
const EVENT_VALUE_TYPE: &str = "HEX";

// ── Inbound ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    action_name: String,
    #[serde(default)]
    request_token: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// A decoded inbound frame.
///
/// Immutable once decoded. The router shares one `Arc<Frame>` between every
/// waiter it delivers to.
#[derive(Debug, Clone)]
pub struct Frame {
    pub action_name: String,
    pub request_token: Option<String>,
    /// `"ok"`, an error description, or absent for pushes.
    pub status: Option<String>,
    pub source: Option<String>,
    /// Set on `disconnecting` frames.
    pub details: Option<String>,
    /// Set on `disconnecting` frames.
    pub reason: Option<String>,
    raw: Bytes,
}

impl Frame {
    /// Decode the envelope fields of a raw JSON frame.
    pub fn decode(raw: Bytes) -> Result<Self, Error> {
        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|e| Error::parse(format!("malformed frame: {e}")))?;
        Ok(Self {
            action_name: envelope.action_name,
            request_token: envelope.request_token,
            status: envelope.status,
            source: envelope.source,
            details: envelope.details,
            reason: envelope.reason,
            raw,
        })
    }

    /// Re-decode the full frame into an action-specific payload type.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.raw).map_err(|e| {
            Error::parse(format!(
                "unexpected {} payload: {e}",
                self.action_name
            ))
        })
    }

    /// The undecoded frame text.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The frame as a generic JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, Error> {
        self.payload()
    }

    /// The status, if present and anything other than `"ok"`.
    pub fn error_status(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| *s != STATUS_OK)
    }

    /// Whether this is the greeting every fresh connection starts with:
    /// the right action name and an empty status.
    pub fn is_greeting(&self) -> bool {
        self.action_name == action::AUTHENTICATION_REQUIRED
            && self.status.as_deref().is_none_or(str::is_empty)
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Cloud login. The only request that carries the raw account password.
#[derive(Debug, Serialize)]
pub(crate) struct OpenClientSession<'a> {
    pub action_name: &'static str,
    pub email: &'a str,
    pub password: &'a str,
    pub request_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetMyResources<'a> {
    pub action_name: &'static str,
    pub email: &'a str,
    pub request_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenClientToResourceSession<'a> {
    pub action_name: &'static str,
    pub email: &'a str,
    pub unique_id: &'a str,
    pub request_token: String,
}

/// Authenticated action without cell-specific fields. `password` is the
/// derived resource password hash.
#[derive(Debug, Serialize)]
pub(crate) struct Action<'a> {
    pub action_name: &'a str,
    pub login: &'a str,
    pub password: &'a str,
    pub request_token: String,
}

/// Authenticated `xevent` carrying a hex value for one cell.
#[derive(Debug, Serialize)]
pub(crate) struct Event<'a> {
    pub action_name: &'static str,
    pub login: &'a str,
    pub password: &'a str,
    pub request_token: String,
    pub cell_id: String,
    pub value: &'a str,
    #[serde(rename = "type")]
    pub value_type: &'static str,
}

impl<'a> Event<'a> {
    pub(crate) fn new(
        login: &'a str,
        password: &'a str,
        request_token: String,
        cell_id: u32,
        value: &'a str,
    ) -> Self {
        Self {
            action_name: action::XEVENT,
            login,
            password,
            request_token,
            cell_id: cell_id.to_string(),
            value,
            value_type: EVENT_VALUE_TYPE,
        }
    }
}
