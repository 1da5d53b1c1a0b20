// Login sequence
//
// Three strictly ordered stages: cloud login on the setup connection,
// resource discovery on the same connection, then a resource session on a
// fresh connection. Each stage requires the previous one and records one
// piece of session identity, at most once.

use std::fmt;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::client::Client;
use crate::connection::ConnectionRole;
use crate::error::Error;
use crate::messages::{
    GetMyResources, OpenClientSession, OpenClientToResourceSession, action,
};
use crate::models::{MyResources, Resource};

const RESOURCE_PASSWORD_SALT: &[u8] = b"fhome123";
const RESOURCE_PASSWORD_ROUNDS: u32 = 10_000;
const RESOURCE_PASSWORD_KEY_LEN: usize = 32;

// ── Session state ────────────────────────────────────────────────────

/// Where the client is in the login sequence. Ordered: each state implies
/// every earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    Unauthenticated,
    CloudAuthenticated,
    ResourceDiscovered,
    ResourceAuthenticated,
}

/// Identity recorded by the login stages. Every field is written once.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub email: OnceLock<String>,
    pub resource_id: OnceLock<String>,
    pub password_hash: OnceLock<SecretString>,
}

impl Session {
    pub(crate) fn state(&self) -> SessionState {
        if self.password_hash.get().is_some() {
            SessionState::ResourceAuthenticated
        } else if self.resource_id.get().is_some() {
            SessionState::ResourceDiscovered
        } else if self.email.get().is_some() {
            SessionState::CloudAuthenticated
        } else {
            SessionState::Unauthenticated
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// Everything the full login needs.
pub struct Credentials {
    pub email: String,
    /// Account password, sent as-is during cloud login.
    pub cloud_password: SecretString,
    /// Password of the resource; only its derived hash goes on the wire.
    pub resource_password: SecretString,
}

impl Credentials {
    pub fn new(
        email: impl Into<String>,
        cloud_password: impl Into<String>,
        resource_password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            cloud_password: SecretString::from(cloud_password.into()),
            resource_password: SecretString::from(resource_password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("cloud_password", &"[REDACTED]")
            .field("resource_password", &"[REDACTED]")
            .finish()
    }
}

/// Derive the hash attached to every authenticated action:
/// base64(PBKDF2-HMAC-SHA1(password, "fhome123", 10000 rounds, 32 bytes)).
pub fn resource_password_hash(resource_password: &SecretString) -> SecretString {
    let mut key = [0u8; RESOURCE_PASSWORD_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(
        resource_password.expose_secret().as_bytes(),
        RESOURCE_PASSWORD_SALT,
        RESOURCE_PASSWORD_ROUNDS,
        &mut key,
    );
    SecretString::from(BASE64.encode(key))
}

/// Map a non-ok login response to an authentication failure.
fn login_failure(stage: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::RemoteError { status, .. } => Error::AuthenticationFailed {
            stage,
            message: status,
        },
        other => other,
    }
}

// ── Stages ───────────────────────────────────────────────────────────

impl Client {
    /// Stage 1: open the setup connection and log in to the cloud.
    ///
    /// The raw account password is sent once, on this request only.
    pub async fn open_cloud_session(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<(), Error> {
        self.require_stage("open_cloud_session", SessionState::Unauthenticated)?;

        let conn = self.open_connection(ConnectionRole::Setup).await?;
        let result = conn
            .request(
                action::OPEN_CLIENT_SESSION,
                |request_token| OpenClientSession {
                    action_name: action::OPEN_CLIENT_SESSION,
                    email,
                    password: password.expose_secret(),
                    request_token,
                },
                self.shutdown_token(),
            )
            .await
            .map_err(login_failure("cloud login"));

        if let Err(e) = result {
            conn.close().await;
            return Err(e);
        }

        if self.session().email.set(email.to_owned()).is_err() {
            conn.close().await;
            return Err(Error::AlreadyAuthenticated {
                operation: "open_cloud_session",
                state: self.state(),
            });
        }
        self.install_setup_connection(conn);
        info!(email, "cloud session open");
        Ok(())
    }

    /// Every resource bound to the account, in the order the service lists
    /// them.
    pub async fn get_my_resources(&self) -> Result<Vec<Resource>, Error> {
        self.require("get_my_resources", SessionState::CloudAuthenticated)?;
        let email = self.login_email().unwrap_or_default();
        let conn = self.setup_connection()?;

        let frame = conn
            .request(
                action::GET_MY_RESOURCES,
                |request_token| GetMyResources {
                    action_name: action::GET_MY_RESOURCES,
                    email,
                    request_token,
                },
                self.shutdown_token(),
            )
            .await
            .map_err(login_failure("resource discovery"))?;

        let resources = frame.payload::<MyResources>()?.resources();
        debug!(count = resources.len(), "resources listed");
        Ok(resources)
    }

    /// Stage 2: pick the account's resource and remember its id.
    ///
    /// Accounts with several resources get the first one listed.
    pub async fn discover_resource(&self) -> Result<Resource, Error> {
        self.require_stage("discover_resource", SessionState::CloudAuthenticated)?;

        let resource = self
            .get_my_resources()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::AuthenticationFailed {
                stage: "resource discovery",
                message: "no resource is bound to this account".into(),
            })?;

        if self
            .session()
            .resource_id
            .set(resource.unique_id.clone())
            .is_err()
        {
            return Err(Error::AlreadyAuthenticated {
                operation: "discover_resource",
                state: self.state(),
            });
        }
        info!(
            resource = %resource.unique_id,
            name = %resource.friendly_name,
            "resource discovered"
        );
        Ok(resource)
    }

    /// Stage 3: open the resource connection and log in to the resource.
    ///
    /// On success the derived password hash is kept for every later action.
    pub async fn open_resource_session(&self, resource_password: &SecretString) -> Result<(), Error> {
        self.require_stage("open_resource_session", SessionState::ResourceDiscovered)?;
        let email = self.login_email().unwrap_or_default();
        let unique_id = self
            .session()
            .resource_id
            .get()
            .map(String::as_str)
            .unwrap_or_default();

        let conn = self.open_connection(ConnectionRole::Resource).await?;
        let result = conn
            .request(
                action::OPEN_CLIENT_TO_RESOURCE_SESSION,
                |request_token| OpenClientToResourceSession {
                    action_name: action::OPEN_CLIENT_TO_RESOURCE_SESSION,
                    email,
                    unique_id,
                    request_token,
                },
                self.shutdown_token(),
            )
            .await
            .map_err(login_failure("resource login"));

        if let Err(e) = result {
            conn.close().await;
            return Err(e);
        }

        let hash = resource_password_hash(resource_password);
        if self.session().password_hash.set(hash).is_err() {
            conn.close().await;
            return Err(Error::AlreadyAuthenticated {
                operation: "open_resource_session",
                state: self.state(),
            });
        }
        self.install_resource_connection(conn);
        info!(resource = unique_id, "resource session open");
        Ok(())
    }

    /// Close the setup connection. It has no further use once the resource
    /// is discovered. Does nothing if it is already closed.
    pub async fn close_setup_connection(&self) {
        if let Some(conn) = self.take_setup_connection() {
            conn.close().await;
        }
    }

    pub(crate) fn resource_credentials(&self, operation: &'static str) -> Result<(&str, &str), Error> {
        self.require(operation, SessionState::ResourceAuthenticated)?;
        let login = self.login_email().unwrap_or_default();
        let hash = self
            .session()
            .password_hash
            .get()
            .map(ExposeSecret::expose_secret)
            .unwrap_or_default();
        Ok((login, hash))
    }

    fn require_stage(&self, operation: &'static str, stage: SessionState) -> Result<(), Error> {
        let state = self.state();
        if state > stage {
            return Err(Error::AlreadyAuthenticated { operation, state });
        }
        self.require(operation, stage)
    }

    pub(crate) fn require(&self, operation: &'static str, required: SessionState) -> Result<(), Error> {
        let state = self.state();
        if state < required {
            return Err(Error::NotAuthenticated {
                operation,
                required,
                state,
            });
        }
        Ok(())
    }
}
