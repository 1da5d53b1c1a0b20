// Client façade
//
// Owns the two connections, the session identity and the shutdown signal.
// Login stages live in `auth.rs`; this file holds the operations that run
// on an authenticated resource connection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{Credentials, Session, SessionState};
use crate::connection::{ConnectConfig, Connection, ConnectionRole, Connector, FrameListener};
use crate::correlator::Expectation;
use crate::error::Error;
use crate::messages::{Action, Event, Frame, action};
use crate::models::{StatusTouches, SystemConfig, TouchesFrame, UserConfig, UserConfigFrame};
use crate::token::TokenGenerator;

/// Protocol client for one account and one resource.
///
/// Cheap to share behind an `Arc`: every operation takes `&self`, and
/// concurrent requests on the same connection are correlated independently.
pub struct Client {
    connector: Connector,
    tokens: Arc<TokenGenerator>,
    shutdown: CancellationToken,
    session: Session,
    setup: Mutex<Option<Arc<Connection>>>,
    resource: Mutex<Option<Arc<Connection>>>,
}

impl Client {
    /// A client that has not connected yet.
    pub fn new(config: ConnectConfig) -> Self {
        Self::with_token_generator(config, TokenGenerator::from_entropy())
    }

    /// A client drawing request tokens from `tokens`.
    pub fn with_token_generator(config: ConnectConfig, tokens: TokenGenerator) -> Self {
        Self {
            connector: Connector::new(config),
            tokens: Arc::new(tokens),
            shutdown: CancellationToken::new(),
            session: Session::default(),
            setup: Mutex::new(None),
            resource: Mutex::new(None),
        }
    }

    /// Run the whole login sequence and close the setup connection.
    pub async fn connect(config: ConnectConfig, credentials: &Credentials) -> Result<Self, Error> {
        let client = Self::new(config);
        client.login(credentials).await?;
        Ok(client)
    }

    /// Run the three login stages on an unauthenticated client.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), Error> {
        self.open_cloud_session(&credentials.email, &credentials.cloud_password)
            .await?;
        self.discover_resource().await?;
        self.close_setup_connection().await;
        self.open_resource_session(&credentials.resource_password)
            .await
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The email recorded by cloud login.
    pub fn login_email(&self) -> Option<&str> {
        self.session.email.get().map(String::as_str)
    }

    /// The resource id recorded by discovery.
    pub fn resource_id(&self) -> Option<&str> {
        self.session.resource_id.get().map(String::as_str)
    }

    /// The client-wide cancellation signal. Cancelling it makes every
    /// pending and future wait return [`Error::Cancelled`].
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Per-cell display metadata (`touches`).
    pub async fn get_system_configuration(&self) -> Result<SystemConfig, Error> {
        let frame = self.send_action(action::TOUCHES).await?;
        Ok(frame.payload::<TouchesFrame>()?.response)
    }

    /// Panel and cell layout (`get_user_config`). The document arrives as a
    /// JSON string inside the response and is decoded a second time.
    pub async fn get_user_configuration(&self) -> Result<UserConfig, Error> {
        let frame = self.send_action(action::GET_USER_CONFIG).await?;
        let file = frame.payload::<UserConfigFrame>()?.file;
        serde_json::from_str(&file)
            .map_err(|e| Error::parse(format!("malformed user configuration: {e}")))
    }

    /// Current value of every cell (`statustouches`).
    pub async fn status_snapshot(&self) -> Result<StatusTouches, Error> {
        let frame = self.send_action(action::STATUS_TOUCHES).await?;
        StatusTouches::from_frame(&frame)
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Send `value` to cell `cell_id`. Succeeds only on an `ok` ack.
    pub async fn send_device_event(&self, cell_id: u32, value: &str) -> Result<(), Error> {
        let (login, password) = self.resource_credentials("send_device_event")?;
        let conn = self.resource_connection()?;
        debug!(cell_id, value, "sending device event");

        conn.request(
            action::XEVENT,
            |request_token| Event::new(login, password, request_token, cell_id, value),
            &self.shutdown,
        )
        .await?;
        Ok(())
    }

    /// Correlated send of an action that carries only credentials.
    pub async fn send_action(&self, action_name: &str) -> Result<Arc<Frame>, Error> {
        let (login, password) = self.resource_credentials("send_action")?;
        let conn = self.resource_connection()?;

        conn.request(
            action_name,
            |request_token| Action {
                action_name,
                login,
                password,
                request_token,
            },
            &self.shutdown,
        )
        .await
    }

    // ── Unsolicited frames ───────────────────────────────────────────

    /// The next frame on the resource connection, whatever it is. Fails on
    /// a non-ok status.
    pub async fn read_any_message(&self) -> Result<Arc<Frame>, Error> {
        self.require("read_any_message", SessionState::ResourceAuthenticated)?;
        let conn = self.resource_connection()?;
        conn.read_message(&Expectation::any(), &self.shutdown).await
    }

    /// The next frame with `action_name`, skipping everything else.
    pub async fn read_message(&self, action_name: &str) -> Result<Arc<Frame>, Error> {
        self.require("read_message", SessionState::ResourceAuthenticated)?;
        let conn = self.resource_connection()?;
        conn.read_message(&Expectation::action(action_name), &self.shutdown)
            .await
    }

    /// Follow every frame on the resource connection.
    pub fn listen(&self) -> Result<FrameListener, Error> {
        self.require("listen", SessionState::ResourceAuthenticated)?;
        Ok(self.resource_connection()?.listen())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Close both connections and stop their routers. Pending waits return
    /// [`Error::Cancelled`]. Safe to call more than once.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let setup = self.take_setup_connection();
        let resource = lock(&self.resource).take();

        for conn in setup.into_iter().chain(resource) {
            conn.close().await;
        }
        info!("client closed");
    }

    // ── Internals shared with the login stages ───────────────────────

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Dial, check the greeting and start a router.
    pub(crate) async fn open_connection(&self, role: ConnectionRole) -> Result<Arc<Connection>, Error> {
        let timeout = self.connector.config().handshake_timeout;
        let mut transport = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(Error::Cancelled),
            transport = self.connector.open() => transport?,
        };
        transport.expect_greeting(timeout).await?;
        Ok(Arc::new(Connection::start(
            role,
            transport,
            Arc::clone(&self.tokens),
            &self.shutdown,
        )))
    }

    pub(crate) fn install_setup_connection(&self, conn: Arc<Connection>) {
        *lock(&self.setup) = Some(conn);
    }

    pub(crate) fn install_resource_connection(&self, conn: Arc<Connection>) {
        *lock(&self.resource) = Some(conn);
    }

    pub(crate) fn take_setup_connection(&self) -> Option<Arc<Connection>> {
        lock(&self.setup).take()
    }

    pub(crate) fn setup_connection(&self) -> Result<Arc<Connection>, Error> {
        lock(&self.setup).clone().ok_or(Error::StreamClosed)
    }

    fn resource_connection(&self) -> Result<Arc<Connection>, Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }
        lock(&self.resource).clone().ok_or(Error::StreamClosed)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.connector.config().endpoint.as_str())
            .field("state", &self.state())
            .field(
                "password_hash",
                &self.session.password_hash.get().map(|h| h.expose_secret().len()),
            )
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
