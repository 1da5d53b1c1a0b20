// WebSocket connections to the service.
//
// `Connector` dials and performs the WebSocket handshake, yielding a raw
// `Transport`. The caller validates the greeting on the transport and then
// turns it into a `Connection`, which owns the router task and the write
// half and offers correlated send-and-wait.

use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::correlator::{Expectation, await_match};
use crate::error::Error;
use crate::messages::Frame;
use crate::router::{self, WaiterRegistry};
use crate::token::TokenGenerator;

/// Where the service lives. The trailing slash is required; the handshake
/// fails without it.
pub const SERVICE_URL: &str = "wss://fhome.cloud/webapp-interface/";

/// Upper bound on dial + WebSocket handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;
pub(crate) type FrameStream =
    Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;

// ── ConnectConfig ────────────────────────────────────────────────────

/// Dial settings shared by the setup and resource connections.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub endpoint: Url,
    pub handshake_timeout: Duration,
}

impl ConnectConfig {
    /// Build a config for `endpoint`, appending the trailing slash the
    /// service insists on.
    pub fn new(mut endpoint: Url, handshake_timeout: Duration) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self {
            endpoint,
            handshake_timeout,
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new(
            Url::parse(SERVICE_URL).expect("SERVICE_URL is a valid URL"),
            HANDSHAKE_TIMEOUT,
        )
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens fresh sockets to the service endpoint.
#[derive(Debug, Clone, Default)]
pub struct Connector {
    config: ConnectConfig,
}

impl Connector {
    pub fn new(config: ConnectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// Dial the endpoint and complete the WebSocket handshake.
    ///
    /// The returned transport has not read anything yet; the first frame on
    /// it is the service's greeting.
    pub async fn open(&self) -> Result<Transport, Error> {
        // Only the first install wins; later calls see the provider in place.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let endpoint = self.config.endpoint.as_str();
        debug!(endpoint, "dialing");

        let dial = tokio_tungstenite::connect_async(endpoint);
        let (ws, response) = match tokio::time::timeout(self.config.handshake_timeout, dial).await
        {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                if let tungstenite::Error::Http(ref response) = e {
                    warn!(status = %response.status(), "handshake rejected");
                    for (name, value) in response.headers() {
                        warn!(header = %name, value = ?value, "handshake response header");
                    }
                }
                return Err(Error::ConnectFailed {
                    endpoint: endpoint.to_owned(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::ConnectFailed {
                    endpoint: endpoint.to_owned(),
                    reason: format!(
                        "handshake timed out after {}s",
                        self.config.handshake_timeout.as_secs_f32()
                    ),
                });
            }
        };

        debug!(status = %response.status(), "WebSocket connected");
        let (sink, stream) = ws.split();
        Ok(Transport::new(endpoint, Box::pin(sink), Box::pin(stream)))
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// A connected socket that nobody is reading from yet.
pub struct Transport {
    endpoint: String,
    sink: FrameSink,
    stream: FrameStream,
}

impl Transport {
    pub(crate) fn new(endpoint: impl Into<String>, sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            endpoint: endpoint.into(),
            sink,
            stream,
        }
    }

    /// Read the first frame and check that it is the
    /// `authentication_required` greeting with an empty status.
    pub async fn expect_greeting(&mut self, timeout: Duration) -> Result<(), Error> {
        let frame = tokio::time::timeout(timeout, self.next_frame())
            .await
            .map_err(|_| Error::ConnectFailed {
                endpoint: self.endpoint.clone(),
                reason: "no greeting received".into(),
            })?
            .map_err(|e| match e {
                Error::Parse { message } => Error::UnexpectedGreeting {
                    action_name: String::new(),
                    status: Some(message),
                },
                other => other,
            })?;

        if frame.is_greeting() {
            debug!("greeting received");
            Ok(())
        } else {
            Err(Error::UnexpectedGreeting {
                action_name: frame.action_name,
                status: frame.status,
            })
        }
    }

    async fn next_frame(&mut self) -> Result<Frame, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Frame::decode(bytes::Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(Message::Binary(data))) => return Frame::decode(data),
                Some(Ok(Message::Close(_)) | Err(_)) | None => return Err(Error::StreamClosed),
                Some(Ok(_)) => {}
            }
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Which of the two sockets a connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionRole {
    /// Cloud login and resource discovery.
    Setup,
    /// Resource session, configuration fetches and device actions.
    Resource,
}

/// A live connection with its router task running.
///
/// Requests are serialized on the write half: registering the waiter and
/// writing the frame happen under one lock, so no caller's registration
/// window can interleave with another caller's write.
pub struct Connection {
    role: ConnectionRole,
    sink: Mutex<FrameSink>,
    registry: Arc<WaiterRegistry>,
    tokens: Arc<TokenGenerator>,
    router_cancel: CancellationToken,
    router: StdMutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Spawn the router on `transport`'s read half.
    ///
    /// `shutdown` is the client-wide token; the router stops when either it
    /// or [`close`](Self::close) fires.
    pub fn start(
        role: ConnectionRole,
        transport: Transport,
        tokens: Arc<TokenGenerator>,
        shutdown: &CancellationToken,
    ) -> Self {
        let registry = WaiterRegistry::new();
        let router_cancel = shutdown.child_token();
        let Transport { sink, stream, .. } = transport;

        let task = tokio::spawn(router::run(
            stream,
            Arc::clone(&registry),
            router_cancel.clone(),
        ));
        info!(%role, "connection ready");

        Self {
            role,
            sink: Mutex::new(sink),
            registry,
            tokens,
            router_cancel,
            router: StdMutex::new(Some(task)),
        }
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// `false` once the router has stopped.
    pub fn is_alive(&self) -> bool {
        !self.registry.is_closed()
    }

    /// Correlated send-and-wait.
    ///
    /// Generates a token, hands it to `build` to produce the request body,
    /// registers a waiter, writes the frame, then waits for the frame with
    /// the same action name and token.
    pub async fn request<B, F>(
        &self,
        action_name: &str,
        build: F,
        cancel: &CancellationToken,
    ) -> Result<Arc<Frame>, Error>
    where
        B: Serialize,
        F: FnOnce(String) -> B,
    {
        let token = self.tokens.next_token();
        let body = serde_json::to_string(&build(token.clone()))
            .map_err(|e| Error::parse(format!("cannot encode {action_name}: {e}")))?;

        let waiter = {
            let mut sink = self.sink.lock().await;
            if self.registry.is_closed() {
                return Err(Error::StreamClosed);
            }
            let waiter = self.registry.register();
            debug!(role = %self.role, action = action_name, token = %token, "sending request");
            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                sent = sink.send(Message::text(body)) => sent,
            };
            sent.map_err(|e| match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    Error::StreamClosed
                }
                other => Error::Transport(other.to_string()),
            })?;
            waiter
        };

        await_match(
            &self.registry,
            waiter,
            &Expectation::response(action_name, token),
            cancel,
        )
        .await
    }

    /// Wait for the next frame satisfying `expect` without sending anything.
    pub async fn read_message(
        &self,
        expect: &Expectation,
        cancel: &CancellationToken,
    ) -> Result<Arc<Frame>, Error> {
        let waiter = self.registry.register();
        await_match(&self.registry, waiter, expect, cancel).await
    }

    /// A listener that observes every frame from now on, in arrival order.
    pub fn listen(&self) -> FrameListener {
        FrameListener {
            registry: Arc::clone(&self.registry),
            cursor: self.registry.last_seq(),
        }
    }

    /// Send a close frame, stop the router and wait for it to finish.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!(role = %self.role, error = %e, "close frame not sent");
        }
        self.router_cancel.cancel();

        let handle = self
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(role = %self.role, error = %e, "router task failed");
            }
        }
        debug!(role = %self.role, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.router_cancel.cancel();
    }
}

// ── FrameListener ────────────────────────────────────────────────────

/// Follows every frame on a connection.
///
/// Unlike a one-shot read, the listener remembers the last frame it saw, so
/// frames that arrive while the caller is busy are still returned (as long
/// as they are within the router's backlog).
pub struct FrameListener {
    registry: Arc<WaiterRegistry>,
    cursor: u64,
}

impl FrameListener {
    /// The next frame, or an error once the connection is gone or `cancel`
    /// fires. Non-ok statuses are returned as frames, not errors.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Arc<Frame>, Error> {
        let mut waiter = self.registry.register_after(self.cursor);
        let delivery = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            delivery = waiter.recv() => delivery?,
        };
        self.cursor = delivery.seq;
        Ok(delivery.frame)
    }

    /// Turn the listener into a stream that ends after the first error.
    pub fn into_stream(
        mut self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<Arc<Frame>, Error>> {
        async_stream::stream! {
            loop {
                match self.next(&cancel).await {
                    Ok(frame) => yield Ok(frame),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
