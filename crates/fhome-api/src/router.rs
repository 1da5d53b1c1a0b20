//! Inbound frame fan-out.
//!
//! One router task per connection reads frames off the socket and
//! **broadcasts** each one to every waiter registered at that moment, then
//! forgets all of them. A waiter is a single-use, single-slot handoff: it
//! sees exactly one frame, and whoever owns it decides whether that frame
//! was the one it wanted (see [`crate::correlator`]).
//!
//! Every broadcast frame also gets a sequence number and is kept in a short
//! backlog, so a waiter that re-registers after inspecting frame `n` is
//! handed frame `n + 1` even if the router already moved past it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{Stream, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::messages::{Frame, action};

const BACKLOG_CAPACITY: usize = 256;

/// A frame as handed to one waiter.
#[derive(Debug, Clone)]
pub(crate) struct Delivery {
    /// Position of the frame in the connection's arrival order, from 1.
    pub seq: u64,
    pub frame: Arc<Frame>,
}

// ── WaiterRegistry ───────────────────────────────────────────────────

/// The set of currently registered waiters, shared by the router task and
/// every caller waiting on the connection.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    /// Sequence number of the last broadcast frame.
    seq: u64,
    slots: HashMap<u64, oneshot::Sender<Delivery>>,
    backlog: VecDeque<Delivery>,
    closed: bool,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for the next frame the router observes.
    pub(crate) fn register(self: &Arc<Self>) -> Waiter {
        let mut state = self.lock();
        let seen = state.seq;
        self.register_locked(&mut state, seen)
    }

    /// Register a waiter for the first frame after `seen`.
    ///
    /// If that frame was already broadcast it is handed off immediately
    /// from the backlog.
    pub(crate) fn register_after(self: &Arc<Self>, seen: u64) -> Waiter {
        let mut state = self.lock();
        self.register_locked(&mut state, seen)
    }

    fn register_locked(self: &Arc<Self>, state: &mut RegistryState, seen: u64) -> Waiter {
        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            id,
            rx,
            registry: Arc::clone(self),
        };

        if let Some(pending) = state.backlog.iter().find(|d| d.seq > seen) {
            if pending.seq > seen + 1 {
                warn!(
                    missed = pending.seq - seen - 1,
                    "waiter lagged behind the frame backlog"
                );
            }
            let _ = tx.send(pending.clone());
        } else if !state.closed {
            state.slots.insert(id, tx);
        }
        // Closed and nothing buffered: `tx` drops here and the waiter
        // observes a closed stream.

        waiter
    }

    /// Deliver `frame` to every registered waiter and clear the registry.
    ///
    /// Returns the number of waiters the frame was handed to.
    pub(crate) fn broadcast(&self, frame: Arc<Frame>) -> usize {
        let (delivery, slots) = {
            let mut state = self.lock();
            state.seq += 1;
            let delivery = Delivery {
                seq: state.seq,
                frame,
            };
            if state.backlog.len() == BACKLOG_CAPACITY {
                state.backlog.pop_front();
            }
            state.backlog.push_back(delivery.clone());
            (delivery, std::mem::take(&mut state.slots))
        };

        let mut delivered = 0;
        for (id, tx) in slots {
            if tx.send(delivery.clone()).is_ok() {
                delivered += 1;
            } else {
                trace!(waiter = id, "waiter went away before delivery");
            }
        }
        delivered
    }

    /// Release every pending waiter with a closed-stream signal and refuse
    /// new registrations that have nothing left to read.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.slots.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Sequence number of the last broadcast frame.
    pub(crate) fn last_seq(&self) -> u64 {
        self.lock().seq
    }

    fn remove(&self, id: u64) {
        self.lock().slots.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().slots.len()
    }
}

// ── Waiter ───────────────────────────────────────────────────────────

/// A single-use subscription to the next frame.
///
/// Dropping a waiter that has not received its frame removes it from the
/// registry.
#[derive(Debug)]
pub(crate) struct Waiter {
    id: u64,
    rx: oneshot::Receiver<Delivery>,
    registry: Arc<WaiterRegistry>,
}

impl Waiter {
    /// Wait for the frame. Fails with [`Error::StreamClosed`] if the router
    /// shut down first.
    pub(crate) async fn recv(&mut self) -> Result<Delivery, Error> {
        (&mut self.rx).await.map_err(|_| Error::StreamClosed)
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

// ── Router loop ──────────────────────────────────────────────────────

/// Read frames until the stream ends, fails, or `cancel` fires, broadcasting
/// each decoded frame. Always closes the registry on the way out.
pub(crate) async fn run<S>(mut stream: S, registry: Arc<WaiterRegistry>, cancel: CancellationToken)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("router cancelled");
                break;
            }
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                dispatch(bytes::Bytes::copy_from_slice(text.as_bytes()), &registry);
            }
            Some(Ok(Message::Binary(data))) => dispatch(data, &registry),
            Some(Ok(Message::Close(frame))) => {
                if let Some(ref cf) = frame {
                    debug!(code = %cf.code, reason = %cf.reason, "close frame received");
                } else {
                    debug!("close frame received (no payload)");
                }
                break;
            }
            Some(Ok(_)) => {
                // Ping/Pong are answered by tungstenite itself.
                trace!("control frame");
            }
            Some(Err(e)) => {
                warn!(error = %e, "read failed, closing connection");
                break;
            }
            None => {
                debug!("stream ended");
                break;
            }
        }
    }

    registry.close();
}

fn dispatch(raw: bytes::Bytes, registry: &WaiterRegistry) {
    let frame = match Frame::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            return;
        }
    };

    if frame.action_name == action::DISCONNECTING {
        warn!(
            details = frame.details.as_deref().unwrap_or(""),
            reason = frame.reason.as_deref().unwrap_or(""),
            "service is disconnecting"
        );
    }

    let action_name = frame.action_name.clone();
    let delivered = registry.broadcast(Arc::new(frame));
    trace!(action = %action_name, delivered, "frame broadcast");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use futures::channel::mpsc;
    use serde_json::json;

    use super::*;

    fn frame(action_name: &str) -> Arc<Frame> {
        let raw = json!({ "action_name": action_name }).to_string();
        Arc::new(Frame::decode(bytes::Bytes::from(raw)).unwrap())
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_waiter_once() {
        let registry = WaiterRegistry::new();
        let mut waiters: Vec<Waiter> = (0..5).map(|_| registry.register()).collect();
        assert_eq!(registry.len(), 5);

        let delivered = registry.broadcast(frame("statustoucheschanged"));
        assert_eq!(delivered, 5);
        assert_eq!(registry.len(), 0);

        for waiter in &mut waiters {
            let delivery = waiter.recv().await.unwrap();
            assert_eq!(delivery.seq, 1);
            assert_eq!(delivery.frame.action_name, "statustoucheschanged");
        }
    }

    #[tokio::test]
    async fn waiter_registered_after_broadcast_waits_for_next_frame() {
        let registry = WaiterRegistry::new();
        registry.broadcast(frame("first"));

        let mut waiter = registry.register();
        assert_eq!(registry.len(), 1);
        registry.broadcast(frame("second"));

        let delivery = waiter.recv().await.unwrap();
        assert_eq!(delivery.frame.action_name, "second");
        assert_eq!(delivery.seq, 2);
    }

    #[tokio::test]
    async fn register_after_replays_missed_frame() {
        let registry = WaiterRegistry::new();
        registry.broadcast(frame("one"));
        registry.broadcast(frame("two"));
        registry.broadcast(frame("three"));

        let mut waiter = registry.register_after(1);
        assert_eq!(registry.len(), 0, "served from backlog, not registered");
        let delivery = waiter.recv().await.unwrap();
        assert_eq!(delivery.frame.action_name, "two");
        assert_eq!(delivery.seq, 2);
    }

    #[tokio::test]
    async fn dropped_waiter_is_removed() {
        let registry = WaiterRegistry::new();
        let waiter = registry.register();
        let _other = registry.register();
        assert_eq!(registry.len(), 2);
        drop(waiter);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn close_releases_pending_waiters() {
        let registry = WaiterRegistry::new();
        let mut waiter = registry.register();
        registry.close();
        assert!(matches!(waiter.recv().await, Err(Error::StreamClosed)));

        let mut late = registry.register();
        assert!(matches!(late.recv().await, Err(Error::StreamClosed)));
        assert!(registry.is_closed());
    }

    #[tokio::test]
    async fn backlog_is_bounded() {
        let registry = WaiterRegistry::new();
        for _ in 0..(BACKLOG_CAPACITY + 10) {
            registry.broadcast(frame("push"));
        }
        let mut waiter = registry.register_after(0);
        let delivery = waiter.recv().await.unwrap();
        assert_eq!(delivery.seq, 11, "oldest retained frame");
    }

    #[tokio::test]
    async fn router_broadcasts_and_skips_garbage() {
        let (tx, rx) = mpsc::unbounded::<Result<Message, tungstenite::Error>>();
        let registry = WaiterRegistry::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(rx, Arc::clone(&registry), cancel.clone()));

        let mut waiter = registry.register();
        tx.unbounded_send(Ok(Message::text("not json"))).unwrap();
        tx.unbounded_send(Ok(Message::text(
            json!({ "action_name": "touches" }).to_string(),
        )))
        .unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(1), waiter.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.frame.action_name, "touches");
        assert_eq!(delivery.seq, 1, "garbage frame never got a sequence number");

        cancel.cancel();
        task.await.unwrap();
        assert!(registry.is_closed());
    }

    #[tokio::test]
    async fn router_transport_error_releases_waiters() {
        let (tx, rx) = mpsc::unbounded::<Result<Message, tungstenite::Error>>();
        let registry = WaiterRegistry::new();
        let task = tokio::spawn(run(rx, Arc::clone(&registry), CancellationToken::new()));

        let mut waiter = registry.register();
        tx.unbounded_send(Err(tungstenite::Error::ConnectionClosed))
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter.recv())
            .await
            .unwrap();
        assert!(matches!(result, Err(Error::StreamClosed)));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn router_stops_when_stream_ends() {
        let (tx, rx) = mpsc::unbounded::<Result<Message, tungstenite::Error>>();
        let registry = WaiterRegistry::new();
        let task = tokio::spawn(run(rx, Arc::clone(&registry), CancellationToken::new()));
        drop(tx);
        task.await.unwrap();
        assert!(registry.is_closed());
    }
}
