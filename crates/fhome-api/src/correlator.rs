//! Request/response correlation on top of the broadcast router.
//!
//! A caller registers a waiter, sends its request, then filters whatever
//! the router hands it: frames for other callers are skipped and a new
//! waiter is registered for the frame after them, until the expected
//! action and token show up.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;
use crate::messages::Frame;
use crate::router::{Waiter, WaiterRegistry};

/// What a waiting caller is looking for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    /// Required action name, or `None` to accept any action.
    pub action_name: Option<String>,
    /// Required request token, or `None` to skip the token check.
    pub request_token: Option<String>,
}

impl Expectation {
    /// Accept the first frame observed.
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept the first frame with this action name, whatever its token.
    pub fn action(action_name: impl Into<String>) -> Self {
        Self {
            action_name: Some(action_name.into()),
            request_token: None,
        }
    }

    /// Accept only the response to one request.
    pub fn response(action_name: impl Into<String>, request_token: impl Into<String>) -> Self {
        Self {
            action_name: Some(action_name.into()),
            request_token: Some(request_token.into()),
        }
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        let action_ok = self
            .action_name
            .as_deref()
            .is_none_or(|name| name == frame.action_name);
        let token_ok = self
            .request_token
            .as_deref()
            .is_none_or(|token| frame.request_token.as_deref() == Some(token));
        action_ok && token_ok
    }
}

/// Consume frames from `waiter` (and its successors) until one satisfies
/// `expect`, the stream closes, or `cancel` fires.
///
/// Status is checked only on the matching frame, so an error addressed to
/// another caller never fails this one.
pub(crate) async fn await_match(
    registry: &Arc<WaiterRegistry>,
    mut waiter: Waiter,
    expect: &Expectation,
    cancel: &CancellationToken,
) -> Result<Arc<Frame>, Error> {
    loop {
        let delivery = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            delivery = waiter.recv() => delivery?,
        };

        if expect.matches(&delivery.frame) {
            return check_status(delivery.frame);
        }

        trace!(
            action = %delivery.frame.action_name,
            seq = delivery.seq,
            "skipping frame for another waiter"
        );
        waiter = registry.register_after(delivery.seq);
    }
}

fn check_status(frame: Arc<Frame>) -> Result<Arc<Frame>, Error> {
    match frame.error_status() {
        Some(status) => Err(Error::RemoteError {
            action_name: frame.action_name.clone(),
            status: status.to_owned(),
        }),
        None => Ok(frame),
    }
}
