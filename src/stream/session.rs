use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, SinkExt, Stream, StreamExt};

use super::admission::{SessionLimiter, SessionSlot};
use crate::auth;
use crate::metrics::Engine;

/// Delay between two pushes of the same session.
pub const PUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Why a connection was closed before streaming started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Missing or wrong token.
    Unauthorized,
    /// The session cap is reached.
    Busy,
}

impl Rejection {
    pub fn close_code(self) -> u16 {
        match self {
            Rejection::Unauthorized => close_code::POLICY,
            Rejection::Busy => close_code::AGAIN,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Rejection::Unauthorized => "Missing or invalid token",
            Rejection::Busy => "Server busy",
        }
    }

    pub fn close_frame(self) -> CloseFrame {
        CloseFrame {
            code: self.close_code(),
            reason: self.reason().into(),
        }
    }
}

/// Authenticates a session, then claims a slot for it.
///
/// Authentication runs first, so a rejected token never touches the counter.
///
/// # Errors
///
/// Returns the [`Rejection`] to close the connection with.
pub fn admit(
    limiter: &SessionLimiter,
    configured_token: &str,
    provided_token: Option<&str>,
) -> Result<SessionSlot, Rejection> {
    if !auth::is_authorized(configured_token, provided_token) {
        return Err(Rejection::Unauthorized);
    }
    limiter.try_acquire().ok_or(Rejection::Busy)
}

/// How a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    WriteFailed,
    ReadFailed,
    CollectFailed,
    Shutdown,
}

/// Pushes one serialized snapshot per `interval` until the peer goes away,
/// a write fails or `shutdown` resolves.
///
/// Incoming messages other than close frames are ignored.
pub async fn stream_snapshots<Tx, Rx, E, F>(
    mut sink: Tx,
    mut incoming: Rx,
    engine: Arc<Engine>,
    interval: Duration,
    shutdown: F,
) -> SessionEnd
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let snapshot = match engine.collect_blocking().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!("snapshot collection failed: {err}");
                return SessionEnd::CollectFailed;
            }
        };
        let payload = match serde_json::to_string(&*snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("failed to serialize snapshot: {err}");
                return SessionEnd::CollectFailed;
            }
        };

        if let Err(err) = sink.send(Message::Text(payload.into())).await {
            log::debug!("push failed: {err}");
            return SessionEnd::WriteFailed;
        }

        let pause = tokio::time::sleep(interval);
        tokio::pin!(pause);
        loop {
            tokio::select! {
                _ = &mut pause => break,
                _ = &mut shutdown => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "Server shutting down".into(),
                        })))
                        .await;
                    return SessionEnd::Shutdown;
                }
                message = incoming.next() => match message {
                    None | Some(Ok(Message::Close(_))) => return SessionEnd::PeerClosed,
                    Some(Err(err)) => {
                        log::debug!("read failed: {err}");
                        return SessionEnd::ReadFailed;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}
