//! Streaming session manager.
//!
//! Every admitted WebSocket client receives one snapshot every
//! [`PUSH_INTERVAL`] until it disconnects. Clients authenticate with the
//! `token` query parameter and are capped by a [`SessionLimiter`].
mod admission;
mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt};
use tokio::net::TcpListener;

pub use admission::{SessionLimiter, SessionSlot};
pub use session::{PUSH_INTERVAL, Rejection, SessionEnd, admit, stream_snapshots};

use crate::error::{Error, Result};
use crate::metrics::Engine;

/// Resolves once the server is shutting down. Cheap to clone.
pub type ShutdownSignal = Shared<BoxFuture<'static, ()>>;

#[derive(Debug, serde::Deserialize)]
pub struct HandshakeParams {
    pub token: Option<String>,
}

#[derive(Clone)]
struct StreamState {
    engine: Arc<Engine>,
    limiter: SessionLimiter,
    token: Arc<str>,
    push_interval: Duration,
    shutdown: ShutdownSignal,
}

async fn upgrade(
    State(state): State<StreamState>,
    Query(params): Query<HandshakeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

async fn handle_socket(mut socket: WebSocket, state: StreamState, token: Option<String>) {
    let slot = match admit(&state.limiter, &state.token, token.as_deref()) {
        Ok(slot) => slot,
        Err(rejection) => {
            log::warn!("rejecting stream session: {}", rejection.reason());
            let _ = socket
                .send(Message::Close(Some(rejection.close_frame())))
                .await;
            return;
        }
    };
    log::debug!(
        "stream session admitted ({}/{})",
        state.limiter.active(),
        state.limiter.max()
    );

    let (sink, incoming) = socket.split();
    let end = stream_snapshots(
        sink,
        incoming,
        state.engine,
        state.push_interval,
        state.shutdown,
    )
    .await;
    drop(slot);
    log::debug!("stream session ended: {end:?}");
}

pub struct StreamServer {
    router: axum::Router,
}

impl StreamServer {
    /// Accepts upgrades on every path.
    pub fn new(
        engine: Arc<Engine>,
        limiter: SessionLimiter,
        token: impl Into<Arc<str>>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::with_push_interval(engine, limiter, token, shutdown, PUSH_INTERVAL)
    }

    pub fn with_push_interval(
        engine: Arc<Engine>,
        limiter: SessionLimiter,
        token: impl Into<Arc<str>>,
        shutdown: ShutdownSignal,
        push_interval: Duration,
    ) -> Self {
        let state = StreamState {
            engine,
            limiter,
            token: token.into(),
            push_interval,
            shutdown,
        };
        let router = axum::Router::new().fallback(upgrade).with_state(state);
        Self { router }
    }

    pub fn into_router(self) -> axum::Router {
        self.router
    }

    /// Serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound and
    /// [`Error::Serve`] if accepting connections fails.
    pub async fn listen(self, addr: &str, shutdown: ShutdownSignal) -> Result<()> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        log::info!("Streaming snapshots on ws://{addr}");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| Error::Serve {
                addr: addr.to_string(),
                source,
            })
    }
}

/// Wraps a future into a [`ShutdownSignal`].
pub fn shutdown_signal(
    signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> ShutdownSignal {
    signal.boxed().shared()
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, SocketAddr};

    use futures::Stream;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::{self, Message as ClientMessage};

    use super::*;
    use crate::container::{self, ContainerRuntime, Listing};
    use crate::metrics::ReverseLookup;
    use crate::procfs::ProcRoot;

    struct NoContainers;

    impl ContainerRuntime for NoContainers {
        fn list(&self, _listing: Listing) -> container::Result<String> {
            Ok(String::new())
        }
    }

    struct NoLookup;

    impl ReverseLookup for NoLookup {
        fn lookup(&self, _addr: IpAddr) -> Option<String> {
            None
        }
    }

    async fn serve(dir: &tempfile::TempDir, limiter: SessionLimiter, token: &str) -> SocketAddr {
        let mut builder = Engine::builder();
        builder
            .set_proc_root(ProcRoot::new(dir.path()))
            .set_disk_path(dir.path())
            .set_container_runtime(Box::new(NoContainers))
            .set_reverse_lookup(Box::new(NoLookup));
        let router = StreamServer::with_push_interval(
            Arc::new(builder.build()),
            limiter,
            token,
            shutdown_signal(std::future::pending()),
            Duration::from_millis(20),
        )
        .into_router();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    /// Reads until the server closes, returning the close code.
    async fn close_code<S>(client: &mut S) -> Option<u16>
    where
        S: Stream<Item = std::result::Result<ClientMessage, tungstenite::Error>> + Unpin,
    {
        while let Some(message) = client.next().await {
            if let ClientMessage::Close(frame) = message.unwrap() {
                return frame.map(|frame| u16::from(frame.code));
            }
        }
        None
    }

    async fn wait_for_idle(limiter: &SessionLimiter) {
        for _ in 0..100 {
            if limiter.active() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} sessions still active", limiter.active());
    }

    #[tokio::test]
    async fn test_wrong_token_closes_with_policy_violation() {
        let dir = tempfile::tempdir().unwrap();
        let limiter = SessionLimiter::new(4);
        let addr = serve(&dir, limiter.clone(), "s3cret").await;

        for url in [format!("ws://{addr}/"), format!("ws://{addr}/?token=nope")] {
            let (mut client, _) = connect_async(url).await.unwrap();
            assert_eq!(close_code(&mut client).await, Some(1008));
        }
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn test_session_over_cap_closes_busy_and_slot_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let limiter = SessionLimiter::new(1);
        let addr = serve(&dir, limiter.clone(), "s3cret").await;
        let url = format!("ws://{addr}/any/path?token=s3cret");

        let (mut first, _) = connect_async(url.as_str()).await.unwrap();
        let message = first.next().await.unwrap().unwrap();
        assert!(matches!(message, ClientMessage::Text(_)));
        assert_eq!(limiter.active(), 1);

        let (mut second, _) = connect_async(url.as_str()).await.unwrap();
        assert_eq!(close_code(&mut second).await, Some(1013));
        assert_eq!(limiter.active(), 1);

        first.close(None).await.unwrap();
        wait_for_idle(&limiter).await;
    }

    #[tokio::test]
    async fn test_concurrent_admission_respects_cap() {
        let limiter = SessionLimiter::new(2);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { admit(&limiter, "", None).ok() }));
        }

        let mut slots = Vec::new();
        for handle in handles {
            if let Some(slot) = handle.await.unwrap() {
                slots.push(slot);
            }
        }
        assert_eq!(slots.len(), 2);
        assert_eq!(limiter.active(), 2);

        slots.clear();
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_is_shared() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let signal = shutdown_signal(async move {
            let _ = rx.await;
        });
        let other = signal.clone();
        tx.send(()).unwrap();
        signal.await;
        other.await;
    }
}
