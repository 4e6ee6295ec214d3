use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use paystream_core::{unix_now, CoordinatorSettings};
use paystream_signer::MessageSigner;

use crate::wire::{seal, CoordinatorMessage, OutboundRequest};
use crate::{LinkError, Result};

/// Bounded fan-out queue per subscriber; a lagging subscriber loses its
/// oldest messages without blocking delivery to others.
const INBOUND_QUEUE: usize = 64;

/// Outbound writer queue depth
const OUTBOUND_QUEUE: usize = 64;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

/// Outcome of a connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Live coordinator connection established
    Connected,
    /// Coordinator unreachable; operating locally
    Degraded,
}

struct LinkInner {
    settings: CoordinatorSettings,
    state: RwLock<LinkState>,
    degraded: AtomicBool,
    suppressed_sends: AtomicU64,
    outbound: RwLock<Option<mpsc::Sender<String>>>,
    inbound: broadcast::Sender<CoordinatorMessage>,
    /// Serializes connect attempts so a second caller awaits the
    /// in-flight attempt instead of opening a second socket
    connect_gate: tokio::sync::Mutex<()>,
}

impl LinkInner {
    fn set_state(&self, state: LinkState) {
        *self.state.write() = state;
    }

    fn drop_connection(&self) {
        *self.outbound.write() = None;
        self.set_state(LinkState::Disconnected);
    }
}

/// Duplex link to the session coordinator
#[derive(Clone)]
pub struct CoordinatorLink {
    inner: Arc<LinkInner>,
}

impl CoordinatorLink {
    pub fn new(settings: CoordinatorSettings) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_QUEUE);
        Self {
            inner: Arc::new(LinkInner {
                settings,
                state: RwLock::new(LinkState::Disconnected),
                degraded: AtomicBool::new(false),
                suppressed_sends: AtomicU64::new(0),
                outbound: RwLock::new(None),
                inbound,
                connect_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.read()
    }

    /// Whether the link fell back to local-only operation
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::Relaxed)
    }

    /// Sends skipped while degraded (diagnostics)
    pub fn suppressed_sends(&self) -> u64 {
        self.inner.suppressed_sends.load(Ordering::Relaxed)
    }

    /// Connect and authenticate against the coordinator.
    ///
    /// Idempotent: while an attempt is in flight, concurrent callers wait
    /// on it and adopt its outcome; once connected (or degraded) further
    /// calls return immediately. A failed attempt does not propagate:
    /// the link enters degraded local-only mode and reports it.
    pub async fn connect<S>(&self, identity: &str, signer: &S) -> LinkStatus
    where
        S: MessageSigner + ?Sized,
    {
        let _gate = self.inner.connect_gate.lock().await;

        if self.state() == LinkState::Connected {
            return LinkStatus::Connected;
        }
        if self.is_degraded() {
            return LinkStatus::Degraded;
        }

        match self.try_connect(identity, signer).await {
            Ok(()) => {
                info!(url = %self.inner.settings.ws_url, "connected to coordinator");
                LinkStatus::Connected
            }
            Err(err) => {
                warn!(%err, "coordinator unreachable; entering degraded local-only mode");
                self.inner.drop_connection();
                self.inner.degraded.store(true, Ordering::Relaxed);
                LinkStatus::Degraded
            }
        }
    }

    async fn try_connect<S>(&self, identity: &str, signer: &S) -> Result<()>
    where
        S: MessageSigner + ?Sized,
    {
        let settings = &self.inner.settings;
        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(settings.connect_timeout_secs);

        self.inner.set_state(LinkState::Connecting);
        let (socket, _response) =
            tokio::time::timeout_at(deadline, connect_async(settings.ws_url.as_str()))
                .await
                .map_err(|_| LinkError::ConnectTimeout)?
                .map_err(|e| LinkError::Transport(e.to_string()))?;

        self.inner.set_state(LinkState::Authenticating);
        let (mut sink, mut stream) = socket.split();

        let auth = OutboundRequest::AuthRequest {
            wallet: identity.to_string(),
            participant: identity.to_string(),
            app_name: settings.app_name.clone(),
            expire: unix_now() + settings.auth_expiry_secs,
            scope: "console".to_string(),
        };
        let envelope = seal(signer, auth)
            .await
            .map_err(|e| LinkError::Auth(e.to_string()))?;
        sink.send(Message::Text(envelope.to_text()))
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?;
        debug!("auth request sent");

        // The first inbound frame inside the window is the auth ack; the
        // whole open+auth handshake shares one bounded wait.
        let ack = tokio::time::timeout_at(deadline, stream.next())
            .await
            .map_err(|_| LinkError::ConnectTimeout)?
            .ok_or_else(|| LinkError::Transport("socket closed during auth".to_string()))?
            .map_err(|e| LinkError::Transport(e.to_string()))?;
        debug!("auth acknowledged");
        if let Message::Text(text) = &ack {
            if let Ok(msg) = serde_json::from_str::<CoordinatorMessage>(text) {
                let _ = self.inner.inbound.send(msg);
            }
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        *self.inner.outbound.write() = Some(outbound_tx);
        self.inner.set_state(LinkState::Connected);

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!(%err, "coordinator send failed; writer stopping");
                    break;
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<CoordinatorMessage>(&text) {
                            Ok(msg) => {
                                let _ = inner.inbound.send(msg);
                            }
                            Err(err) => debug!(%err, raw = %text, "unparsed coordinator frame"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "coordinator stream error");
                        break;
                    }
                }
            }
            inner.drop_connection();
            debug!("coordinator connection closed");
        });

        Ok(())
    }

    /// Fire-and-forget transmit. Connected: queue for the writer task.
    /// Degraded: recorded no-op.
    pub fn send(&self, text: String) {
        if self.is_degraded() {
            let suppressed = self.inner.suppressed_sends.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(suppressed, "degraded mode: coordinator send skipped");
            return;
        }

        let sender = self.inner.outbound.read().clone();
        match sender {
            Some(tx) => {
                if tx.try_send(text).is_err() {
                    warn!("outbound queue unavailable; message dropped");
                }
            }
            None => warn!("not connected; outbound message dropped"),
        }
    }

    /// Subscribe to inbound messages. Multiple concurrent subscribers are
    /// supported; each observes messages in arrival order. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorMessage> {
        self.inner.inbound.subscribe()
    }

    /// Inject a message into the subscriber stream without a socket.
    /// Keeps the event contract alive in degraded mode and lets tests
    /// script inbound traffic.
    pub fn publish_local(&self, message: CoordinatorMessage) {
        let _ = self.inner.inbound.send(message);
    }

    /// Close the transport and clear connection state. Idempotent; also
    /// leaves degraded mode so a later `connect` retries the coordinator.
    pub fn disconnect(&self) {
        self.inner.drop_connection();
        self.inner.degraded.store(false, Ordering::Relaxed);
        debug!("coordinator link disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paystream_signer::LocalSigner;

    fn local_settings() -> CoordinatorSettings {
        CoordinatorSettings {
            // Nothing listens here; connects fail fast with a refusal
            ws_url: "ws://127.0.0.1:9/ws".to_string(),
            connect_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_degrades() {
        let link = CoordinatorLink::new(local_settings());
        let signer = LocalSigner::from_secret_bytes(&[1u8; 32]);

        let status = link.connect("0xuser", &signer).await;

        assert_eq!(status, LinkStatus::Degraded);
        assert!(link.is_degraded());
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_idempotent_once_degraded() {
        let link = CoordinatorLink::new(local_settings());
        let signer = LocalSigner::from_secret_bytes(&[1u8; 32]);

        assert_eq!(link.connect("0xuser", &signer).await, LinkStatus::Degraded);
        // Second call returns the settled outcome without a fresh attempt
        assert_eq!(link.connect("0xuser", &signer).await, LinkStatus::Degraded);
    }

    #[tokio::test]
    async fn test_degraded_send_is_recorded_noop() {
        let link = CoordinatorLink::new(local_settings());
        let signer = LocalSigner::from_secret_bytes(&[1u8; 32]);
        link.connect("0xuser", &signer).await;

        link.send("{}".to_string());
        link.send("{}".to_string());

        assert_eq!(link.suppressed_sends(), 2);
    }

    #[tokio::test]
    async fn test_publish_local_reaches_all_subscribers_in_order() {
        let link = CoordinatorLink::new(local_settings());
        let mut first = link.subscribe();
        let mut second = link.subscribe();

        link.publish_local(CoordinatorMessage::SessionCreated {
            session_id: "session_a".into(),
        });
        link.publish_local(CoordinatorMessage::Error {
            message: "boom".into(),
        });

        for rx in [&mut first, &mut second] {
            assert!(matches!(
                rx.recv().await.unwrap(),
                CoordinatorMessage::SessionCreated { .. }
            ));
            assert!(matches!(
                rx.recv().await.unwrap(),
                CoordinatorMessage::Error { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_disconnect_clears_degraded_state() {
        let link = CoordinatorLink::new(local_settings());
        let signer = LocalSigner::from_secret_bytes(&[1u8; 32]);
        link.connect("0xuser", &signer).await;
        assert!(link.is_degraded());

        link.disconnect();
        assert!(!link.is_degraded());
        assert_eq!(link.state(), LinkState::Disconnected);

        // Idempotent
        link.disconnect();
        assert_eq!(link.state(), LinkState::Disconnected);
    }
}
