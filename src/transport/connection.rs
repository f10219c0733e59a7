//! Connection lifecycle and receive loop.
//!
//! # State Machine
//!
//! ```text
//!              connect()                probe ok
//!   Idle ───────────────► Connecting ──────────────► Running
//!   Failed ─────────────►     │    ▲                    │
//!                   probe fails│    │ next frame read   │ read error
//!                             ▼    └────────────────────┘ (same socket)
//!                           Failed ◄──── stream closed
//! ```
//!
//! # Session Task
//!
//! Each opened transport runs in its own tokio task that handles:
//!
//! - Incoming frames (text → dispatcher, pong → probe, rest discarded)
//! - Probe and shutdown commands from the manager
//!
//! A read error never ends the loop; the read is issued again on the same
//! transport, after `receive_retry_delay` if one is configured. Shutdown and
//! probe commands are still served during that delay. The loop ends when the
//! stream closes or on shutdown.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ChannelConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{ChannelEvent, EventBus};

use super::socket::{Connector, Frame, Transport, WsConnector};

// ============================================================================
// Constants
// ============================================================================

/// How long a replaced or disconnected session gets to close its socket.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the controller connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection attempted, or explicitly disconnected.
    Idle,
    /// Socket opening, probe outstanding, or re-listening after a read error.
    Connecting,
    /// Probe answered; commands are flowing.
    Running,
    /// Open or probe failed, or the stream closed.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the session task.
enum SessionCommand {
    /// Send a ping and report when the matching pong arrives.
    Probe {
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close the transport and stop.
    Shutdown,
}

/// The live session slot.
struct Session {
    id: SessionId,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the manager handle and session tasks.
struct Shared {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<CommandDispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    current: Mutex<Option<Session>>,
    connect_lock: tokio::sync::Mutex<()>,
    probe_seq: AtomicU64,
}

impl Shared {
    fn bus(&self) -> &EventBus {
        self.dispatcher.bus()
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Moves `from → to` only if `id` is the current session and the state
    /// is still `from`.
    fn transition_if_current(
        &self,
        id: SessionId,
        from: ConnectionState,
        to: ConnectionState,
    ) -> bool {
        let current = self.current.lock();
        if current.as_ref().is_none_or(|s| s.id != id) || self.state() != from {
            return false;
        }
        self.set_state(to);
        true
    }

    /// Sets `state` only if `id` is the current session.
    fn set_state_if_current(&self, id: SessionId, state: ConnectionState) -> bool {
        let current = self.current.lock();
        if current.as_ref().is_none_or(|s| s.id != id) {
            return false;
        }
        self.set_state(state);
        true
    }

    /// Clears the session slot after its stream closed. Inert for stale ids.
    fn release_closed(&self, id: SessionId) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_none_or(|s| s.id != id) {
            return false;
        }
        *current = None;
        self.set_state(ConnectionState::Failed);
        true
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the single connection to the remote controller.
///
/// Cheap to clone; clones share the same connection.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::websocket(config, dispatcher);
/// manager.connect().await?;
/// assert_eq!(manager.state(), ConnectionState::Running);
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Shared>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("state", &self.state())
            .field("session", &self.session_id())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager that opens transports through `connector`.
    #[must_use]
    pub fn new(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<CommandDispatcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(Shared {
                config,
                connector,
                dispatcher,
                state_tx,
                current: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                probe_seq: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a manager over real WebSocket client sockets.
    #[must_use]
    pub fn websocket(config: ChannelConfig, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self::new(config, Arc::new(WsConnector), dispatcher)
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Subscribes to state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.config.endpoint
    }

    /// Returns the configuration this manager was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Returns the event bus events are broadcast on.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        self.inner.dispatcher.bus()
    }

    /// Returns the id of the live session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.current.lock().as_ref().map(|s| s.id)
    }

    /// Connects to the controller.
    ///
    /// A no-op while [`ConnectionState::Running`]. Otherwise any stale
    /// transport is cancelled, a new one is opened, its receive loop is
    /// started, and a liveness probe is awaited. On success the state becomes
    /// `Running` and [`ChannelEvent::Connected`] is broadcast once.
    ///
    /// Concurrent calls are serialized; the later one observes `Running`.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the socket cannot be opened
    /// - [`Error::ProbeTimeout`] if the probe is not answered in time
    /// - [`Error::ConnectionClosed`] if the stream closes during the probe
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;

        if self.state() == ConnectionState::Running {
            debug!("WebSocket already running, skipping reconnect");
            return Ok(());
        }

        self.cancel_current().await;
        self.inner.set_state(ConnectionState::Connecting);

        let endpoint = &self.inner.config.endpoint;
        info!(%endpoint, "Attempting WebSocket connection");

        let transport = match self.inner.connector.open(endpoint).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(%endpoint, error = %e, "WebSocket connection failed");
                self.inner.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };

        let id = SessionId::next();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            Arc::clone(&self.inner),
            id,
            transport,
            command_rx,
        ));

        *self.inner.current.lock() = Some(Session {
            id,
            command_tx: command_tx.clone(),
            task,
        });

        match self.probe(&command_tx).await {
            Ok(()) => {
                if self.inner.set_state_if_current(id, ConnectionState::Running) {
                    info!(session = %id, "WebSocket connected and responsive");
                    self.bus().emit(&ChannelEvent::Connected { session: id });
                    Ok(())
                } else {
                    Err(Error::ConnectionClosed)
                }
            }
            Err(e) => {
                warn!(session = %id, error = %e, "WebSocket liveness probe failed");
                self.inner.set_state_if_current(id, ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// Closes the current connection, if any, and returns to
    /// [`ConnectionState::Idle`].
    pub async fn disconnect(&self) {
        let _guard = self.inner.connect_lock.lock().await;

        let session = self.inner.current.lock().take();
        self.inner.set_state(ConnectionState::Idle);

        let Some(session) = session else {
            return;
        };

        let id = session.id;
        shutdown_session(session).await;

        info!(session = %id, "WebSocket disconnected");
    }

    /// Stops the current session, if any, before a new one is opened.
    async fn cancel_current(&self) {
        let session = self.inner.current.lock().take();
        if let Some(session) = session {
            debug!(session = %session.id, "Cancelling stale transport");
            shutdown_session(session).await;
        }
    }

    /// Sends a ping through the session and waits for its pong.
    async fn probe(&self, command_tx: &mpsc::UnboundedSender<SessionCommand>) -> Result<()> {
        let seq = self.inner.probe_seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        command_tx
            .send(SessionCommand::Probe {
                payload: seq.to_be_bytes().to_vec(),
                reply: reply_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        let probe_timeout = self.inner.config.probe_timeout;
        match timeout(probe_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::probe_timeout(probe_timeout.as_millis() as u64)),
        }
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Asks a detached session to close its transport, aborting the task if it
/// does not finish within [`SHUTDOWN_GRACE`].
async fn shutdown_session(session: Session) {
    let _ = session.command_tx.send(SessionCommand::Shutdown);
    let abort = session.task.abort_handle();
    if timeout(SHUTDOWN_GRACE, session.task).await.is_err() {
        debug!(session = %session.id, "Session did not stop in time, aborting");
        abort.abort();
    }
}

/// Receive loop for one transport.
async fn run_session(
    shared: Arc<Shared>,
    id: SessionId,
    mut transport: Box<dyn Transport>,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
) {
    let retry_delay = shared.config.receive_retry_delay;
    let mut pending_probe: Option<(Vec<u8>, oneshot::Sender<Result<()>>)> = None;
    let mut degraded = false;

    // Armed after a read error when a retry delay is configured. Commands are
    // still served while it runs; reads are not.
    let retry = sleep(Duration::ZERO);
    tokio::pin!(retry);
    let mut backing_off = false;

    debug!(session = %id, "Receive loop started");

    loop {
        tokio::select! {
            biased;

            // Commands from the manager
            command = command_rx.recv() => {
                match command {
                    Some(SessionCommand::Probe { payload, reply }) => {
                        match transport.send_ping(payload.clone()).await {
                            Ok(()) => {
                                trace!(session = %id, "Probe ping sent");
                                pending_probe = Some((payload, reply));
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }

                    Some(SessionCommand::Shutdown) | None => {
                        debug!(session = %id, "Session shutdown");
                        transport.close().await;
                        return;
                    }
                }
            }

            () = &mut retry, if backing_off => {
                trace!(session = %id, "Retry delay elapsed, reading again");
                backing_off = false;
            }

            // Incoming frames from the controller
            frame = transport.recv(), if !backing_off => {
                match frame {
                    Some(Ok(frame)) => {
                        if degraded {
                            degraded = false;
                            if shared.transition_if_current(
                                id,
                                ConnectionState::Connecting,
                                ConnectionState::Running,
                            ) {
                                info!(session = %id, "Receive recovered");
                            }
                        }

                        match frame {
                            Frame::Text(text) => {
                                debug!(session = %id, text = %text, "Message received");
                                shared.dispatcher.dispatch(&text);
                            }

                            Frame::Pong(payload) => {
                                match pending_probe.take() {
                                    Some((expected, reply)) if expected == payload => {
                                        let _ = reply.send(Ok(()));
                                    }
                                    other => {
                                        trace!(session = %id, "Unsolicited pong");
                                        pending_probe = other;
                                    }
                                }
                            }

                            Frame::Close => {
                                debug!(session = %id, "WebSocket closed by remote");
                                break;
                            }

                            Frame::Binary(data) => {
                                debug!(session = %id, len = data.len(), "Received non-text WebSocket message");
                            }

                            Frame::Ping(_) => {
                                trace!(session = %id, "Ping from remote");
                            }
                        }
                    }

                    Some(Err(e)) => {
                        warn!(session = %id, error = %e, "WebSocket receive error, listening again");
                        if shared.transition_if_current(
                            id,
                            ConnectionState::Running,
                            ConnectionState::Connecting,
                        ) {
                            degraded = true;
                        }
                        if !retry_delay.is_zero() {
                            retry.as_mut().reset(Instant::now() + retry_delay);
                            backing_off = true;
                        }
                    }

                    None => {
                        debug!(session = %id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    transport.close().await;

    if shared.release_closed(id) {
        shared.bus().emit(&ChannelEvent::Disconnected { session: id });
    }

    debug!(session = %id, "Receive loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::dispatch::{ActionExecutor, SimulatedCamera};

    // ------------------------------------------------------------------------
    // Scripted transport
    // ------------------------------------------------------------------------

    /// Step the scripted transport returns from `recv`.
    #[derive(Debug)]
    enum Step {
        Frame(Frame),
        Fail,
        End,
    }

    struct ScriptedTransport {
        script_rx: mpsc::UnboundedReceiver<Step>,
        loopback_tx: mpsc::UnboundedSender<Step>,
        answer_pings: bool,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn recv(&mut self) -> Option<Result<Frame>> {
            match self.script_rx.recv().await? {
                Step::Frame(frame) => Some(Ok(frame)),
                Step::Fail => Some(Err(Error::connection("simulated read failure"))),
                Step::End => None,
            }
        }

        async fn send_ping(&mut self, payload: Vec<u8>) -> Result<()> {
            if self.answer_pings {
                let _ = self.loopback_tx.send(Step::Frame(Frame::Pong(payload)));
            }
            Ok(())
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Hands out one scripted transport per `open`.
    struct ScriptedConnector {
        scripts: Mutex<VecDeque<ScriptedTransport>>,
        opened: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(VecDeque::new()),
                opened: AtomicUsize::new(0),
            }
        }

        /// Queues a transport and returns the sender that feeds it.
        fn push(&self, answer_pings: bool) -> mpsc::UnboundedSender<Step> {
            self.push_tracked(answer_pings).0
        }

        /// Like [`push`](Self::push), also returning a flag set when the
        /// transport is closed.
        fn push_tracked(&self, answer_pings: bool) -> (mpsc::UnboundedSender<Step>, Arc<AtomicBool>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            self.scripts.lock().push_back(ScriptedTransport {
                script_rx: rx,
                loopback_tx: tx.clone(),
                answer_pings,
                closed: Arc::clone(&closed),
            });
            (tx, closed)
        }

        fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, _endpoint: &Url) -> Result<Box<dyn Transport>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            match self.scripts.lock().pop_front() {
                Some(transport) => Ok(Box::new(transport)),
                None => Err(Error::connection("no scripted transport left")),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Fixture
    // ------------------------------------------------------------------------

    struct Fixture {
        manager: ConnectionManager,
        connector: Arc<ScriptedConnector>,
        camera: Arc<SimulatedCamera>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    }

    fn fixture() -> Fixture {
        fixture_with_retry_delay(Duration::ZERO)
    }

    fn fixture_with_retry_delay(retry_delay: Duration) -> Fixture {
        let config = ChannelConfig::builder()
            .endpoint("ws://127.0.0.1:9876/")
            .probe_timeout(Duration::from_millis(200))
            .receive_retry_delay(retry_delay)
            .build()
            .expect("valid config");

        let bus = Arc::new(EventBus::new());
        let (_, events) = bus.subscribe_channel();
        let camera = Arc::new(SimulatedCamera::new());
        let dispatcher = Arc::new(CommandDispatcher::new(
            &config,
            bus,
            Arc::clone(&camera) as Arc<dyn ActionExecutor>,
        ));
        let connector = Arc::new(ScriptedConnector::new());
        let manager = ConnectionManager::new(
            config,
            Arc::clone(&connector) as Arc<dyn Connector>,
            dispatcher,
        );

        Fixture {
            manager,
            connector,
            camera,
            events,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> Vec<ChannelEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.watch_state();
        timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
            .await
            .expect("state reached in time")
            .expect("watch open");
    }

    async fn wait_for_photos(camera: &SimulatedCamera, photos: u64) {
        timeout(Duration::from_secs(2), async {
            while camera.state().photos_taken < photos {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("photos taken in time");
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Running.to_string(), "running");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_connect_reaches_running() {
        let mut fx = fixture();
        let _script = fx.connector.push(true);

        assert_eq!(fx.manager.state(), ConnectionState::Idle);
        fx.manager.connect().await.expect("connect succeeds");

        assert_eq!(fx.manager.state(), ConnectionState::Running);
        let session = fx.manager.session_id().expect("live session");
        assert_eq!(drain(&mut fx.events), vec![ChannelEvent::Connected { session }]);
    }

    #[tokio::test]
    async fn test_connect_while_running_is_noop() {
        let mut fx = fixture();
        let _script = fx.connector.push(true);

        fx.manager.connect().await.expect("first connect");
        let session = fx.manager.session_id();
        fx.manager.connect().await.expect("second connect");
        fx.manager.connect().await.expect("third connect");

        assert_eq!(fx.connector.opened(), 1);
        assert_eq!(fx.manager.session_id(), session);
        let connected = drain(&mut fx.events)
            .into_iter()
            .filter(|e| matches!(e, ChannelEvent::Connected { .. }))
            .count();
        assert_eq!(connected, 1);
    }

    #[tokio::test]
    async fn test_concurrent_connects_open_one_transport() {
        let fx = fixture();
        let _script = fx.connector.push(true);

        let (a, b) = tokio::join!(fx.manager.connect(), fx.manager.connect());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(fx.connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_probe_timeout_fails() {
        let mut fx = fixture();
        let _script = fx.connector.push(false);

        let err = fx.manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::ProbeTimeout { timeout_ms: 200 }));
        assert_eq!(fx.manager.state(), ConnectionState::Failed);
        assert!(drain(&mut fx.events).is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_fails() {
        let fx = fixture();
        let err = fx.manager.connect().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(fx.manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_reconnect_after_failure_replaces_transport() {
        let mut fx = fixture();
        let _dead = fx.connector.push(false);
        let _live = fx.connector.push(true);

        assert!(fx.manager.connect().await.is_err());
        fx.manager.connect().await.expect("second attempt");

        assert_eq!(fx.connector.opened(), 2);
        assert_eq!(fx.manager.state(), ConnectionState::Running);
        assert_eq!(drain(&mut fx.events).len(), 1);
    }

    #[tokio::test]
    async fn test_frames_dispatched_in_order() {
        let fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        for text in ["zoom-in", "zoom-in", "zoom-out", "picture"] {
            script.send(Step::Frame(Frame::Text(text.into()))).unwrap();
        }
        wait_for_photos(&fx.camera, 1).await;

        assert_eq!(fx.camera.state().zoom, 1.5);
    }

    #[tokio::test]
    async fn test_read_failures_do_not_stop_listening() {
        let fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        for _ in 0..5 {
            script.send(Step::Fail).unwrap();
        }
        script.send(Step::Frame(Frame::Text("picture".into()))).unwrap();
        wait_for_photos(&fx.camera, 1).await;

        script.send(Step::Fail).unwrap();
        script.send(Step::Frame(Frame::Text("picture".into()))).unwrap();
        wait_for_photos(&fx.camera, 2).await;

        // Same socket throughout.
        assert_eq!(fx.connector.opened(), 1);
        wait_for_state(&fx.manager, ConnectionState::Running).await;
    }

    #[tokio::test]
    async fn test_read_failure_marks_connecting_until_next_frame() {
        let mut fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Fail).unwrap();
        wait_for_state(&fx.manager, ConnectionState::Connecting).await;

        script.send(Step::Frame(Frame::Binary(vec![0]))).unwrap();
        wait_for_state(&fx.manager, ConnectionState::Running).await;

        let connected = drain(&mut fx.events)
            .into_iter()
            .filter(|e| matches!(e, ChannelEvent::Connected { .. }))
            .count();
        assert_eq!(connected, 1);
    }

    #[tokio::test]
    async fn test_read_resumes_after_retry_delay() {
        let fx = fixture_with_retry_delay(Duration::from_millis(50));
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Fail).unwrap();
        script.send(Step::Frame(Frame::Text("picture".into()))).unwrap();
        wait_for_photos(&fx.camera, 1).await;

        assert_eq!(fx.connector.opened(), 1);
        wait_for_state(&fx.manager, ConnectionState::Running).await;
    }

    #[tokio::test]
    async fn test_reconnect_during_retry_delay_closes_old_transport() {
        let fx = fixture_with_retry_delay(Duration::from_secs(30));
        let (script, first_closed) = fx.connector.push_tracked(true);
        let (_live, second_closed) = fx.connector.push_tracked(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Fail).unwrap();
        wait_for_state(&fx.manager, ConnectionState::Connecting).await;

        fx.manager.connect().await.expect("reconnect");

        // The old transport is closed by the time connect() returns.
        assert!(first_closed.load(Ordering::SeqCst));
        assert!(!second_closed.load(Ordering::SeqCst));
        assert_eq!(fx.connector.opened(), 2);
        assert_eq!(fx.manager.state(), ConnectionState::Running);
    }

    #[tokio::test]
    async fn test_disconnect_during_retry_delay_is_prompt() {
        let fx = fixture_with_retry_delay(Duration::from_secs(30));
        let (script, closed) = fx.connector.push_tracked(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Fail).unwrap();
        wait_for_state(&fx.manager, ConnectionState::Connecting).await;

        timeout(Duration::from_millis(500), fx.manager.disconnect())
            .await
            .expect("disconnect does not wait out the retry delay");
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(fx.manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_non_text_frames_are_discarded() {
        let fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Frame(Frame::Binary(b"picture".to_vec()))).unwrap();
        script.send(Step::Frame(Frame::Ping(vec![1]))).unwrap();
        script.send(Step::Frame(Frame::Pong(vec![42]))).unwrap();
        script.send(Step::Frame(Frame::Text("picture".into()))).unwrap();
        wait_for_photos(&fx.camera, 1).await;

        assert_eq!(fx.camera.state().photos_taken, 1);
        assert_eq!(fx.manager.state(), ConnectionState::Running);
    }

    #[tokio::test]
    async fn test_stream_end_fails_and_emits_disconnected() {
        let mut fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");
        let session = fx.manager.session_id().expect("live session");

        script.send(Step::End).unwrap();

        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match fx.events.recv().await {
                    Some(ChannelEvent::Disconnected { session }) => break session,
                    Some(_) => continue,
                    None => panic!("event bus dropped"),
                }
            }
        })
        .await
        .expect("disconnected in time");

        assert_eq!(closed, session);
        assert_eq!(fx.manager.state(), ConnectionState::Failed);
        assert_eq!(fx.manager.session_id(), None);
    }

    #[tokio::test]
    async fn test_close_frame_ends_session() {
        let fx = fixture();
        let script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        script.send(Step::Frame(Frame::Close)).unwrap();
        wait_for_state(&fx.manager, ConnectionState::Failed).await;
    }

    #[tokio::test]
    async fn test_disconnect_returns_to_idle() {
        let mut fx = fixture();
        let _script = fx.connector.push(true);
        fx.manager.connect().await.expect("connect");

        fx.manager.disconnect().await;

        assert_eq!(fx.manager.state(), ConnectionState::Idle);
        assert_eq!(fx.manager.session_id(), None);
        // Explicit disconnect is not reported as a remote close.
        assert!(
            !drain(&mut fx.events)
                .iter()
                .any(|e| matches!(e, ChannelEvent::Disconnected { .. }))
        );
    }

    #[tokio::test]
    async fn test_stale_session_is_inert() {
        let fx = fixture();
        let stale = fx.connector.push(false);
        let _live = fx.connector.push(true);

        assert!(fx.manager.connect().await.is_err());
        fx.manager.connect().await.expect("second attempt");
        let live = fx.manager.session_id();

        // The replaced transport ending must not touch the live session.
        let _ = stale.send(Step::End);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(fx.manager.state(), ConnectionState::Running);
        assert_eq!(fx.manager.session_id(), live);
    }
}
