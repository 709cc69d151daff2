use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use tokio_tungstenite::tungstenite::Message;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::protocol::{parse_frame, Frame};
use crate::state::{ConnectionStatus, SessionState};

/// Inbound half of an open socket.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

/// Opens the transport underneath a [`SessionSocket`].
///
/// [`WsConnector`] is the real WebSocket implementation; tests substitute
/// scripted connections.
pub trait Connector: Send + Sync + 'static {
    /// Open one connection to `url`.
    fn connect(&self, url: &str) -> impl Future<Output = Result<InboundStream>> + Send;
}

/// Connects with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<InboundStream> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Box::pin(ws.map(|msg| msg.map_err(SessionError::from))))
    }
}

/// Normalized notification delivered to [`SessionSocket::on_event`] handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection indicator changed.
    Connection(ConnectionStatus),
    /// A recognized frame was applied to the session state.
    Frame(Frame),
}

type Handler = Box<dyn Fn(&SessionEvent) + Send + Sync>;

struct Inner<C> {
    connector: C,
    url: String,
    reconnect_delay: Duration,
    state: watch::Sender<SessionState>,
    handlers: Mutex<Vec<Handler>>,
    shutdown: watch::Sender<bool>,
}

impl<C> Inner<C> {
    fn emit(&self, event: &SessionEvent) {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(event);
        }
    }

    fn set_connection(&self, connection: ConnectionStatus) {
        let changed = self.state.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            *state = state.with_connection(connection);
            true
        });
        if changed {
            self.emit(&SessionEvent::Connection(connection));
        }
    }

    fn handle_text(&self, text: &str) {
        match parse_frame(text) {
            Ok(Some(Frame::Pong)) => {}
            Ok(Some(frame)) => {
                self.state.send_modify(|state| *state = state.apply(&frame));
                self.emit(&SessionEvent::Frame(frame));
            }
            Ok(None) => tracing::debug!("ignoring frame with unrecognized type"),
            Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
        }
    }
}

async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

async fn run<C: Connector>(inner: Arc<Inner<C>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        inner.set_connection(ConnectionStatus::Connecting);
        tracing::debug!(url = %inner.url, "connecting to progress socket");

        let connected = tokio::select! {
            biased;
            _ = closed(&mut shutdown) => return,
            result = inner.connector.connect(&inner.url) => result,
        };

        match connected {
            Ok(mut stream) => {
                inner.set_connection(ConnectionStatus::Connected);
                tracing::info!(url = %inner.url, "progress socket connected");
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = closed(&mut shutdown) => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(Message::Text(text))) => inner.handle_text(&text),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "progress socket error");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %inner.url, "progress socket connection failed");
            }
        }

        inner.set_connection(ConnectionStatus::Disconnected);
        tracing::info!(
            delay_ms = inner.reconnect_delay.as_millis() as u64,
            "progress socket disconnected, reconnecting"
        );

        tokio::select! {
            biased;
            _ = closed(&mut shutdown) => return,
            _ = tokio::time::sleep(inner.reconnect_delay) => {}
        }
    }
}

/// Owner of the progress socket and the [`SessionState`] derived from it.
///
/// One background task holds at most one live connection. When the
/// connection drops it waits the configured delay and tries again, forever,
/// until [`close`](Self::close) is called. Every inbound frame replaces the
/// published state; readers get snapshots by value.
///
/// # Example
/// ```no_run
/// use faceswap_session::{SessionConfig, SessionSocket};
///
/// # async fn example() -> faceswap_session::Result<()> {
/// let socket = SessionSocket::new(&SessionConfig::default());
/// socket.on_event(|event| println!("{:?}", event));
/// socket.connect()?;
///
/// let mut updates = socket.subscribe();
/// while updates.changed().await.is_ok() {
///     let state = updates.borrow_and_update().clone();
///     if state.is_complete {
///         println!("done: {:?}", state.output_path);
///         break;
///     }
/// }
/// socket.close().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionSocket<C: Connector = WsConnector> {
    inner: Arc<Inner<C>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionSocket<WsConnector> {
    /// A socket for `config.ws_url` using the real WebSocket transport.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> SessionSocket<C> {
    /// A socket using a custom transport.
    pub fn with_connector(config: &SessionConfig, connector: C) -> Self {
        let (state, _) = watch::channel(SessionState::new(config.log_capacity));
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                connector,
                url: config.ws_url.clone(),
                reconnect_delay: config.reconnect_delay,
                state,
                handlers: Mutex::new(Vec::new()),
                shutdown,
            }),
            task: Mutex::new(None),
        }
    }

    /// Address this socket connects to.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Start the connection task, or keep the one already running.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`SessionError::Closed`] after [`close`](Self::close).
    pub fn connect(&self) -> Result<()> {
        if *self.inner.shutdown.borrow() {
            return Err(SessionError::Closed);
        }

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let shutdown = self.inner.shutdown.subscribe();
        *task = Some(tokio::spawn(run(inner, shutdown)));
        Ok(())
    }

    /// Register an observer called once per normalized event, in order.
    ///
    /// Handlers run on the connection task and must not register further
    /// handlers from inside the callback.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state replacement.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Return the session to idle for an explicit reset or a new run.
    /// The connection is left as it is.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| *state = state.reset());
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Tear down the connection and cancel any pending reconnection.
    ///
    /// Waits for the connection task to exit; no attempts happen afterwards.
    pub async fn close(&self) {
        self.inner.shutdown.send_replace(true);
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "progress socket task ended abnormally");
            }
        }
        self.inner.set_connection(ConnectionStatus::Disconnected);
        tracing::debug!(url = %self.inner.url, "progress socket closed");
    }
}

impl<C: Connector> Drop for SessionSocket<C> {
    fn drop(&mut self) {
        self.inner.shutdown.send_replace(true);
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
