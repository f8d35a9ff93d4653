// Pose streamer: one outbound link, send-on-change
//
// The tick thread owns the state machine. Connecting happens on a worker
// thread and writing on a writer thread; both report back over a channel
// that the tick drains in `poll`. Every connection gets a generation number
// so reports from a superseded connection are ignored.

use crate::net::{Connector, LinkTimeouts, PayloadFormat, PoseLink, TcpConnector};
use crate::types::{
    ConnectionState, Endpoint, EndpointError, HandPose, JointAngles, LinkConfig, LinkStatus,
    StatusBoard, DEFAULT_ALLOWED_PORTS,
};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct StreamerSettings {
    pub endpoint: Endpoint,
    pub allowed_ports: Vec<u16>,
    /// Minimum spacing between connection attempts triggered by ticks.
    pub reconnect_interval: Duration,
    /// How often an idle writer checks the link for inbound bytes.
    pub idle_drain_interval: Duration,
    pub format: PayloadFormat,
    pub enabled: bool,
}

impl StreamerSettings {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
            reconnect_interval: Duration::from_millis(1000),
            idle_drain_interval: Duration::from_millis(100),
            format: PayloadFormat::default(),
            enabled: true,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            allowed_ports: config.allowed_ports.clone(),
            reconnect_interval: config.reconnect_interval(),
            idle_drain_interval: config.idle_drain_interval(),
            format: PayloadFormat::new(config.payload_suffix.clone()),
            enabled: config.enabled,
        }
    }
}

/// What a tick did with the current payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Payload changed and was handed to the writer.
    Sent,
    /// Same payload as last time.
    Unchanged,
    /// Sending is switched off by the operator.
    Disabled,
    /// No link yet; a connection attempt may have been started.
    NotConnected,
}

enum LinkEvent<L> {
    Connected { generation: u64, link: L },
    ConnectFailed { generation: u64, error: io::Error },
    Lost { generation: u64, error: io::Error },
}

/// Writer thread handle with its depth-1 outbox.
struct Writer {
    outbox: flume::Sender<String>,
    // second receiver on the outbox, used to evict a payload the writer has
    // not picked up yet
    stale: flume::Receiver<String>,
    thread: JoinHandle<()>,
}

impl Writer {
    fn start<L: PoseLink>(
        link: L,
        events: flume::Sender<LinkEvent<L>>,
        generation: u64,
        idle: Duration,
    ) -> io::Result<Self> {
        let (outbox, inbox) = flume::bounded::<String>(1);
        let stale = inbox.clone();

        let thread = thread::Builder::new()
            .name("cobot-writer".to_string())
            .spawn(move || run_writer(link, inbox, events, generation, idle))?;

        Ok(Self {
            outbox,
            stale,
            thread,
        })
    }

    /// Queues the payload, replacing one that is still waiting.
    ///
    /// Returns false when the writer has already exited. `stale` keeps the
    /// outbox open, so the channel alone cannot tell. A writer that exits
    /// right after the check still reports `Lost`, which clears the dedup
    /// cache and the payload goes out again after reconnecting.
    fn offer(&self, payload: String) -> bool {
        if self.thread.is_finished() {
            return false;
        }
        if let Err(flume::TrySendError::Full(payload)) = self.outbox.try_send(payload) {
            if self.stale.try_recv().is_ok() {
                trace!("Dropped stale payload");
            }
            let _ = self.outbox.try_send(payload);
        }
        true
    }

    /// Stops the writer without waiting for it. A queued payload is
    /// discarded; a send already in progress finishes on the writer thread.
    fn detach(self) {
        let Writer {
            outbox,
            stale,
            thread,
        } = self;
        if stale.try_recv().is_ok() {
            trace!("Discarded queued payload");
        }
        drop(outbox);
        drop(stale);
        drop(thread);
    }

    /// Closes the outbox and waits for the writer to flush and exit.
    ///
    /// Blocks for at most two send timeouts (the send in progress plus the
    /// queued payload). Only used on shutdown.
    fn shutdown(self) {
        let Writer {
            outbox,
            stale,
            thread,
        } = self;
        drop(outbox);
        drop(stale);

        if thread.join().is_err() {
            warn!("Writer thread panicked");
        }
    }
}

fn run_writer<L: PoseLink>(
    mut link: L,
    inbox: flume::Receiver<String>,
    events: flume::Sender<LinkEvent<L>>,
    generation: u64,
    idle: Duration,
) {
    loop {
        let result = match inbox.recv_timeout(idle) {
            Ok(payload) => link
                .drain_inbound()
                .and_then(|_| link.send(payload.as_bytes()))
                .map(|_| trace!("Sent: {}", payload)),
            Err(flume::RecvTimeoutError::Timeout) => link.drain_inbound().map(|_| ()),
            Err(flume::RecvTimeoutError::Disconnected) => break,
        };

        if let Err(error) = result {
            let _ = events.send(LinkEvent::Lost { generation, error });
            break;
        }
    }

    link.close();
    debug!("Writer for link generation {} stopped", generation);
}

/// Streams `<pose>;<J1>,<J2>,<J3>,<J4><suffix>` lines to the arm controller,
/// only when the line differs from the previous one.
pub struct PoseStreamer<C: Connector = TcpConnector> {
    connector: Arc<C>,
    settings: StreamerSettings,
    state: ConnectionState,
    last_sent: Option<String>,
    status: StatusBoard,
    events_tx: flume::Sender<LinkEvent<C::Link>>,
    events_rx: flume::Receiver<LinkEvent<C::Link>>,
    writer: Option<Writer>,
    generation: u64,
    last_attempt: Option<Instant>,
}

impl PoseStreamer<TcpConnector> {
    pub fn from_config(config: &LinkConfig) -> Self {
        let timeouts = LinkTimeouts {
            connect: config.connect_timeout(),
            send: config.send_timeout(),
            receive: config.receive_timeout(),
        };
        Self::new(
            TcpConnector::new(timeouts),
            StreamerSettings::from_config(config),
        )
    }
}

impl<C: Connector> PoseStreamer<C> {
    pub fn new(connector: C, settings: StreamerSettings) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            connector: Arc::new(connector),
            settings,
            state: ConnectionState::Disconnected,
            last_sent: None,
            status: StatusBoard::new(),
            events_tx,
            events_rx,
            writer: None,
            generation: 0,
            last_attempt: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.settings.endpoint
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Turns sending on or off. The connection is left alone.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.settings.enabled != enabled {
            info!("Pose streaming {}", if enabled { "ENABLED" } else { "DISABLED" });
        }
        self.settings.enabled = enabled;
    }

    pub fn toggle_enabled(&mut self) -> bool {
        self.set_enabled(!self.settings.enabled);
        self.settings.enabled
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// Operator-facing warning text.
    pub fn status_text(&self) -> String {
        self.status.render()
    }

    pub fn has_warning(&self) -> bool {
        self.status.has_warning()
    }

    pub fn link_status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            enabled: self.settings.enabled,
            endpoint: self.settings.endpoint.to_string(),
            message: self.status.render(),
        }
    }

    /// Starts a connection attempt on a worker thread.
    ///
    /// Invalid configuration is recorded in the status text and returned;
    /// no socket is opened in that case. A request while an attempt is
    /// already in flight, or while connected, does nothing.
    pub fn connect(&mut self) -> Result<(), EndpointError> {
        match self.state {
            ConnectionState::Connecting => {
                debug!("Connect requested while already connecting, ignored");
                return Ok(());
            }
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Disconnected => {}
        }

        self.last_attempt = Some(Instant::now());

        let check = self.settings.endpoint.validate(&self.settings.allowed_ports);
        self.status.record_endpoint_check(&check);
        if let Err(e) = check {
            warn!("Not connecting to {}: {}", self.settings.endpoint, e);
            return Err(e);
        }

        self.generation += 1;
        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let endpoint = self.settings.endpoint.clone();
        let events = self.events_tx.clone();

        info!("Trying connection to {}", endpoint);

        let spawned = thread::Builder::new()
            .name("cobot-connect".to_string())
            .spawn(move || {
                let event = match connector.connect(&endpoint) {
                    Ok(link) => LinkEvent::Connected { generation, link },
                    Err(error) => LinkEvent::ConnectFailed { generation, error },
                };
                let _ = events.send(event);
            });

        match spawned {
            Ok(_) => self.state = ConnectionState::Connecting,
            Err(e) => {
                warn!("Could not start connect worker: {}", e);
                self.status.connect_failed();
                self.state = ConnectionState::Disconnected;
            }
        }

        Ok(())
    }

    /// Applies everything the worker threads reported since the last call.
    pub fn poll(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// One control tick: picks up link changes, then sends the pose if it
    /// changed since the last send.
    pub fn tick(&mut self, pose: HandPose, angles: &JointAngles) -> TickOutcome {
        self.poll();

        match self.state {
            ConnectionState::Disconnected => {
                self.status.link_down();
                self.try_reconnect();
                return TickOutcome::NotConnected;
            }
            ConnectionState::Connecting => return TickOutcome::NotConnected,
            ConnectionState::Connected => self.status.link_up(),
        }

        if !self.settings.enabled {
            return TickOutcome::Disabled;
        }

        let payload = self.settings.format.encode(pose, angles);
        if self.last_sent.as_deref() == Some(payload.as_str()) {
            return TickOutcome::Unchanged;
        }

        let queued = match &self.writer {
            Some(writer) => writer.offer(payload.clone()),
            None => false,
        };
        if !queued {
            return TickOutcome::NotConnected;
        }

        debug!("Queued pose: {}", payload);
        self.last_sent = Some(payload);
        TickOutcome::Sent
    }

    /// Replaces the endpoint. Any current link is dropped.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        if endpoint != self.settings.endpoint {
            info!("Endpoint changed to {}", endpoint);
        }
        self.disconnect();
        self.settings.endpoint = endpoint;
        self.last_attempt = None;
    }

    /// Drops the link (if any) and cancels interest in a pending attempt.
    ///
    /// Does not wait for the writer, so a stalled peer cannot hold up the
    /// caller. A payload not yet picked up is never sent.
    pub fn disconnect(&mut self) {
        // results of an in-flight connect are now stale
        self.generation += 1;
        if let Some(writer) = self.writer.take() {
            writer.detach();
        }
        if self.state != ConnectionState::Disconnected {
            debug!("Link to {} dropped", self.settings.endpoint);
        }
        self.state = ConnectionState::Disconnected;
        self.last_sent = None;
        self.status.link_down();
    }

    /// Flushes the queued payload, half-closes the socket and waits for the
    /// writer to exit.
    pub fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            info!("Closing link to {}", self.settings.endpoint);
            writer.shutdown();
        }
        self.disconnect();
    }

    fn try_reconnect(&mut self) {
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.settings.reconnect_interval {
                return;
            }
        }
        // configuration problems already land in the status text
        let _ = self.connect();
    }

    fn handle_event(&mut self, event: LinkEvent<C::Link>) {
        match event {
            LinkEvent::Connected { generation, mut link } => {
                if generation != self.generation || self.state != ConnectionState::Connecting {
                    debug!("Discarding link from superseded attempt {}", generation);
                    link.close();
                    return;
                }

                match Writer::start(
                    link,
                    self.events_tx.clone(),
                    generation,
                    self.settings.idle_drain_interval,
                ) {
                    Ok(writer) => {
                        info!("Connected to {}", self.settings.endpoint);
                        self.writer = Some(writer);
                        self.state = ConnectionState::Connected;
                        self.status.connect_succeeded();
                        self.status.link_up();
                    }
                    Err(e) => {
                        warn!("Could not start writer: {}", e);
                        self.state = ConnectionState::Disconnected;
                        self.status.connect_failed();
                        self.status.link_down();
                    }
                }
            }
            LinkEvent::ConnectFailed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                warn!("Connection to {} failed: {}", self.settings.endpoint, error);
                self.state = ConnectionState::Disconnected;
                self.status.connect_failed();
                self.status.link_down();
            }
            LinkEvent::Lost { generation, error } => {
                if generation != self.generation {
                    return;
                }
                warn!("Link to {} lost: {}", self.settings.endpoint, error);
                if let Some(writer) = self.writer.take() {
                    writer.detach();
                }
                self.state = ConnectionState::Disconnected;
                // nothing was confirmed, so the next tick resends
                self.last_sent = None;
                self.status.link_down();
                self.try_reconnect();
            }
        }
    }
}

impl<C: Connector> Drop for PoseStreamer<C> {
    fn drop(&mut self) {
        self.close();
    }
}
