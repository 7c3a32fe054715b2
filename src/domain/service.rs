use std::sync::Arc;

use act_zero::{send, Actor, ActorResult, Addr, Produces, WeakAddr};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    Attempt, ChannelError, ConnectError, ConnectionEvent, ConnectionId, ConnectionRecord, ConnectionSnapshot,
    ConnectionTable, DeviceCapabilities, Endpoint, EventKind, IdAllocator, ObserverDirectory, OpenCallback,
    OpenRequest, OpenStatus, OpenTimeouts, PendingAttempts, ReadyState, RegistryConfig, RegistryError,
    SequenceChecker,
};
use crate::ports::{ConnectionObserver, Connector, EventLogger, EventSink};

type ConnectOutcome = std::result::Result<DeviceCapabilities, ConnectError>;

/// Actor owning every connection to remote devices.
///
/// All state is mutated from the actor's mailbox only. Connect attempts,
/// heartbeats and transport readers run as tokio tasks that post their
/// results back through a weak address.
pub struct ConnectionRegistry {
    config: RegistryConfig,
    connector: Arc<dyn Connector>,
    logger: Arc<dyn EventLogger>,
    ids: IdAllocator,
    table: ConnectionTable,
    observers: ObserverDirectory,
    pending: PendingAttempts,
    sequence: SequenceChecker,
    addr: WeakAddr<Self>,
}

#[async_trait]
impl Actor for ConnectionRegistry {
    async fn started(&mut self, addr: Addr<Self>) -> ActorResult<()> {
        self.addr = addr.downgrade();
        self.sequence.bind();
        debug!("connection registry bound to its actor context");
        Produces::ok(())
    }
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig, connector: Arc<dyn Connector>, logger: Arc<dyn EventLogger>) -> Self {
        Self {
            config,
            connector,
            logger,
            ids: IdAllocator::new(),
            table: ConnectionTable::new(),
            observers: ObserverDirectory::new(),
            pending: PendingAttempts::new(),
            sequence: SequenceChecker::new("ConnectionRegistry"),
            addr: WeakAddr::default(),
        }
    }

    pub fn logger(&self) -> Arc<dyn EventLogger> {
        self.logger.clone()
    }

    /// Open a connection to `request.endpoint`, or join the one already there.
    ///
    /// An already open connection resolves `callback` before returning. A
    /// connection still connecting queues `callback` behind the in-flight
    /// attempt.
    ///
    /// Capabilities are only checked against what the first request of an
    /// attempt asked for. Callers reusing or joining a connection get it as
    /// negotiated, whatever `request.capabilities` they pass; compare with
    /// the snapshot's `capabilities` when that matters.
    pub async fn open(&mut self, request: OpenRequest, callback: OpenCallback) -> ActorResult<ConnectionId> {
        self.sequence.check();
        self.logger
            .record_event(ConnectionId::INVALID, EventKind::OpenRequested, &request.endpoint.to_string());

        let existing = self.table.get_by_endpoint(&request.endpoint).map(|r| (r.id, r.state));
        let id = match existing {
            Some((id, ReadyState::Open)) => {
                if let (Some(name), Some(record)) = (request.observer.as_deref(), self.table.get_mut(id)) {
                    record.attach_observer(name);
                }
                self.logger.record_event(id, EventKind::Reused, &request.endpoint.to_string());
                callback.resolve(id, OpenStatus::Open);
                id
            }
            Some((id, _)) => {
                let attempt = self
                    .pending
                    .get_mut(id)
                    .unwrap_or_else(|| panic!("connecting record {} has no pending attempt", id));
                attempt.join(callback, request.observer);
                debug!("{} joined pending attempt to {} ({} waiting)", id, request.endpoint, attempt.waiting());
                self.logger.record_event(id, EventKind::AttemptJoined, &request.endpoint.to_string());
                id
            }
            None => self.start_attempt(request, callback),
        };
        Produces::ok(id)
    }

    fn start_attempt(&mut self, request: OpenRequest, callback: OpenCallback) -> ConnectionId {
        let id = self.ids.next();
        let endpoint = request.endpoint;
        let requested = request.capabilities;
        let timeouts = request.timeouts.unwrap_or_else(|| self.config.default_timeouts());

        let connection = self.connector.create(id, endpoint);
        self.table.insert(ConnectionRecord::new(
            id,
            endpoint,
            requested,
            timeouts,
            connection.clone(),
        ));

        let mut attempt = Attempt::new(id, endpoint);
        attempt.join(callback, request.observer);

        let events = self.event_sink(id);
        let registry = self.addr.clone();
        attempt.set_task(tokio::spawn(async move {
            let outcome = match timeout(timeouts.connect, connection.connect(endpoint, requested, events)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::ConnectTimeout),
            };
            send!(registry.complete_attempt(id, outcome));
        }));
        self.pending.start(attempt);

        info!("{} connecting to {} (timeout {:?})", id, endpoint, timeouts.connect);
        self.logger.record_event(id, EventKind::Connecting, &endpoint.to_string());
        id
    }

    /// Finalize attempt `id` with the result of its connect task.
    ///
    /// Results for attempts that were already resolved are ignored.
    pub async fn complete_attempt(&mut self, id: ConnectionId, outcome: ConnectOutcome) -> ActorResult<()> {
        self.sequence.check();
        let attempt = match self.pending.take(id) {
            Some(attempt) => attempt,
            None => {
                debug!("ignoring late connect result for {}", id);
                return Produces::ok(());
            }
        };

        let requested = match self.table.get(id) {
            Some(record) => record.capabilities,
            None => {
                attempt.resolve(OpenStatus::Failed(ConnectError::AlreadyClosedDuringSetup));
                return Produces::ok(());
            }
        };
        let outcome = outcome.and_then(|negotiated| {
            if negotiated.contains(requested) {
                Ok(negotiated)
            } else {
                Err(ConnectError::CapabilityMismatch { requested, negotiated })
            }
        });

        match outcome {
            Ok(negotiated) => {
                if let Err(e) = self.table.transition(id, ReadyState::Open) {
                    warn!("cannot open {}: {}", id, e);
                }
                if let Some(record) = self.table.get_mut(id) {
                    record.capabilities = negotiated;
                    record.last_activity = Instant::now();
                    for name in attempt.observers() {
                        record.attach_observer(name);
                    }
                    record.heartbeat = Self::spawn_heartbeat(self.addr.clone(), id, record.timeouts);
                }
                info!("{} open to {} (capabilities {})", id, attempt.endpoint, negotiated);
                self.logger.record_event(id, EventKind::Opened, &attempt.endpoint.to_string());
                attempt.resolve(OpenStatus::Open);
            }
            Err(error) => {
                if let Some(record) = self.table.remove(id) {
                    record.connection.close();
                }
                warn!("{} failed to connect to {}: {}", id, attempt.endpoint, error);
                self.logger.record_event(id, EventKind::ConnectFailed, &error.to_string());
                attempt.resolve(OpenStatus::Failed(error));
            }
        }
        Produces::ok(())
    }

    /// Close and forget connection `id`. Returns its final snapshot, or
    /// `None` if it was unknown.
    pub async fn close(&mut self, id: ConnectionId) -> ActorResult<Option<ConnectionSnapshot>> {
        self.sequence.check();
        let mut record = match self.table.remove(id) {
            Some(record) => record,
            None => return Produces::ok(None),
        };
        record.stop_heartbeat();
        record.connection.close();
        if record.state != ReadyState::Failed {
            record.state = ReadyState::Closed;
        }

        if let Some(attempt) = self.pending.take(id) {
            attempt.resolve(OpenStatus::Failed(ConnectError::AlreadyClosedDuringSetup));
        }

        info!("{} to {} closed", id, record.endpoint);
        self.logger.record_event(id, EventKind::Closed, &record.endpoint.to_string());
        Produces::ok(Some(record.snapshot()))
    }

    pub async fn get(&mut self, id: ConnectionId) -> ActorResult<Option<ConnectionSnapshot>> {
        self.sequence.check();
        Produces::ok(self.table.get(id).map(ConnectionRecord::snapshot))
    }

    pub async fn get_by_endpoint(&mut self, endpoint: Endpoint) -> ActorResult<Option<ConnectionSnapshot>> {
        self.sequence.check();
        Produces::ok(self.table.get_by_endpoint(&endpoint).map(ConnectionRecord::snapshot))
    }

    /// Queue `payload` on an open connection. Write failures reach the observers.
    pub async fn send_payload(
        &mut self,
        id: ConnectionId,
        payload: Vec<u8>,
    ) -> ActorResult<std::result::Result<(), RegistryError>> {
        self.sequence.check();
        let connection = match self.table.get(id) {
            None => return Produces::ok(Err(RegistryError::UnknownIdentifier(id))),
            Some(record) if record.state != ReadyState::Open => return Produces::ok(Err(RegistryError::NotOpen(id))),
            Some(record) => record.connection.clone(),
        };

        let registry = self.addr.clone();
        tokio::spawn(async move {
            if let Err(error) = connection.send(payload).await {
                let event = ConnectionEvent::Error(error);
                send!(registry.deliver_event(id, event));
            }
        });
        Produces::ok(Ok(()))
    }

    pub async fn add_observer(
        &mut self,
        name: String,
        observer: Box<dyn ConnectionObserver>,
    ) -> ActorResult<Option<Box<dyn ConnectionObserver>>> {
        self.sequence.check();
        debug!("adding observer {}", name);
        Produces::ok(self.observers.add(name, observer))
    }

    /// Remove observer `name` and detach it from every connection.
    pub async fn remove_observer(&mut self, name: String) -> ActorResult<Option<Box<dyn ConnectionObserver>>> {
        self.sequence.check();
        let detached = self.table.detach_observer(&name) + self.pending.detach_observer(&name);
        if detached > 0 {
            debug!("observer {} detached from {} connection(s)", name, detached);
        }
        Produces::ok(self.observers.remove(&name))
    }

    pub async fn deliver_event(&mut self, id: ConnectionId, event: ConnectionEvent) -> ActorResult<()> {
        self.sequence.check();
        let record = match self.table.get_mut(id) {
            Some(record) if record.state == ReadyState::Open => record,
            _ => {
                debug!("dropping event for inactive connection {}", id);
                return Produces::ok(());
            }
        };

        match event {
            ConnectionEvent::Message(payload) => {
                record.last_activity = Instant::now();
                let names = record.observers.clone();
                self.logger
                    .record_event(id, EventKind::MessageReceived, &format!("{} bytes", payload.len()));
                self.notify(id, &names, |observer| observer.on_message(id, &payload));
            }
            ConnectionEvent::Heartbeat => {
                record.last_activity = Instant::now();
            }
            ConnectionEvent::Error(error) => self.fail_connection(id, error),
        }
        Produces::ok(())
    }

    /// Heartbeat tick: declare the peer dead past its liveness deadline, ping it otherwise.
    pub async fn heartbeat(&mut self, id: ConnectionId) -> ActorResult<()> {
        self.sequence.check();
        let (liveness, idle, connection) = match self.table.get(id) {
            Some(record) if record.state == ReadyState::Open => (
                record.timeouts.liveness,
                record.last_activity.elapsed(),
                record.connection.clone(),
            ),
            _ => return Produces::ok(()),
        };

        if let Some(liveness) = liveness {
            if idle >= liveness {
                self.fail_connection(id, ChannelError::LivenessTimeout);
                return Produces::ok(());
            }
        }

        let registry = self.addr.clone();
        tokio::spawn(async move {
            if let Err(error) = connection.ping().await {
                let event = ConnectionEvent::Error(error);
                send!(registry.deliver_event(id, event));
            }
        });
        self.logger.record_event(id, EventKind::HeartbeatSent, "");
        Produces::ok(())
    }

    /// Resolve every outstanding callback with `ShuttingDown`, then close
    /// every connection.
    pub async fn shutdown(&mut self) -> ActorResult<()> {
        self.sequence.check();
        self.teardown();
        Produces::ok(())
    }

    fn teardown(&mut self) {
        let attempts = self.pending.drain();
        let records = self.table.drain();
        if attempts.is_empty() && records.is_empty() {
            return;
        }

        info!(
            "shutting down connection registry ({} pending, {} connections)",
            attempts.len(),
            records.len()
        );
        for attempt in attempts {
            attempt.resolve(OpenStatus::Failed(ConnectError::ShuttingDown));
        }
        for mut record in records {
            record.stop_heartbeat();
            record.connection.close();
            self.logger.record_event(record.id, EventKind::ShutDown, &record.endpoint.to_string());
        }
    }

    fn fail_connection(&mut self, id: ConnectionId, error: ChannelError) {
        let names = match self.table.get_mut(id) {
            Some(record) if record.state == ReadyState::Open => {
                record.stop_heartbeat();
                record.connection.close();
                record.observers.clone()
            }
            _ => return,
        };
        if let Err(e) = self.table.transition(id, ReadyState::Failed) {
            warn!("cannot fail {}: {}", id, e);
        }

        warn!("{} failed: {}", id, error);
        self.logger.record_event(id, EventKind::Failed, &error.to_string());
        self.notify(id, &names, |observer| observer.on_error(id, error.clone()));
    }

    /// Run `f` on each named observer still registered.
    fn notify<F>(&mut self, id: ConnectionId, names: &[String], mut f: F)
    where
        F: FnMut(&mut (dyn ConnectionObserver + 'static)),
    {
        for name in names {
            match self.observers.get_mut(name) {
                Some(observer) => f(observer),
                None => self.logger.record_event(id, EventKind::MessageDropped, name),
            }
        }
    }

    fn event_sink(&self, id: ConnectionId) -> EventSink {
        let registry = self.addr.clone();
        EventSink::new(id, move |id, event| {
            send!(registry.deliver_event(id, event));
        })
    }

    fn spawn_heartbeat(registry: WeakAddr<Self>, id: ConnectionId, timeouts: OpenTimeouts) -> Option<JoinHandle<()>> {
        let period = timeouts.heartbeat_period()?;
        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                send!(registry.heartbeat(id));
            }
        }))
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
