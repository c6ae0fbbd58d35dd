// ── Synchronization engine ──
//
// One background task owns the bindings, the transmit queue and the
// rate-limit timer. Bus events, datapoint changes, store changes,
// commands and timer ticks are all handled in its single select loop,
// so none of that state needs a lock. Every bound datapoint feeds one
// shared channel, which keeps bus changes in transport delivery order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use knxlink_api::{
    AddressedChange, BusConnection, BusEvent, Datapoint, State, StateChange, StateRepository,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::coerce::{bus_to_store, store_to_bus};
use super::queue::{TxJob, TxQueue};
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::entry::is_entry_id;
use crate::model::{ENTRY_NAMESPACE, MappingRecord};
use crate::store::{MappingSnapshot, MappingStore};

/// Queue depth step at which a backlog warning is logged while offline.
const BACKLOG_WARN_STEP: usize = 100;

// ── ConnectionState ──────────────────────────────────────────────

/// Bus connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a store command turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dispatch {
    /// A write job was queued.
    Write,
    /// The record is not writable but readable: a read job was queued.
    Read,
    /// Neither flag is set; nothing was queued.
    Ignored,
}

enum EngineCommand {
    Read {
        id: String,
        reply: oneshot::Sender<Result<Dispatch, CoreError>>,
    },
    Write {
        id: String,
        value: Value,
        reply: oneshot::Sender<Result<Dispatch, CoreError>>,
    },
}

// ── SyncEngine ───────────────────────────────────────────────────

/// Bidirectional bus ↔ store synchronization.
///
/// Cheaply cloneable. [`start`](Self::start) spawns the engine task and
/// asks the transport to connect; [`shutdown`](Self::shutdown) releases
/// every binding and stops the timer before the transport is torn down.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    bus: Arc<dyn BusConnection>,
    repo: Arc<dyn StateRepository>,
    mappings: Arc<MappingStore>,
    connection_state: watch::Sender<ConnectionState>,
    queue_depth: AtomicUsize,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineCommand>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        bus: Arc<dyn BusConnection>,
        repo: Arc<dyn StateRepository>,
        mappings: Arc<MappingStore>,
    ) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(EngineInner {
                config,
                bus,
                repo,
                mappings,
                connection_state,
                queue_depth: AtomicUsize::new(0),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn mappings(&self) -> &Arc<MappingStore> {
        &self.inner.mappings
    }

    /// Watch the bus connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Jobs waiting in the transmit queue.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth.load(Ordering::Acquire)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the engine task and ask the transport to connect.
    ///
    /// A connect error is returned, but the engine keeps listening: the
    /// transport's own reconnection still reaches it.
    pub async fn start(&self) -> Result<(), CoreError> {
        let Some(commands) = self.inner.command_rx.lock().await.take() else {
            return Err(CoreError::Internal("sync engine already started".into()));
        };

        // Subscribe before connecting so the first Connected is not lost.
        let bus_events = self.inner.bus.events();
        let store_changes = self
            .inner
            .repo
            .subscribe_states(&format!("{ENTRY_NAMESPACE}."));
        let mapping_changes = self.inner.mappings.subscribe();

        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);

        let engine_loop = EngineLoop {
            inner: Arc::clone(&self.inner),
            state: ConnectionState::Connecting,
            bindings: HashMap::new(),
            by_address: HashMap::new(),
            changes: None,
            queue: TxQueue::new(),
            timer: None,
        };
        let handle = tokio::spawn(engine_loop.run(
            bus_events,
            store_changes,
            mapping_changes,
            commands,
        ));
        *self.inner.task.lock().await = Some(handle);

        info!(records = self.inner.mappings.len(), "sync engine started");
        self.inner.bus.connect().await?;
        Ok(())
    }

    /// Stop the engine: release bindings, stop the timer, then disconnect
    /// the transport. Queued jobs are dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }

        if let Err(e) = self.inner.bus.disconnect().await {
            warn!(error = %e, "bus disconnect failed (non-fatal)");
        }
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        info!("sync engine stopped");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a bus read for entry `id`.
    pub async fn request_read(&self, id: &str) -> Result<Dispatch, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Read {
            id: id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoreError::NotConnected)?
    }

    /// Queue `value` for entry `id`, following the same write/read-flag
    /// rules as a store command.
    pub async fn request_write(&self, id: &str, value: Value) -> Result<Dispatch, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Write {
            id: id.into(),
            value,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoreError::NotConnected)?
    }

    async fn send(&self, command: EngineCommand) -> Result<(), CoreError> {
        let not_started = self.inner.command_rx.lock().await.is_some();
        if not_started || self.inner.cancel.is_cancelled() {
            return Err(CoreError::NotConnected);
        }
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| CoreError::NotConnected)
    }
}

// ── Engine task ──────────────────────────────────────────────────

/// A record bound to a live datapoint.
struct Binding {
    record: Arc<MappingRecord>,
    datapoint: Arc<dyn Datapoint>,
}

/// Where a job sends its telegram.
enum Target {
    Bound(Arc<dyn Datapoint>),
    /// Queued while offline; resolved through the transport when it runs.
    Deferred {
        bus: Arc<dyn BusConnection>,
        record: Arc<MappingRecord>,
    },
}

impl Target {
    fn datapoint(&self) -> Result<Arc<dyn Datapoint>, CoreError> {
        match self {
            Self::Bound(datapoint) => Ok(Arc::clone(datapoint)),
            Self::Deferred { bus, record } => {
                let type_code = record.type_code.as_ref().map(|t| t.as_str());
                Ok(bus.datapoint(record.address.raw(), type_code)?)
            }
        }
    }
}

struct EngineLoop {
    inner: Arc<EngineInner>,
    state: ConnectionState,
    bindings: HashMap<String, Binding>,
    /// Bound entry ids per raw group address.
    by_address: HashMap<u16, Vec<String>>,
    /// Receiving end shared by every binding's subscription. Dropping it
    /// releases them all.
    changes: Option<mpsc::UnboundedReceiver<AddressedChange>>,
    queue: TxQueue,
    /// Started on the first Connected, kept across reconnects.
    timer: Option<Interval>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut bus_events: broadcast::Receiver<BusEvent>,
        mut store_changes: mpsc::UnboundedReceiver<StateChange>,
        mut mapping_changes: watch::Receiver<MappingSnapshot>,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    ) {
        let cancel = self.inner.cancel.clone();
        let mut bus_open = true;
        let mut mappings_open = true;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = bus_events.recv(), if bus_open => match event {
                    Ok(event) => self.on_bus_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "bus event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("bus event channel closed");
                        bus_open = false;
                        self.go_offline();
                    }
                },
                change = next_change(&mut self.changes) => match change {
                    Some(change) => self.on_bus_change(change).await,
                    None => self.changes = None,
                },
                change = store_changes.recv() => {
                    let Some(change) = change else {
                        warn!("store subscription closed");
                        break;
                    };
                    self.on_store_change(change).await;
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.on_command(command);
                }
                changed = mapping_changes.changed(), if mappings_open => {
                    if changed.is_err() {
                        mappings_open = false;
                    } else if self.state == ConnectionState::Connected {
                        info!("mapping store rebuilt, rebinding");
                        self.rebind();
                    }
                }
                () = next_tick(&mut self.timer) => {
                    if self.state == ConnectionState::Connected && self.queue.run_next().await {
                        self.publish_depth();
                    }
                }
            }
        }

        self.release_bindings();
        self.timer = None;
        if !self.queue.is_empty() {
            debug!(dropped = ?self.queue.descriptions(), "queued jobs dropped");
        }
        debug!("engine loop finished");
    }

    // ── Bus lifecycle ────────────────────────────────────────────

    fn on_bus_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::Connected => {
                info!("bus connected");
                self.set_state(ConnectionState::Connected);
                self.rebind();
                self.start_timer();
                if self.inner.config.read_on_connect {
                    self.queue_initial_reads();
                }
            }
            BusEvent::Disconnected => {
                info!(queued = self.queue.len(), "bus disconnected");
                self.go_offline();
            }
            BusEvent::Error(message) => {
                warn!(error = %message, "bus transport error");
                self.go_offline();
            }
        }
    }

    fn go_offline(&mut self) {
        self.release_bindings();
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        let _ = self.inner.connection_state.send(state);
    }

    fn start_timer(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let period = self.inner.config.tick_period();
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        debug!(period = ?period, "rate limiter started");
    }

    // ── Bindings ─────────────────────────────────────────────────

    /// Drop every binding and its change subscription.
    fn release_bindings(&mut self) {
        if !self.bindings.is_empty() {
            debug!(count = self.bindings.len(), "releasing datapoint bindings");
        }
        self.changes = None;
        self.by_address.clear();
        self.bindings.clear();
    }

    /// Release all bindings, then bind every mapping record afresh.
    fn rebind(&mut self) {
        self.release_bindings();

        let (sink, changes) = mpsc::unbounded_channel();
        let records = self.inner.mappings.records();
        for record in records {
            let address = record.address;
            let type_code = record.type_code.as_ref().map(|t| t.as_str());
            match self.inner.bus.datapoint(address.raw(), type_code) {
                Ok(datapoint) => {
                    datapoint.subscribe(sink.clone());
                    self.by_address
                        .entry(address.raw())
                        .or_default()
                        .push(record.id.clone());
                    self.bindings
                        .insert(record.id.clone(), Binding { record, datapoint });
                }
                Err(e) => {
                    let err = CoreError::BindingFailure {
                        id: record.id.clone(),
                        address: address.raw().to_string(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "datapoint not bound");
                }
            }
        }
        self.changes = Some(changes);
        debug!(bound = self.bindings.len(), "datapoints bound");
    }

    fn queue_initial_reads(&mut self) {
        let mut readable: Vec<&Binding> = self
            .bindings
            .values()
            .filter(|b| b.record.flags.read)
            .collect();
        readable.sort_by(|a, b| a.record.id.cmp(&b.record.id));

        let jobs: Vec<TxJob> = readable
            .into_iter()
            .map(|b| read_job(&b.record, Target::Bound(Arc::clone(&b.datapoint))))
            .collect();
        debug!(count = jobs.len(), "queueing initial reads");
        for job in jobs {
            self.enqueue(job);
        }
    }

    // ── Bus → store ──────────────────────────────────────────────

    async fn on_bus_change(&mut self, seen: AddressedChange) {
        let AddressedChange { address, change } = seen;
        trace!(address, old = ?change.old, new = %change.new, "datapoint changed");
        let Some(ids) = self.by_address.get(&address).cloned() else {
            trace!(address, "change on an unbound address ignored");
            return;
        };

        let value = bus_to_store(&change.new);
        for id in ids {
            let state = State::acknowledged(value.clone());
            if let Err(e) = self.inner.repo.set_state(&id, state).await {
                let err = CoreError::StoreWriteFailure {
                    id,
                    reason: e.to_string(),
                };
                warn!(error = %err, "bus value dropped");
            }
        }
    }

    // ── Store → bus ──────────────────────────────────────────────

    async fn on_store_change(&mut self, change: StateChange) {
        if change.state.ack || !is_entry_id(&change.id) {
            return;
        }
        match self.dispatch(&change.id, &change.state.val) {
            Ok(_) if self.inner.config.ack_on_write => {
                let ack = State::acknowledged(change.state.val);
                if let Err(e) = self.inner.repo.set_state(&change.id, ack).await {
                    warn!(id = %change.id, error = %e, "re-acknowledge failed");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(id = %change.id, error = %e, "store command dropped"),
        }
    }

    fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Read { id, reply } => {
                let _ = reply.send(self.dispatch_read(&id));
            }
            EngineCommand::Write { id, value, reply } => {
                let _ = reply.send(self.dispatch(&id, &value));
            }
        }
    }

    /// Turn a command value into a queued job.
    fn dispatch(&mut self, id: &str, value: &Value) -> Result<Dispatch, CoreError> {
        let (record, target) = self.target(id)?;
        let flags = record.flags;

        let (job, dispatch) = if flags.write {
            (Some(write_job(&record, target, value)), Dispatch::Write)
        } else if flags.read {
            (Some(read_job(&record, target)), Dispatch::Read)
        } else {
            debug!(id, "entry is neither writable nor readable, command ignored");
            (None, Dispatch::Ignored)
        };

        if let Some(job) = job {
            self.enqueue(job);
        }
        Ok(dispatch)
    }

    /// Explicit read request; entries without the read flag are ignored.
    fn dispatch_read(&mut self, id: &str) -> Result<Dispatch, CoreError> {
        let (record, target) = self.target(id)?;
        if !record.flags.read {
            debug!(id, "entry is not readable, read ignored");
            return Ok(Dispatch::Ignored);
        }
        let job = read_job(&record, target);
        self.enqueue(job);
        Ok(Dispatch::Read)
    }

    /// The record for `id` and where its telegrams go.
    ///
    /// While connected a missing binding means binding failed. While
    /// offline there are no bindings at all, so the job is deferred.
    fn target(&self, id: &str) -> Result<(Arc<MappingRecord>, Target), CoreError> {
        let Some(record) = self.inner.mappings.get(id) else {
            return Err(CoreError::UnknownEntry { id: id.into() });
        };
        if let Some(binding) = self.bindings.get(id) {
            let target = Target::Bound(Arc::clone(&binding.datapoint));
            return Ok((Arc::clone(&binding.record), target));
        }
        if self.state == ConnectionState::Connected {
            return Err(CoreError::Bus {
                message: format!("no datapoint bound for {id}"),
            });
        }
        let target = Target::Deferred {
            bus: Arc::clone(&self.inner.bus),
            record: Arc::clone(&record),
        };
        Ok((record, target))
    }

    fn enqueue(&mut self, job: TxJob) {
        let depth = self.queue.push(job);
        self.publish_depth();
        if self.state != ConnectionState::Connected && depth % BACKLOG_WARN_STEP == 0 {
            warn!(depth, "transmit queue is growing while the bus is offline");
        }
    }

    fn publish_depth(&self) {
        self.inner
            .queue_depth
            .store(self.queue.len(), Ordering::Release);
    }
}

fn write_job(record: &MappingRecord, target: Target, value: &Value) -> TxJob {
    let bus_value = store_to_bus(value, record.type_code.as_ref());
    let description = format!("write {bus_value} to {} ({})", record.address.raw(), record.id);
    TxJob::new(description, move || async move {
        target.datapoint()?.write(bus_value).await.map_err(CoreError::from)
    })
}

fn read_job(record: &MappingRecord, target: Target) -> TxJob {
    let description = format!("read {} ({})", record.address.raw(), record.id);
    TxJob::new(description, move || async move {
        target.datapoint()?.read().await.map_err(CoreError::from)
    })
}

/// Next change from the bound datapoints, or never while unbound.
async fn next_change(
    changes: &mut Option<mpsc::UnboundedReceiver<AddressedChange>>,
) -> Option<AddressedChange> {
    match changes {
        Some(changes) => changes.recv().await,
        None => std::future::pending().await,
    }
}

/// Next timer tick, or never while the timer is not running.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
