// ── Loopback bus transport ──
//
// Reference `BusConnection` without a wire: every write is reflected as a
// value change on the same group address, reads replay the last value.
// Used by the CLI for offline runs and by integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use crate::bus::{
    AddressedChange, BusConnection, BusEvent, BusValue, ChangeSink, Datapoint, ValueChange,
};
use crate::error::Error;

const EVENT_CHANNEL_SIZE: usize = 64;

/// One telegram sent through the loopback.
#[derive(Debug, Clone, PartialEq)]
pub enum Telegram {
    Read(u16),
    Write(u16, BusValue),
}

#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    telegrams: Mutex<Vec<Telegram>>,
}

pub struct LoopbackBus {
    events: broadcast::Sender<BusEvent>,
    datapoints: DashMap<u16, Arc<LoopbackDatapoint>>,
    shared: Arc<Shared>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            events,
            datapoints: DashMap::new(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Inject a value as if a device had sent it.
    pub async fn emit(&self, address: u16, value: BusValue) {
        self.entry(address).set(value).await;
    }

    /// Last value seen on `address`.
    pub async fn value(&self, address: u16) -> Option<BusValue> {
        let dp = self.datapoints.get(&address).map(|r| Arc::clone(r.value()))?;
        dp.value.lock().await.clone()
    }

    /// Every telegram sent so far, in order.
    pub async fn telegrams(&self) -> Vec<Telegram> {
        self.shared.telegrams.lock().await.clone()
    }

    fn entry(&self, address: u16) -> Arc<LoopbackDatapoint> {
        let entry = self.datapoints.entry(address).or_insert_with(|| {
            Arc::new(LoopbackDatapoint {
                address,
                value: Mutex::new(None),
                sinks: StdMutex::new(Vec::new()),
                shared: Arc::clone(&self.shared),
            })
        });
        Arc::clone(entry.value())
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusConnection for LoopbackBus {
    fn events(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    async fn connect(&self) -> Result<(), Error> {
        self.shared.connected.store(true, Ordering::Release);
        let _ = self.events.send(BusEvent::Connected);
        debug!("loopback bus connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.shared.connected.store(false, Ordering::Release);
        let _ = self.events.send(BusEvent::Disconnected);
        debug!("loopback bus disconnected");
        Ok(())
    }

    fn datapoint(&self, address: u16, _type_code: Option<&str>) -> Result<Arc<dyn Datapoint>, Error> {
        Ok(self.entry(address))
    }
}

pub struct LoopbackDatapoint {
    address: u16,
    value: Mutex<Option<BusValue>>,
    sinks: StdMutex<Vec<ChangeSink>>,
    shared: Arc<Shared>,
}

impl LoopbackDatapoint {
    async fn set(&self, new: BusValue) {
        let old = self.value.lock().await.replace(new.clone());
        self.publish(ValueChange { old, new });
    }

    /// Hand `change` to every live sink, dropping released ones.
    fn publish(&self, change: ValueChange) {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        sinks.retain(|sink| {
            sink.send(AddressedChange {
                address: self.address,
                change: change.clone(),
            })
            .is_ok()
        });
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.shared.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait]
impl Datapoint for LoopbackDatapoint {
    fn address(&self) -> u16 {
        self.address
    }

    async fn read(&self) -> Result<(), Error> {
        self.ensure_connected()?;
        self.shared.telegrams.lock().await.push(Telegram::Read(self.address));
        let current = self.value.lock().await.clone();
        if let Some(value) = current {
            self.publish(ValueChange {
                old: Some(value.clone()),
                new: value,
            });
        }
        Ok(())
    }

    async fn write(&self, value: BusValue) -> Result<(), Error> {
        self.ensure_connected()?;
        self.shared
            .telegrams
            .lock()
            .await
            .push(Telegram::Write(self.address, value.clone()));
        self.set(value).await;
        Ok(())
    }

    fn subscribe(&self, sink: ChangeSink) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn write_is_reflected_as_change() {
        let bus = LoopbackBus::new();
        bus.connect().await.unwrap();

        let dp = bus.datapoint(0x0801, Some("1.001")).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dp.subscribe(tx);
        dp.write(BusValue::Bool(true)).await.unwrap();

        let seen = rx.recv().await.unwrap();
        assert_eq!(seen.address, 0x0801);
        assert_eq!(seen.change.old, None);
        assert_eq!(seen.change.new, BusValue::Bool(true));
        assert_eq!(bus.value(0x0801).await, Some(BusValue::Bool(true)));
        assert_eq!(
            bus.telegrams().await,
            vec![Telegram::Write(0x0801, BusValue::Bool(true))]
        );
    }

    #[tokio::test]
    async fn read_replays_last_value() {
        let bus = LoopbackBus::new();
        bus.connect().await.unwrap();
        bus.emit(5, BusValue::Number(21.5)).await;

        let dp = bus.datapoint(5, None).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dp.subscribe(tx);
        dp.read().await.unwrap();

        let seen = rx.recv().await.unwrap();
        assert_eq!(seen.change.new, BusValue::Number(21.5));
    }

    #[tokio::test]
    async fn changes_share_one_ordered_sink() {
        let bus = LoopbackBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        for address in 1..=8 {
            bus.datapoint(address, None).unwrap().subscribe(tx.clone());
        }
        drop(tx);

        for address in 1..=8_u16 {
            bus.emit(address, BusValue::Number(f64::from(address))).await;
        }
        let mut order = Vec::new();
        while let Ok(seen) = rx.try_recv() {
            order.push(seen.address);
        }
        assert_eq!(order, (1..=8).collect::<Vec<u16>>());
    }

    #[tokio::test]
    async fn dropped_receiver_releases_the_subscription() {
        let bus = LoopbackBus::new();
        let dp = bus.datapoint(3, None).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        dp.subscribe(tx);
        drop(rx);

        bus.emit(3, BusValue::Bool(true)).await;
        let point = bus.entry(3);
        assert!(point.sinks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn telegrams_need_a_connection() {
        let bus = LoopbackBus::new();
        let dp = bus.datapoint(1, None).unwrap();
        assert!(matches!(dp.read().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn lifecycle_events_are_broadcast() {
        let bus = LoopbackBus::new();
        let mut events = bus.events();
        bus.connect().await.unwrap();
        bus.disconnect().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), BusEvent::Connected);
        assert_eq!(events.recv().await.unwrap(), BusEvent::Disconnected);
        assert!(!bus.is_connected());
    }
}
