// ── KNX bus transport contract ──
//
// The transport owns frame encoding, tunnelling handshake and
// keep-alive. The bridge only sees lifecycle events and per-address
// datapoints with read/write/subscribe.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::error::Error;

/// A decoded datapoint value as the transport hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl fmt::Display for BusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

/// A value change observed on a group address.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// Previous value, `None` on the first telegram seen.
    pub old: Option<BusValue>,
    pub new: BusValue,
}

/// A value change tagged with the group address it was seen on.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedChange {
    pub address: u16,
    pub change: ValueChange,
}

/// Receiving end of a change subscription.
///
/// Every datapoint subscribed with clones of one sink feeds the same
/// channel, so changes arrive in the order the transport delivered them.
/// Dropping the receiver releases all of those subscriptions; transports
/// prune a sink once a send on it fails.
pub type ChangeSink = mpsc::UnboundedSender<AddressedChange>;

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Connected,
    Disconnected,
    Error(String),
}

/// A live, bus-side object for one group address.
#[async_trait]
pub trait Datapoint: Send + Sync {
    /// Raw 16-bit group address.
    fn address(&self) -> u16;

    /// Send a GroupValue_Read telegram.
    async fn read(&self) -> Result<(), Error>;

    /// Send a GroupValue_Write telegram.
    async fn write(&self, value: BusValue) -> Result<(), Error>;

    /// Deliver every later value change on this address into `sink`.
    fn subscribe(&self, sink: ChangeSink);
}

/// The bus connection, including its automatic reconnection.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Lifecycle events. Every call yields an independent receiver.
    fn events(&self) -> broadcast::Receiver<BusEvent>;

    /// Start connecting. Success is reported through [`BusEvent::Connected`].
    async fn connect(&self) -> Result<(), Error>;

    /// Tear the connection down and stop reconnecting.
    async fn disconnect(&self) -> Result<(), Error>;

    /// Build the datapoint object for `address`, using the dotted type
    /// code when known.
    fn datapoint(&self, address: u16, type_code: Option<&str>) -> Result<Arc<dyn Datapoint>, Error>;
}
