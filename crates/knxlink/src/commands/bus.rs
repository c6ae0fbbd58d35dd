//! One-shot bus reads and writes through the sync engine.
//!
//! The engine runs against the loopback transport: every write is echoed
//! back as a device value, so the store snapshot ends up acknowledged the
//! same way a live bus would leave it.

use std::sync::Arc;
use std::time::Duration;

use knxlink_api::{LoopbackBus, MemoryRepository, State, StateRepository, Telegram};
use knxlink_core::{
    AddressStyle, ConnectionState, CoreError, Dispatch, GroupAddress, MappingStore, SyncConfig,
    SyncEngine,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::Session;
use crate::error::CliError;
use crate::output;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

enum Request {
    Read,
    Write(Value),
}

#[derive(Debug, Serialize)]
struct BusOutcome {
    id: String,
    dispatch: Dispatch,
    telegrams: Vec<String>,
    state: Option<State>,
}

pub async fn read(id: &str, session: &Session) -> Result<(), CliError> {
    run(id, Request::Read, session).await
}

pub async fn write(id: &str, raw: &str, session: &Session) -> Result<(), CliError> {
    // Bare words are taken as strings so `write x on` works unquoted.
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    run(id, Request::Write(value), session).await
}

async fn run(id: &str, request: Request, session: &Session) -> Result<(), CliError> {
    let repo = Arc::new(session.load_repo()?);
    let mappings = Arc::new(MappingStore::new());
    mappings.rebuild(repo.as_ref()).await?;
    if mappings.get(id).is_none() {
        return Err(CoreError::UnknownEntry { id: id.into() }.into());
    }

    // One-shot run: only the requested telegram goes out.
    let sync = SyncConfig {
        read_on_connect: false,
        ..session.bridge.sync.clone()
    };
    let tick = sync.tick_period();
    let bus = Arc::new(LoopbackBus::new());
    let engine = SyncEngine::new(sync, bus.clone(), repo.clone(), mappings);

    let result = drive(&engine, id, request, tick).await;
    engine.shutdown().await;
    let dispatch = result?;

    let telegrams = bus.telegrams().await.iter().map(describe).collect();
    let outcome = BusOutcome {
        id: id.into(),
        dispatch,
        telegrams,
        state: repo.get_state(id).await?,
    };
    session.save_repo(&repo)?;

    let out = output::render_single(
        session.output,
        &outcome,
        |o| {
            output::detail_lines(&[
                ("id", o.id.clone()),
                ("dispatch", o.dispatch.to_string()),
                ("telegrams", o.telegrams.join(", ")),
                (
                    "state",
                    o.state.as_ref().map_or_else(
                        || "-".into(),
                        |s| format!("{} (ack={})", s.val, s.ack),
                    ),
                ),
            ])
        },
        |o| o.state.as_ref().map_or_else(String::new, |s| s.val.to_string()),
    );
    session.print(&out);
    Ok(())
}

/// Start the engine, queue the request and wait for the queue to drain.
async fn drive(
    engine: &SyncEngine,
    id: &str,
    request: Request,
    tick: Duration,
) -> Result<Dispatch, CliError> {
    engine.start().await?;

    let mut state = engine.connection_state();
    tokio::time::timeout(
        SETTLE_TIMEOUT,
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .map_err(|_| timeout_err())?
    .map_err(|_| CliError::NotConnected)?;

    let dispatch = match request {
        Request::Read => engine.request_read(id).await?,
        Request::Write(value) => engine.request_write(id, value).await?,
    };
    debug!(id, %dispatch, "request queued");

    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while engine.queue_depth() > 0 {
            tokio::time::sleep(tick).await;
        }
        // One more tick for the echo to reach the store.
        tokio::time::sleep(tick).await;
    })
    .await
    .map_err(|_| timeout_err())?;

    Ok(dispatch)
}

fn timeout_err() -> CliError {
    CliError::Timeout {
        seconds: SETTLE_TIMEOUT.as_secs(),
    }
}

fn describe(telegram: &Telegram) -> String {
    let render = |raw: u16| GroupAddress::new(raw).render(AddressStyle::ThreeLevel);
    match telegram {
        Telegram::Read(raw) => format!("read {}", render(*raw)),
        Telegram::Write(raw, value) => format!("write {} = {value}", render(*raw)),
    }
}
