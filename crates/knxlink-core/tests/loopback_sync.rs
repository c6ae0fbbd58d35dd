//! Sync engine against the loopback transport and in-memory store.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use knxlink_api::{BusValue, LoopbackBus, MemoryRepository, State, StateRepository, Telegram};
use knxlink_core::{
    AccessFlags, ConnectionState, Dispatch, GroupAddress, MappingRecord, MappingStore, SyncConfig,
    SyncEngine, TypeCode,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const LIGHT: &str = "ga.Living_Room.1_1_1";
const BRIGHTNESS: &str = "ga.Living_Room.1_1_2";

fn records() -> Vec<MappingRecord> {
    vec![
        MappingRecord {
            id: LIGHT.into(),
            address: GroupAddress::new(2305),
            type_code: TypeCode::normalize("1.001"),
            flags: AccessFlags::new(false, true, false, false),
        },
        MappingRecord {
            id: BRIGHTNESS.into(),
            address: GroupAddress::new(2306),
            type_code: TypeCode::normalize("5.001"),
            flags: AccessFlags::new(true, false, true, false),
        },
    ]
}

async fn running(config: SyncConfig) -> (Arc<LoopbackBus>, Arc<MemoryRepository>, SyncEngine) {
    let bus = Arc::new(LoopbackBus::new());
    let repo = Arc::new(MemoryRepository::new());
    let mappings = Arc::new(MappingStore::new());
    mappings.replace(records());

    let engine = SyncEngine::new(config, bus.clone(), repo.clone(), mappings);
    engine.start().await.unwrap();

    let mut state = engine.connection_state();
    tokio::time::timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    (bus, repo, engine)
}

fn quiet() -> SyncConfig {
    SyncConfig {
        min_send_delay: Duration::from_millis(20),
        read_on_connect: false,
        ack_on_write: false,
    }
}

#[tokio::test(start_paused = true)]
async fn store_command_round_trips_through_the_bus() {
    let (bus, repo, engine) = running(quiet()).await;

    repo.set_state(LIGHT, State::command(json!("on"))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(bus.telegrams().await, vec![Telegram::Write(2305, BusValue::Bool(true))]);
    let state = repo.get_state(LIGHT).await.unwrap().unwrap();
    assert!(state.ack, "loopback echo should acknowledge the command");
    assert_eq!(state.val, json!(true));

    engine.shutdown().await;
    assert!(!bus.is_connected());
}

#[tokio::test(start_paused = true)]
async fn device_values_reach_the_store() {
    let (bus, repo, engine) = running(quiet()).await;

    bus.emit(2306, BusValue::Number(42.0)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let state = repo.get_state(BRIGHTNESS).await.unwrap().unwrap();
    assert!(state.ack);
    assert_eq!(state.val, json!(42.0));
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn initial_reads_cover_readable_records() {
    let config = SyncConfig {
        read_on_connect: true,
        ..quiet()
    };
    let (bus, _repo, engine) = running(config).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bus.telegrams().await, vec![Telegram::Read(2306)]);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_requests_follow_flags() {
    let (bus, _repo, engine) = running(quiet()).await;

    assert_eq!(engine.request_write(BRIGHTNESS, json!(10)).await.unwrap(), Dispatch::Read);
    assert_eq!(engine.request_read(LIGHT).await.unwrap(), Dispatch::Ignored);
    assert_eq!(engine.request_write(LIGHT, json!(0)).await.unwrap(), Dispatch::Write);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        bus.telegrams().await,
        vec![Telegram::Read(2306), Telegram::Write(2305, BusValue::Bool(false))]
    );
    assert_eq!(engine.queue_depth(), 0);
    engine.shutdown().await;
}
