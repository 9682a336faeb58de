//! Failure-path tests: admission rejections, malformed payloads, and
//! messages that must be dropped without wedging the pipeline.

use integration_tests::{fixtures, setup::TestContext};
use sensor_core::SensorType;
use sensor_store::ObservationStore;
use work_queue::WorkQueue;

#[tokio::test]
async fn test_unprovisioned_sensor_rejected_at_admission() {
    let ctx = TestContext::new();
    ctx.source.enable_gateway("GW01");
    // S123 is never provisioned.

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(2),
    )
    .await;

    assert_eq!(ctx.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_disabled_gateway_rejected_at_admission() {
    let ctx = TestContext::new();
    ctx.source.provision_sensor("S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(2),
    )
    .await;

    assert_eq!(ctx.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_topics_never_enqueue() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    for topic in [
        "/GW01/S123/data_ctrl/property",
        "/GW-01/subnode/S123/data_ctrl/property",
        "/GW01/subnode/S123/data_ctrl/property/extra",
        "random",
    ] {
        ctx.publish(topic, &fixtures::tev_payload(0)).await;
    }

    assert_eq!(ctx.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_garbage_payload_dropped_but_later_messages_survive() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    let topic = fixtures::telemetry_topic("GW01", "S123");
    ctx.publish(&topic, "this is not json").await;
    ctx.publish(&topic, &fixtures::tev_payload(0)).await;

    // Both were admitted; the bad one drops at decode, the good one lands.
    assert_eq!(ctx.drain().await, 2);
    let revisions = ctx.store.observations_for(SensorType::Tev, "S123");
    assert_eq!(revisions.len(), 1);
}

#[tokio::test]
async fn test_unsupported_sensor_type_dropped_at_processor() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    let payload = serde_json::json!({
        "sensor_type": "Vibration",
        "params": {"data": {"acqtime": "2024-01-01 10:00:00"}}
    })
    .to_string();
    ctx.publish(&fixtures::telemetry_topic("GW01", "S123"), &payload)
        .await;
    ctx.drain().await;

    for ty in SensorType::ALL {
        assert!(ctx.store.observations_for(ty, "S123").is_empty());
    }
}

#[tokio::test]
async fn test_missing_required_reading_persists_nothing() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    // TEV without its amp reading.
    let payload = serde_json::json!({
        "sensor_type": "TEV",
        "params": {"data": {"acqtime": "2024-01-01 10:00:00"}}
    })
    .to_string();
    ctx.publish(&fixtures::telemetry_topic("GW01", "S123"), &payload)
        .await;
    ctx.drain().await;

    assert!(ctx.store.observations_for(SensorType::Tev, "S123").is_empty());
    assert!(ctx.store.alarms_for("S123").is_empty());
}

#[tokio::test]
async fn test_provisioning_removed_between_admission_and_processing() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(0),
    )
    .await;
    assert_eq!(ctx.queue.len().await.unwrap(), 1);

    // Deprovision before the processor gets to it, invalidating the cached
    // entry so the resolve goes back to the source and misses.
    ctx.source.remove_sensor("S123");
    ctx.provisioning.invalidate("S123").await;
    ctx.drain().await;

    assert!(ctx.store.observations_for(SensorType::Tev, "S123").is_empty());
}

#[tokio::test]
async fn test_device_event_without_alert_blocks_dropped() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    let payload =
        serde_json::json!({"sensor_type": "TEV", "params": {}}).to_string();
    ctx.publish(&fixtures::event_topic("GW01", "S123"), &payload).await;
    ctx.drain().await;

    assert!(ctx.store.alarms_for("S123").is_empty());
}
