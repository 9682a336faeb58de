//! End-to-end tests for the telemetry pipeline.
//!
//! Each test drives the full flow with in-memory backends:
//! MQTT publish → admission → work queue → processor → stores, counters,
//! and fan-out.

use abnormal_counters::{CounterScope, WindowKind, ALL_CUSTOMERS};
use integration_tests::{fixtures, setup::TestContext};
use sensor_core::{AlarmKind, AlarmLevel, SensorType};
use sensor_store::{AlarmStore, ObservationStore};

#[tokio::test]
async fn test_abnormal_tev_flows_through_whole_pipeline() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());
    ctx.fanout.subscribe("S123", "viewer-a");

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(2),
    )
    .await;
    assert_eq!(ctx.drain().await, 1);

    // Observation persisted as the latest revision with tenant linkage.
    let obs = ObservationStore::latest(ctx.store.as_ref(), SensorType::Tev, "S123")
        .await
        .unwrap()
        .expect("observation stored");
    assert!(obs.is_latest);
    assert!(obs.is_online);
    assert_eq!(obs.alarm_level, AlarmLevel::Alarm);
    assert_eq!(obs.meta.customer_id, "customer1");

    // Point alarm derived and back-referencing the observation.
    let alarm = AlarmStore::latest(ctx.store.as_ref(), "S123", AlarmKind::PointAlarm)
        .await
        .unwrap()
        .expect("alarm stored");
    assert_eq!(alarm.sensor_data_id, Some(obs.id));
    assert_eq!(alarm.alarm_describe, "arc discharge");
    assert!(!alarm.is_processed);

    // Every window bumped for customer, ALL, and site.
    for window in WindowKind::ALL {
        for (scope, id) in [
            (CounterScope::Customer, "customer1"),
            (CounterScope::Customer, ALL_CUSTOMERS),
            (CounterScope::Site, "site1"),
        ] {
            let counts = ctx.counters.counts(scope, id, window).await.unwrap();
            assert_eq!(counts.alarm_num, 1, "{:?} {} {:?}", scope, id, window);
        }
    }
    assert_eq!(ctx.counters.site_unprocessed("site1").await.unwrap(), 1);

    // Fan-out frame delivered to the subscribed group.
    let frames = ctx.transport.frames_for("viewer-a");
    assert_eq!(frames.len(), 1);
    let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(frame["message"]["sensor_type"], "TEV");
    assert_eq!(frame["message"]["amp"], 12.5);
    assert_eq!(frame["message"]["site_id"], "site1");
    // Housekeeping fields from params.status/params.wparam ride along.
    assert_eq!(frame["message"]["battery"], 87);
    assert_eq!(frame["message"]["interval"], 300);
}

#[tokio::test]
async fn test_normal_level_skips_counters_but_still_persists() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(0),
    )
    .await;
    ctx.drain().await;

    assert!(
        ObservationStore::latest(ctx.store.as_ref(), SensorType::Tev, "S123")
            .await
            .unwrap()
            .is_some()
    );
    // Alarm record still exists at Normal level.
    let alarm = AlarmStore::latest(ctx.store.as_ref(), "S123", AlarmKind::PointAlarm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alarm.alarm_level, AlarmLevel::Normal);

    let counts = ctx
        .counters
        .counts(CounterScope::Customer, "customer1", WindowKind::Day)
        .await
        .unwrap();
    assert_eq!(counts.alarm_num, 0);
    // The record still lands in the operator's unprocessed backlog.
    assert_eq!(ctx.counters.site_unprocessed("site1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_every_sensor_type_decodes_end_to_end() {
    let ctx = TestContext::new();
    let cases = [
        ("SAE", fixtures::ae_payload(), SensorType::Ae),
        ("STEV", fixtures::tev_payload(0), SensorType::Tev),
        ("SUHF", fixtures::uhf_payload(), SensorType::Uhf),
        ("STEMP", fixtures::temp_payload(41.5), SensorType::Temp),
        ("SMECH", fixtures::mech_payload(), SensorType::Mech),
    ];
    for (sensor_id, _, _) in &cases {
        ctx.provision("GW01", sensor_id, fixtures::meta());
    }

    for (sensor_id, payload, _) in &cases {
        ctx.publish(&fixtures::telemetry_topic("GW01", sensor_id), payload)
            .await;
    }
    assert_eq!(ctx.drain().await, 5);

    for (sensor_id, _, ty) in &cases {
        let obs = ObservationStore::latest(ctx.store.as_ref(), *ty, sensor_id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("missing observation for {sensor_id}"));
        assert_eq!(obs.sensor_type(), *ty);
    }
}

#[tokio::test]
async fn test_replayed_message_creates_two_revisions() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    for _ in 0..2 {
        ctx.publish(
            &fixtures::telemetry_topic("GW01", "S123"),
            &fixtures::tev_payload(0),
        )
        .await;
    }
    assert_eq!(ctx.drain().await, 2);

    let revisions = ctx.store.observations_for(SensorType::Tev, "S123");
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions.iter().filter(|o| o.is_latest).count(), 1);
}

#[tokio::test]
async fn test_offline_event_flips_state_everywhere() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(2),
    )
    .await;
    ctx.publish(
        &fixtures::event_topic("GW01", "S123"),
        &fixtures::offline_event(1),
    )
    .await;
    assert_eq!(ctx.drain().await, 2);

    let obs = ObservationStore::latest(ctx.store.as_ref(), SensorType::Tev, "S123")
        .await
        .unwrap()
        .unwrap();
    assert!(!obs.is_online);

    let point = AlarmStore::latest(ctx.store.as_ref(), "S123", AlarmKind::PointAlarm)
        .await
        .unwrap()
        .unwrap();
    assert!(!point.is_online);

    let device = AlarmStore::latest(ctx.store.as_ref(), "S123", AlarmKind::DeviceAlarm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device.alarm_kind, AlarmKind::DeviceAlarm);
    assert_eq!(device.alarm_level, AlarmLevel::Alarm);
    assert!(!device.is_online);
    assert_eq!(device.sensor_data_id, None);

    // Only the telemetry point alarm reaches the windowed counters; the
    // device alarm lands in the unprocessed backlog alone.
    let counts = ctx
        .counters
        .counts(CounterScope::Site, "site1", WindowKind::Day)
        .await
        .unwrap();
    assert_eq!(counts.alarm_num, 1);
    assert_eq!(ctx.counters.site_unprocessed("site1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_battery_event_records_device_alarm_without_offline_flip() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(0),
    )
    .await;
    ctx.publish(
        &fixtures::event_topic("GW01", "S123"),
        &fixtures::battery_event(1),
    )
    .await;
    ctx.drain().await;

    let obs = ObservationStore::latest(ctx.store.as_ref(), SensorType::Tev, "S123")
        .await
        .unwrap()
        .unwrap();
    assert!(obs.is_online);

    let device = AlarmStore::latest(ctx.store.as_ref(), "S123", AlarmKind::DeviceAlarm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device.alarm_describe, "battery low alarm");
    assert!(device.is_online);
}

#[tokio::test]
async fn test_unsubscribed_group_receives_nothing() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());
    ctx.fanout.subscribe("S123", "viewer-a");
    ctx.fanout.unsubscribe("S123", "viewer-a").await.unwrap();

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(0),
    )
    .await;
    ctx.drain().await;

    assert!(ctx.transport.frames_for("viewer-a").is_empty());
}
