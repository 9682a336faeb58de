//! Counter semantics across tenants, windows, and the processed flow.

use abnormal_counters::{CounterScope, WindowKind, ALL_CUSTOMERS};
use chrono::Utc;
use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn test_customers_isolated_but_all_aggregates() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "SA", fixtures::meta_for("customer1", "site1"));
    ctx.provision("GW01", "SB", fixtures::meta_for("customer2", "site2"));

    ctx.publish(&fixtures::telemetry_topic("GW01", "SA"), &fixtures::tev_payload(2))
        .await;
    ctx.publish(&fixtures::telemetry_topic("GW01", "SB"), &fixtures::tev_payload(1))
        .await;
    ctx.publish(&fixtures::telemetry_topic("GW01", "SB"), &fixtures::tev_payload(2))
        .await;
    ctx.drain().await;

    let c1 = ctx
        .counters
        .counts(CounterScope::Customer, "customer1", WindowKind::Day)
        .await
        .unwrap();
    let c2 = ctx
        .counters
        .counts(CounterScope::Customer, "customer2", WindowKind::Day)
        .await
        .unwrap();
    let all = ctx
        .counters
        .counts(CounterScope::Customer, ALL_CUSTOMERS, WindowKind::Day)
        .await
        .unwrap();
    assert_eq!(c1.alarm_num, 1);
    assert_eq!(c2.alarm_num, 2);
    assert_eq!(all.alarm_num, 3);

    assert_eq!(ctx.counters.site_unprocessed("site1").await.unwrap(), 1);
    assert_eq!(ctx.counters.site_unprocessed("site2").await.unwrap(), 2);
}

#[tokio::test]
async fn test_processed_flow_offsets_every_window() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    for _ in 0..4 {
        ctx.publish(
            &fixtures::telemetry_topic("GW01", "S123"),
            &fixtures::tev_payload(2),
        )
        .await;
    }
    ctx.drain().await;

    // Operator marks three of the alarms processed.
    ctx.counters
        .record_processed("customer1", "site1", 3, &Utc::now())
        .await
        .unwrap();

    for window in WindowKind::ALL {
        for (scope, id) in [
            (CounterScope::Customer, "customer1"),
            (CounterScope::Customer, ALL_CUSTOMERS),
            (CounterScope::Site, "site1"),
        ] {
            let counts = ctx.counters.counts(scope, id, window).await.unwrap();
            assert_eq!(counts.alarm_num, 4);
            assert_eq!(counts.processed_num, 3);
        }
    }
    assert_eq!(ctx.counters.site_unprocessed("site1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_windows_count_independently() {
    let ctx = TestContext::new();
    ctx.provision("GW01", "S123", fixtures::meta());

    ctx.publish(
        &fixtures::telemetry_topic("GW01", "S123"),
        &fixtures::tev_payload(2),
    )
    .await;
    ctx.drain().await;

    // One bump is visible in all three windows; the hashes are distinct
    // keys, so touching one never touches the others.
    for window in WindowKind::ALL {
        let counts = ctx
            .counters
            .counts(CounterScope::Site, "site1", window)
            .await
            .unwrap();
        assert_eq!(counts.alarm_num, 1);
    }

    ctx.counters
        .record_processed("customer1", "site1", 1, &Utc::now())
        .await
        .unwrap();
    let day = ctx
        .counters
        .counts(CounterScope::Site, "site1", WindowKind::Day)
        .await
        .unwrap();
    assert_eq!(day.alarm_num, 1);
    assert_eq!(day.processed_num, 1);
}
