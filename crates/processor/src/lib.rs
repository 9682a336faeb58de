//! Work queue processor.
//!
//! Pops raw messages off the work queue and drives the full pipeline for
//! each: decode, provisioning attribution, versioned persistence, alarm
//! derivation, abnormal counting, and live fan-out. One message is processed
//! at a time per worker; writes for one sensor are serialized through a
//! sharded lock so the latest-row maintenance never races itself.

pub mod config;
pub mod locks;

pub use config::ProcessorConfig;
pub use locks::KeyLocks;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use abnormal_counters::AbnormalCounters;
use live_fanout::LiveFanout;
use provisioning::Provisioning;
use sensor_core::{
    decode_device_event, AlarmKind, AlarmRecord, CodecRegistry, Error, MsgKind,
    RawTelemetryMessage, Result, SensorMeta, SensorObservation,
};
use sensor_store::{record_alarm, record_observation, AlarmStore, ObservationStore};
use telemetry::metrics;
use work_queue::WorkQueue;

/// Everything the processor needs, injected by the composition root.
pub struct Processor {
    config: ProcessorConfig,
    queue: Arc<dyn WorkQueue>,
    provisioning: Arc<Provisioning>,
    observations: Arc<dyn ObservationStore>,
    alarms: Arc<dyn AlarmStore>,
    counters: Arc<AbnormalCounters>,
    fanout: Arc<LiveFanout>,
    codecs: CodecRegistry,
    locks: KeyLocks,
}

impl Processor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ProcessorConfig,
        queue: Arc<dyn WorkQueue>,
        provisioning: Arc<Provisioning>,
        observations: Arc<dyn ObservationStore>,
        alarms: Arc<dyn AlarmStore>,
        counters: Arc<AbnormalCounters>,
        fanout: Arc<LiveFanout>,
    ) -> Self {
        let locks = KeyLocks::new(config.lock_shards);
        Self {
            config,
            queue,
            provisioning,
            observations,
            alarms,
            counters,
            fanout,
            codecs: CodecRegistry::new(),
            locks,
        }
    }

    /// Runs the pop-process loop until shutdown. Cancellation is checked at
    /// the pop boundary, so an in-flight message always finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Processor started");
        loop {
            if *shutdown.borrow() {
                info!("Processor shutting down");
                return Ok(());
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender means no further signal can arrive.
                    if changed.is_err() {
                        info!("Shutdown channel closed, processor stopping");
                        return Ok(());
                    }
                }
                popped = self.queue.pop() => match popped {
                    Ok(Some(msg)) => self.process_message(&msg).await,
                    Ok(None) => {
                        tokio::time::sleep(Duration::from_millis(self.config.idle_backoff_ms))
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Work queue pop failed, backing off");
                        tokio::time::sleep(Duration::from_millis(self.config.error_backoff_ms))
                            .await;
                    }
                }
            }
        }
    }

    /// Processes one message. Failures are terminal for the message: it is
    /// logged (unless silent) and dropped, never retried.
    pub async fn process_message(&self, msg: &RawTelemetryMessage) {
        let start = Instant::now();
        let result = match msg.msg_kind {
            MsgKind::Telemetry => self.handle_telemetry(msg).await,
            MsgKind::DeviceEvent => self.handle_device_event(msg).await,
        };

        match result {
            Ok(()) => {
                metrics().messages_processed.inc();
                metrics()
                    .process_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
            }
            Err(e) => {
                match &e {
                    Error::Decode(_) | Error::Serialization(_) => {
                        metrics().decode_errors.inc()
                    }
                    Error::UnsupportedSensorType(_) => {
                        metrics().unsupported_sensor_types.inc()
                    }
                    Error::MissingProvisioning(_) => {
                        metrics().missing_provisioning.inc()
                    }
                    _ => {}
                }
                if e.is_silent() {
                    debug!(sensor_id = %msg.sensor_id, error = %e, "Message dropped");
                } else {
                    warn!(
                        sensor_id = %msg.sensor_id,
                        gateway_id = %msg.gateway_id,
                        error = %e,
                        "Message processing failed, dropping"
                    );
                }
            }
        }
    }

    fn parse_payload(raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|e| Error::decode(format!("payload is not JSON: {e}")))
    }

    async fn resolve_meta(&self, sensor_id: &str) -> Result<SensorMeta> {
        self.provisioning
            .resolve(sensor_id)
            .await?
            .ok_or_else(|| Error::missing_provisioning(sensor_id))
    }

    async fn handle_telemetry(&self, msg: &RawTelemetryMessage) -> Result<()> {
        let raw = Self::parse_payload(&msg.raw_payload)?;
        // Reject unknown sensor types before touching provisioning.
        sensor_core::payload_sensor_type(&raw)?;
        let meta = self.resolve_meta(&msg.sensor_id).await?;
        let canonical = self.codecs.decode(&raw)?;

        let observation = SensorObservation::from_canonical(
            canonical,
            msg.gateway_id.clone(),
            msg.sensor_id.clone(),
            meta.clone(),
        );
        let alarm = AlarmRecord::from_observation(&observation);

        {
            let _guard = self.locks.lock(&msg.sensor_id).await;
            record_observation(self.observations.as_ref(), &observation).await?;
            record_alarm(self.alarms.as_ref(), &alarm).await?;
        }

        if let Err(e) = self.counters.note_alarm_recorded(&meta.site_id).await {
            warn!(sensor_id = %msg.sensor_id, error = %e, "Unprocessed tally bump failed");
        }
        if observation.alarm_level.is_abnormal() {
            if let Err(e) = self.counters.record_abnormal(&meta, &Local::now()).await {
                warn!(sensor_id = %msg.sensor_id, error = %e, "Abnormal counter bump failed");
            }
        }

        self.fanout.publish(&observation).await?;
        Ok(())
    }

    async fn handle_device_event(&self, msg: &RawTelemetryMessage) -> Result<()> {
        let raw = Self::parse_payload(&msg.raw_payload)?;
        let sensor_type = sensor_core::payload_sensor_type(&raw)?;
        let alert = decode_device_event(&raw)?;
        let meta = self.resolve_meta(&msg.sensor_id).await?;

        let alarm = AlarmRecord {
            id: uuid::Uuid::new_v4(),
            sensor_id: msg.sensor_id.clone(),
            sensor_type,
            gateway_id: msg.gateway_id.clone(),
            alarm_kind: AlarmKind::DeviceAlarm,
            alarm_level: alert.alarm_level,
            alarm_describe: alert.alarm_describe.clone(),
            is_processed: false,
            is_online: alert.is_online,
            is_latest: true,
            meta: meta.clone(),
            sensor_data_id: None,
            create_time: alert.create_time,
        };

        {
            let _guard = self.locks.lock(&msg.sensor_id).await;
            if !alert.is_online {
                // Offline: the sensor's current state flips everywhere it is
                // surfaced, not just on the new device alarm.
                self.observations
                    .mark_offline(sensor_type, &msg.sensor_id)
                    .await?;
                self.alarms
                    .mark_offline(&msg.sensor_id, AlarmKind::PointAlarm)
                    .await?;
            }
            record_alarm(self.alarms.as_ref(), &alarm).await?;
        }

        // Device alarms feed the operator backlog only; the windowed
        // abnormal counters track telemetry-derived point alarms.
        if let Err(e) = self.counters.note_alarm_recorded(&meta.site_id).await {
            warn!(sensor_id = %msg.sensor_id, error = %e, "Unprocessed tally bump failed");
        }
        Ok(())
    }
}
