//! MQTT ingress.
//!
//! Holds the broker session, parses gateway topics, applies the admission
//! predicate, and pushes admitted messages onto the work queue. Everything
//! here is deliberately thin: no payload inspection happens before the
//! processor pops the message.

pub mod config;
pub mod topic;

pub use config::MqttIngressConfig;
pub use topic::{parse_topic, ParsedTopic};

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use provisioning::Provisioning;
use sensor_core::{RawTelemetryMessage, Result};
use telemetry::{health, metrics};
use work_queue::WorkQueue;

// The whole topic space is subscribed; the topic patterns do the filtering.
// Gateways publish on a handful of other control topics we have no use for,
// and those fall out at parse time.
const SUBSCRIBE_FILTER: &str = "#";

/// Gateway-facing MQTT ingress.
pub struct MqttIngress {
    config: MqttIngressConfig,
    provisioning: Arc<Provisioning>,
    queue: Arc<dyn WorkQueue>,
}

impl MqttIngress {
    pub fn new(
        config: MqttIngressConfig,
        provisioning: Arc<Provisioning>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            config,
            provisioning,
            queue,
        }
    }

    fn session(&self) -> (AsyncClient, EventLoop) {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        if let (Some(username), Some(password)) =
            (&self.config.username, &self.config.password)
        {
            options.set_credentials(username, password);
        }
        AsyncClient::new(options, self.config.channel_capacity)
    }

    async fn subscribe(&self, client: &AsyncClient) {
        if let Err(e) = client.subscribe(SUBSCRIBE_FILTER, QoS::AtLeastOnce).await {
            warn!(error = %e, "MQTT subscribe failed");
        }
    }

    /// Runs the session until shutdown. Session errors mark the mqtt
    /// component unhealthy and back off before the next poll; rumqttc
    /// re-establishes the connection on its own.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (client, mut eventloop) = self.session();
        info!(
            host = %self.config.host,
            port = self.config.port,
            "Starting MQTT ingress"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("MQTT ingress shutting down");
                        let _ = client.disconnect().await;
                        return Ok(());
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        health().mqtt.set_healthy();
                        info!("MQTT session established");
                        self.subscribe(&client).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.handle_publish(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        health().mqtt.set_unhealthy(e.to_string());
                        warn!(error = %e, "MQTT session error, backing off");
                        tokio::time::sleep(Duration::from_millis(
                            self.config.reconnect_delay_ms,
                        ))
                        .await;
                    }
                }
            }
        }
    }

    /// Handles one inbound publish. Split out of the session loop so the
    /// admission path can be driven without a broker.
    pub async fn handle_publish(&self, topic: &str, payload: &[u8]) {
        metrics().messages_received.inc();

        let Some(parsed) = parse_topic(topic) else {
            metrics().malformed_topics.inc();
            debug!(topic = %topic, "Dropping message with malformed topic");
            return;
        };

        let raw_payload = match std::str::from_utf8(payload) {
            Ok(s) => s,
            Err(_) => {
                metrics().malformed_topics.inc();
                debug!(topic = %topic, "Dropping message with non-UTF-8 payload");
                return;
            }
        };

        match self
            .provisioning
            .can_process(&parsed.gateway_id, &parsed.sensor_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                metrics().messages_rejected.inc();
                debug!(
                    gateway_id = %parsed.gateway_id,
                    sensor_id = %parsed.sensor_id,
                    "Message rejected at admission"
                );
                return;
            }
            Err(e) => {
                metrics().messages_rejected.inc();
                warn!(error = %e, "Admission check failed, dropping message");
                return;
            }
        }

        let message = RawTelemetryMessage::new(
            parsed.msg_kind,
            parsed.gateway_id,
            parsed.sensor_id,
            raw_payload,
        );
        match self.queue.push(&message).await {
            Ok(()) => metrics().messages_admitted.inc(),
            Err(e) => warn!(error = %e, "Work queue push failed, message lost"),
        }
    }
}
