//! Test environment wiring.
//!
//! All components run against their in-memory backends, so a test exercises
//! every production code path except the broker, Redis, and Postgres
//! transports.

use std::sync::Arc;

use abnormal_counters::{AbnormalCounters, MemoryCounterStore};
use gateway_ingress::{MqttIngress, MqttIngressConfig};
use live_fanout::{LiveFanout, MemoryTransport};
use provisioning::{MemoryProvisioningSource, Provisioning, ProvisioningConfig};
use sensor_core::SensorMeta;
use sensor_processor::{Processor, ProcessorConfig};
use sensor_store::MemoryStore;
use work_queue::{MemoryWorkQueue, WorkQueue};

pub struct TestContext {
    pub source: Arc<MemoryProvisioningSource>,
    pub provisioning: Arc<Provisioning>,
    pub queue: Arc<MemoryWorkQueue>,
    pub store: Arc<MemoryStore>,
    pub counters: Arc<AbnormalCounters>,
    pub transport: Arc<MemoryTransport>,
    pub fanout: Arc<LiveFanout>,
    pub ingress: MqttIngress,
    pub processor: Processor,
}

impl TestContext {
    pub fn new() -> Self {
        let source = Arc::new(MemoryProvisioningSource::new());
        let provisioning = Arc::new(Provisioning::new(
            source.clone(),
            &ProvisioningConfig::default(),
        ));
        let queue = Arc::new(MemoryWorkQueue::new());
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(AbnormalCounters::new(Arc::new(MemoryCounterStore::new())));
        let transport = Arc::new(MemoryTransport::new());
        let fanout = Arc::new(LiveFanout::new(transport.clone()));

        let ingress = MqttIngress::new(
            MqttIngressConfig::default(),
            provisioning.clone(),
            queue.clone(),
        );
        let processor = Processor::new(
            ProcessorConfig::default(),
            queue.clone(),
            provisioning.clone(),
            store.clone(),
            store.clone(),
            counters.clone(),
            fanout.clone(),
        );

        Self {
            source,
            provisioning,
            queue,
            store,
            counters,
            transport,
            fanout,
            ingress,
            processor,
        }
    }

    /// Enables a gateway and provisions a sensor under it.
    pub fn provision(&self, gateway_id: &str, sensor_id: &str, meta: SensorMeta) {
        self.source.enable_gateway(gateway_id);
        self.source.provision_sensor(sensor_id, meta);
    }

    /// Publishes one message through the ingress admission path.
    pub async fn publish(&self, topic: &str, payload: &str) {
        self.ingress.handle_publish(topic, payload.as_bytes()).await;
    }

    /// Pops and processes every queued message, FIFO.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        while let Some(msg) = self.queue.pop().await.expect("memory queue pop") {
            self.processor.process_message(&msg).await;
            processed += 1;
        }
        processed
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
