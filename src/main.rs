//! Gridwatch sensor telemetry pipeline
//!
//! Multi-tenant ingestion for electrical-equipment health sensors:
//! - MQTT ingress with per-gateway admission control
//! - Durable Redis work queue decoupling ingress from processing
//! - Per-type payload codecs feeding versioned Postgres stores
//! - Alarm derivation, rolling abnormal counters, and live fan-out

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use abnormal_counters::{AbnormalCounters, RedisCounterStore};
use gateway_ingress::{MqttIngress, MqttIngressConfig};
use live_fanout::{LiveFanout, RedisTransport};
use provisioning::{Provisioning, ProvisioningConfig, RedisProvisioningSource};
use sensor_processor::{Processor, ProcessorConfig};
use sensor_store::{schema, PostgresStore, StoreConfig};
use telemetry::{health, init_tracing_from_env};
use work_queue::{QueueConfig, RedisWorkQueue};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Shared Redis instance: work queue, counters, provisioning reads
    #[serde(default = "default_redis_url")]
    redis_url: String,

    /// Number of concurrent processor workers
    #[serde(default = "default_workers")]
    workers: usize,

    #[serde(default)]
    mqtt: MqttIngressConfig,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    provisioning: ProvisioningConfig,

    #[serde(default)]
    processor: ProcessorConfig,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_workers() -> usize {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            workers: default_workers(),
            mqtt: MqttIngressConfig::default(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
            provisioning: ProvisioningConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting gridwatch pipeline v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    info!(
        redis_url = %config.redis_url,
        mqtt_host = %config.mqtt.host,
        workers = config.workers,
        "Loaded configuration"
    );

    // One multiplexed Redis connection serves the queue, the counters, the
    // fan-out transport, and provisioning reads. Response and connect
    // timeouts keep a wedged Redis from stalling every component at once.
    let redis_client =
        redis::Client::open(config.redis_url.as_str()).context("Invalid Redis URL")?;
    let redis_conn = redis_client
        .get_multiplexed_async_connection_with_timeouts(
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .await
        .context("Failed to connect to Redis")?;
    health().redis.set_healthy();
    info!("Redis connection: healthy");

    // Postgres observation and alarm stores
    let store = Arc::new(
        PostgresStore::connect(&config.store)
            .await
            .context("Failed to connect to Postgres")?,
    );
    if let Err(e) = schema::init_schema(store.pool()).await {
        error!("Failed to initialize store schema: {}", e);
        // Continue anyway - schema might already exist
    }
    match store.ping().await {
        Ok(()) => {
            health().postgres.set_healthy();
            info!("Postgres connection: healthy");
        }
        Err(e) => {
            health().postgres.set_unhealthy(e.to_string());
            error!("Postgres connection: unhealthy: {}", e);
        }
    }

    // Pipeline components
    let queue = Arc::new(RedisWorkQueue::new(redis_conn.clone(), config.queue.clone()));
    let provisioning_source = Arc::new(RedisProvisioningSource::new(redis_conn.clone()));
    let provisioning = Arc::new(Provisioning::new(
        provisioning_source,
        &config.provisioning,
    ));
    let counters = Arc::new(AbnormalCounters::new(Arc::new(RedisCounterStore::new(
        redis_conn.clone(),
    ))));
    let fanout = Arc::new(LiveFanout::new(Arc::new(RedisTransport::new(redis_conn))));

    let processor = Arc::new(Processor::new(
        config.processor.clone(),
        queue.clone(),
        provisioning.clone(),
        store.clone(),
        store.clone(),
        counters,
        fanout,
    ));
    let ingress = Arc::new(MqttIngress::new(
        config.mqtt.clone(),
        provisioning,
        queue,
    ));

    // Spawn the ingress session and the processor workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    let ingress_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = ingress.run(ingress_shutdown).await {
            error!("MQTT ingress exited with error: {}", e);
        }
    }));

    for worker in 0..config.workers.max(1) {
        let processor = processor.clone();
        let worker_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = processor.run(worker_shutdown).await {
                error!("Processor worker {} exited with error: {}", worker, e);
            }
        }));
    }

    shutdown_signal().await;

    // Flip the shutdown flag and let in-flight messages finish
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("GRIDWATCH")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("GRIDWATCH_REDIS_URL") {
        config.redis_url = url;
    }
    if let Ok(url) = std::env::var("GRIDWATCH_STORE_URL") {
        config.store.url = url;
    }
    if let Ok(host) = std::env::var("GRIDWATCH_MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Ok(port) = std::env::var("GRIDWATCH_MQTT_PORT") {
        config.mqtt.port = port.parse().context("Invalid GRIDWATCH_MQTT_PORT")?;
    }
    if let Ok(username) = std::env::var("GRIDWATCH_MQTT_USERNAME") {
        config.mqtt.username = Some(username);
    }
    if let Ok(password) = std::env::var("GRIDWATCH_MQTT_PASSWORD") {
        config.mqtt.password = Some(password);
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
