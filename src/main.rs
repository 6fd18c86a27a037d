//! Bootstrap binary: wires every component per §9 "construction order" and
//! runs the ingress-drain loop until shutdown. Follows the teacher's
//! `main.rs` shape (`load_env`, `init_tracing`, `AppState`, graceful
//! `tokio::select!` against `ctrl_c`) scaled down to this engine's single
//! consumer loop plus a minimal health route — the health *surface* itself
//! is an external collaborator per spec §1, but the binary still exposes
//! the route it would scrape, exactly as the teacher's own `/health` does.

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use fraud_engine::analyzers::velocity::VelocityAnalyzer;
use fraud_engine::analyzers::{amount::AmountAnalyzer, device::DeviceAnalyzer, geographic::GeographicAnalyzer, recipient::RecipientAnalyzer, time::TimeAnalyzer};
use fraud_engine::analyzers::Analyzer;
use fraud_engine::cache::memory::InMemoryCacheStore;
use fraud_engine::cache::CacheStore;
use fraud_engine::config::Settings;
use fraud_engine::egress::{EventEgress, InMemoryEgress};
use fraud_engine::health::{HealthSnapshot, HealthTracker};
use fraud_engine::ingress::{drain, EventIngress, InMemoryIngress};
use fraud_engine::ml;
use fraud_engine::orchestrator::Orchestrator;
use fraud_engine::stores::{AnalysisStore, BlocklistStore};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct HealthState {
    health: HealthTracker,
    metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("fraud-engine starting up");

    let settings = Arc::new(Settings::from_env()?);
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let cache: Arc<dyn CacheStore> = build_cache(&settings).await?;
    let analysis_store = Arc::new(AnalysisStore::open(&settings.db_path)?);
    let blocklist_store = Arc::new(BlocklistStore::open(
        &settings.db_path,
        Arc::clone(&cache),
        settings.ttl.idempotency_marker,
    )?);

    let analyzers: Vec<Arc<dyn Analyzer>> = vec![
        Arc::new(VelocityAnalyzer::new(settings.velocity.clone(), 0.20)),
        Arc::new(AmountAnalyzer::new(settings.amount.clone(), 0.25)),
        Arc::new(GeographicAnalyzer::new(settings.geographic.clone(), 0.20)),
        Arc::new(RecipientAnalyzer::new(
            settings.recipient.clone(),
            0.15,
            Arc::clone(&blocklist_store),
            settings.geographic.high_risk_countries.clone(),
        )),
        Arc::new(DeviceAnalyzer::new(settings.device.clone(), 0.15, Arc::clone(&blocklist_store))),
        Arc::new(TimeAnalyzer::new(settings.time.clone(), 0.10)),
    ];

    let ml_scorer = ml::model::load_model(&settings.ml)?;

    let egress: Arc<dyn EventEgress> = Arc::new(InMemoryEgress::new());
    let ingress: Arc<dyn EventIngress> = Arc::new(InMemoryIngress::new(1024));

    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        analysis_store,
        analyzers,
        ml_scorer,
        egress,
        Arc::clone(&settings),
    ));

    let health_state = HealthState {
        health: orchestrator.health.clone(),
        metrics: metrics_handle,
    };
    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_render))
        .with_state(health_state);

    let addr: SocketAddr = "0.0.0.0:8080".parse().expect("static health bind address");
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "health server exited");
        }
    });

    let consumer_orchestrator = Arc::clone(&orchestrator);
    let consumer_ingress = Arc::clone(&ingress);
    let consumer = tokio::spawn(async move {
        drain(consumer_ingress.as_ref(), |event, partition_key| {
            let orchestrator = Arc::clone(&consumer_orchestrator);
            async move {
                let transaction_id = event.payload.transaction_id;
                if let Err(e) = orchestrator.process(event).await {
                    warn!(%transaction_id, partition_key = partition_key.as_deref().unwrap_or(""), error = %e, "event processing failed");
                }
            }
        })
        .await;
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining in-flight work");
        }
        _ = consumer => {
            info!("ingress closed, consumer loop exited");
        }
    }

    server.abort();
    info!("fraud-engine shut down");
    Ok(())
}

async fn health_check(State(state): State<HealthState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn metrics_render(State(state): State<HealthState>) -> String {
    state.metrics.render()
}

async fn build_cache(settings: &Settings) -> Result<Arc<dyn CacheStore>> {
    #[cfg(feature = "redis-cache")]
    {
        if let Ok(url) = std::env::var("REDIS_URL") {
            let store = fraud_engine::cache::redis_store::RedisCacheStore::connect(&url, settings.service_name.clone())
                .await?;
            return Ok(Arc::new(store));
        }
    }
    let _ = settings;
    Ok(Arc::new(InMemoryCacheStore::new()))
}

/// Initialize tracing with an `EnvFilter` driven by `RUST_LOG`, falling
/// back to a sensible default (teacher's `init_tracing`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraud_engine=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Standard dotenv search (cwd + parents); mirrors the teacher's
/// `load_env`, minus the repo-root fallback search that doesn't apply to
/// this standalone service binary.
fn load_env() {
    let _ = dotenvy::dotenv();
}
