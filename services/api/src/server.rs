use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use muster::config::AppConfig;
use muster::error::AppError;
use muster::recruit::{InMemoryParticipationLedger, RecruitmentRegistry, SessionStore};
use muster::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{AppState, LogAnnouncementPublisher};
use crate::routes::with_recruit_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let publisher = Arc::new(LogAnnouncementPublisher::default());
    let ledger = Arc::new(InMemoryParticipationLedger::new());
    let registry = Arc::new(RecruitmentRegistry::new(
        publisher,
        ledger,
        config.recruit.selection_config(),
    ));
    let sessions = Arc::new(SessionStore::new(config.recruit.session_ttl));

    // Background reclamation of abandoned wizard sessions.
    let sweep_sessions = Arc::clone(&sessions);
    let sweep_interval = config.recruit.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweep_sessions.sweep();
        }
    });

    let app = with_recruit_routes(registry, sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "raid muster service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
