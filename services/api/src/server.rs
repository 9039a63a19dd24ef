use crate::cli::ServeArgs;
use crate::infra::{AppState, LocalDispatcher};
use crate::routes::with_form_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fc_forms::config::AppConfig;
use fc_forms::error::AppError;
use fc_forms::telemetry;
use fc_forms::workflows::dispatch::{
    InMemoryFormRepository, InMemoryJobDirectory, LocalObjectStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let dispatcher = Arc::new(LocalDispatcher::new(
        Arc::new(LocalObjectStore::new(config.dispatch.object_root.clone())),
        Arc::new(InMemoryJobDirectory::default()),
        Arc::new(InMemoryFormRepository::default()),
        &config.dispatch,
    ));

    let app = with_form_routes(dispatcher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        object_root = %config.dispatch.object_root.display(),
        "fc form processor ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
