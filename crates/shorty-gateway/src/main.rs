use anyhow::Context;
use clap::Parser;
use shorty_core::{KeyValueBackend, Shortener};
use shorty_gateway::config::StorageBackendArg;
use shorty_gateway::telemetry::init_tracing;
use shorty_gateway::{App, AppState, Cli, PrometheusMetrics};
use shorty_generator::CounterAllocator;
use shorty_shortener::ShortenerService;
use shorty_storage::{InMemoryBackend, RedisBackend};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    info!(
        storage = %cli.storage,
        write_policy = %cli.write_policy,
        id_buffer = cli.id_buffer,
        "starting shorty"
    );

    match cli.storage {
        StorageBackendArg::Redis => {
            let url = cli.redis_connection_url();
            let backend = RedisBackend::connect(&url)
                .with_context(|| format!("failed to configure Redis backend for {url}"))?;
            run(cli, Arc::new(backend)).await
        }
        StorageBackendArg::InMemory => run(cli, Arc::new(InMemoryBackend::new())).await,
    }
}

async fn run<B: KeyValueBackend>(cli: Cli, backend: Arc<B>) -> anyhow::Result<()> {
    let allocator = CounterAllocator::start(Arc::clone(&backend), cli.allocator_settings())
        .await
        .context("failed to start id allocator")?;

    let metrics = Arc::new(PrometheusMetrics::new().context("failed to register metrics")?);
    let service = ShortenerService::new(backend, Arc::new(allocator))
        .with_observer(metrics.clone())
        .with_write_policy(cli.write_policy);
    let shortener: Arc<dyn Shortener> = Arc::new(service);

    let app = App::router(AppState::new(Arc::clone(&shortener), metrics));
    let listener = tokio::net::TcpListener::bind(cli.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", cli.listen_addr()))?;
    info!(listen_addr = %listener.local_addr()?, "starting gateway server");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop_rx.await.ok();
            })
            .await
    });

    let served = tokio::select! {
        result = &mut server => Some(result),
        _ = shutdown_signal() => None,
    };

    let outcome = match served {
        Some(Ok(result)) => result.context("server stopped unexpectedly"),
        Some(Err(e)) => Err(anyhow::Error::new(e).context("server task panicked")),
        None => {
            info!(timeout = ?cli.shutdown_timeout(), "shutdown signal received, draining requests");
            stop_tx.send(()).ok();
            match tokio::time::timeout(cli.shutdown_timeout(), &mut server).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(anyhow::Error::new(e).context("server failed while draining")),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("server task panicked")),
                Err(_) => {
                    warn!("shutdown window elapsed with requests in flight, aborting them");
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    shortener.close().await;
    match &outcome {
        Ok(()) => info!("shorty stopped"),
        Err(e) => error!(error = %e, "shorty stopped with an error"),
    }
    outcome
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
