//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::{AppSettings, ServerConfig};

#[cfg(feature = "metrics")]
use metrics::Metrics;
use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::dev::{Server, ServerHandle, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::{info, warn};

use chama::Trace;
#[cfg(debug_assertions)]
use chama::doc::ApiDoc;
use chama::domain::SessionContext;
use chama::inbound::http::configure_api;
use chama::inbound::http::error::{json_config, path_config, query_config};
use chama::inbound::http::health::{HealthState, live, ready};
use chama::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use state_builders::{build_bootstrap, build_http_state, build_ports, build_session};

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    session: SessionMiddleware<CookieSessionStore>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let api = web::scope("/api/v1")
        .wrap(session)
        .configure(configure_api);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Fail liveness and stop the instance session ahead of a graceful stop.
fn begin_drain(health: &HealthState, context: &SessionContext) {
    health.mark_unhealthy();
    context.teardown();
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await
}

fn spawn_drain_on_signal(
    handle: ServerHandle,
    health: web::Data<HealthState>,
    context: Arc<SessionContext>,
) {
    tokio::spawn(async move {
        if let Err(error) = shutdown_signal().await {
            warn!(%error, "shutdown signal listener failed; graceful drain disabled");
            return;
        }
        info!("shutdown requested; draining");
        begin_drain(&health, &context);
        handle.stop(true).await;
    });
}

/// Build the services, start the instance session and bind the listener.
///
/// The admin bootstrap runs in the background; its failure is logged and
/// never stops the server. Readiness flips once the listener is bound and
/// the boot session has settled. SIGINT or SIGTERM fails liveness, tears the
/// session down and stops the server gracefully.
///
/// # Errors
/// Propagates invalid remote settings and socket bind failures.
pub async fn create_server(config: ServerConfig) -> std::io::Result<Server> {
    let ServerConfig {
        settings,
        session,
        bind_addr,
    } = config;

    let ports = build_ports(&settings)?;
    let http_state = build_http_state(&ports, &settings);
    let (tracker, context) = build_session(&ports, &http_state.accounts, &settings);
    context.init().await;

    let health_state = web::Data::new(HealthState::new().with_session(Arc::clone(&context)));
    let http_state = web::Data::new(http_state);

    #[cfg(feature = "metrics")]
    let metrics = Arc::new(Metrics::new()?);

    match settings.admin_credentials() {
        Some(credentials) => {
            let bootstrap = build_bootstrap(tracker, &ports);
            #[cfg(feature = "metrics")]
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let outcome = bootstrap.ensure_admin(&credentials).await;
                #[cfg(feature = "metrics")]
                metrics.record_bootstrap(outcome);
                #[cfg(not(feature = "metrics"))]
                tracing::debug!(?outcome, "admin bootstrap task finished");
            });
        }
        None => info!("admin bootstrap credentials not configured; skipping"),
    }

    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = build_app(
            server_health_state.clone(),
            http_state.clone(),
            session.middleware(),
        );
        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics.http.clone());
        app
    })
    .disable_signals()
    .bind(bind_addr)?
    .run();

    spawn_drain_on_signal(server.handle(), health_state.clone(), context);
    info!(%bind_addr, "listening");
    health_state.mark_ready();
    Ok(server)
}
