mod inquiry;
mod invoicing;
mod problem;
mod router;
mod session;
mod telemetry;

use std::net::SocketAddr;

use folio_storage::DataAccess;
use folio_util::{load_env_file, AppConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let access = DataAccess::open(&config.database_url).await;
    let Some(database) = access.database() else {
        error!(stage = "app", url = %config.database_url, "store unavailable, refusing to start");
        return Err(format!("could not open database at {}", config.database_url).into());
    };

    database.ensure_schema().await?;
    if config.seed_demo_data {
        if let Err(err) = database.seed_demo_data().await {
            warn!(stage = "app", error = %err, "demo data could not be seeded");
        }
    }

    let state = router::AppState::new(
        metrics,
        access.clone(),
        config.timezone,
        config.session_idle_timeout,
    );

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        timezone = %config.timezone,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
