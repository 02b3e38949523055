use std::sync::Arc;

use momentum_relay::{start_server, AppState, HttpMailer, LogMailer, Mailer, RelayConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => info!(error = %e, "no .env loaded"),
    }

    if let Err(e) = run().await {
        error!(error = %e, "relay failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;

    let mailer: Arc<dyn Mailer> = match &config.mail_api {
        Some(api) => {
            info!(url = %api.url, "delivering through mail API");
            Arc::new(HttpMailer::new(api.clone())?)
        }
        None => {
            warn!("MAIL_API_URL not set; outgoing mail is only logged");
            Arc::new(LogMailer::new())
        }
    };

    let state = Arc::new(AppState::new(mailer, config.from.clone()));
    start_server(&config, state).await?;
    Ok(())
}
