//! CostsMap client - Main Entry Point
//!
//! Loads configuration, restores the persisted session and, when signed in,
//! prints the profile and the current month's totals.

use std::sync::Arc;

use costsmap_application::{FinanceService, SessionManager};
use costsmap_domain::AuthState;
use costsmap_infrastructure::{ClientConfig, FileSessionStorage, ReqwestApiClient, SystemClock};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CostsMap client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::load()?;
    let client = Arc::new(ReqwestApiClient::from_config(&config)?);
    let clock = Arc::new(SystemClock::new());
    let storage = Arc::new(FileSessionStorage::new(
        config.session_path()?,
        clock.clone(),
    ));
    info!(base_url = %client.base_url(), session = %storage.path().display(), "Client configured");

    let session = SessionManager::restore(
        client.clone(),
        storage,
        clock,
        config.session_settings(),
    )
    .await;
    info!("{}", session.status().display_message());

    if matches!(session.state(), AuthState::Unauthenticated) {
        info!("No session, sign in to load data");
        return Ok(());
    }

    match session.load_current_user().await {
        Ok(user) => info!(user = %user.display_name, currency = user.currency.symbol(), "Signed in"),
        Err(e) if e.requires_login() => {
            warn!("Session could not be renewed, sign in again");
            return Ok(());
        }
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "{}", e.user_message());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let finance = FinanceService::new(session, client);
    let overview = finance.month_overview().await?.rounded();
    info!(
        costs = %overview.costs_total,
        incomes = %overview.incomes_total,
        balance = %overview.balance(),
        "Current month"
    );

    Ok(())
}
