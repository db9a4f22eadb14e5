//! Sign in with credentials from the environment and log where the
//! session router sends the account.
//!
//! Reads `SUPABASE_URL`, `SUPABASE_KEY`, `COOKEASE_EMAIL` and
//! `COOKEASE_PASSWORD` (a `.env` file is honoured).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use cookease::config::RouterOptions;
use cookease::router::RouterState;
use cookease::CookEase;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cookease=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let backend = CookEase::from_env()?;
    let email = env::var("COOKEASE_EMAIL")?;
    let password = env::var("COOKEASE_PASSWORD")?;

    let navigator = |path: &str| tracing::info!(path, "navigator.replace");
    let router = backend
        .session_router(Arc::new(navigator), RouterOptions::default())
        .start();

    if let Err(e) = router.sign_in(&email, &password).await {
        tracing::error!(error = %e, alert = e.alert_message(), "sign in rejected");
        router.shutdown().await;
        return Ok(());
    }

    // The sign-in event is queued; let the router pick it up first
    router.settle().await?;
    let resolved = tokio::time::timeout(
        Duration::from_secs(15),
        router.wait_for(|s| s.state != RouterState::AuthenticatedUnresolved),
    )
    .await??;

    match &resolved.profile {
        Some(profile) => tracing::info!(
            state = ?resolved.state,
            name = %profile.full_name,
            role = %profile.user_role,
            "session resolved"
        ),
        None => tracing::warn!(state = ?resolved.state, "session did not resolve to a profile"),
    }

    if resolved.state.is_authenticated() {
        router.sign_out().await?;
        router
            .wait_for(|s| s.state == RouterState::Unauthenticated)
            .await?;
    }

    router.shutdown().await;
    Ok(())
}
