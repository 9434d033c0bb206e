//! Probes a live backend: optionally logs in, runs one forced session
//! check and prints what the facade ended up with.
//!
//! ```text
//! SESSYNC_BASE_URL=http://localhost:8080 \
//! SESSYNC_EMAIL=admin@example.com SESSYNC_PASSWORD=secret \
//! RUST_LOG=sessync=debug cargo run -p session-probe
//! ```
//!
//! `SESSYNC_STORE_PATH` persists the session to a JSON file and restores
//! it on the next run.

use std::env;

use sessync::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> Result<(), SessyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base_url = env::var("SESSYNC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let config = SessionConfig {
        // The probe runs once; the confirming check is done explicitly.
        post_login_check_delay: None,
        ..SessionConfig::from_env()?
    };
    let fetcher = HttpFetcher::new(&base_url)?;

    match env::var("SESSYNC_STORE_PATH") {
        Ok(path) => {
            let session = SessionFacade::builder()
                .config(config)
                .store(FileStore::new(path))
                .restore_persisted(true)
                .build(fetcher)?;
            probe(&session).await;
        }
        Err(_) => {
            let session = SessionFacade::builder().config(config).build(fetcher)?;
            probe(&session).await;
        }
    }
    Ok(())
}

async fn probe<S: LocalStore>(session: &SessionFacade<HttpFetcher, S>) {
    session.add_listener(|snap| {
        tracing::info!(
            phase = ?snap.phase,
            provenance = ?snap.provenance,
            loading = snap.is_loading,
            "session changed"
        );
    });

    if let (Ok(email), Ok(password)) = (env::var("SESSYNC_EMAIL"), env::var("SESSYNC_PASSWORD")) {
        let outcome = match session.login(&email, &password).await {
            LoginOutcome::RequiresConfirmation { message } => {
                tracing::warn!(?message, "account is logged in elsewhere, taking the session over");
                session.confirm_duplicate_login(&email, &password).await
            }
            other => other,
        };
        tracing::info!(?outcome, "login finished");
    }

    let logged_in = session.check_session(true).await;
    let snapshot = session.snapshot();

    println!("logged in:  {logged_in}");
    println!("phase:      {:?}", snapshot.phase);
    println!("provenance: {:?}", snapshot.provenance);
    if let Some(user) = &snapshot.user {
        println!("user:       {}", serde_json::to_string_pretty(user).unwrap_or_default());
    }
    if let Some(info) = &snapshot.session_info {
        println!("session:    {}", serde_json::to_string_pretty(info).unwrap_or_default());
    }
}
