// SPDX-License-Identifier: MIT

//! Assignment Form Server
//!
//! Serves the texting-assignment request form, backed by a Google Sheet
//! that the operator authorizes once via `/activate`.

use assignment_form::{
    config::Config,
    services::{GoogleClient, SheetService},
    state::StateStore,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let store = StateStore::new(Config::state_dir_from_env());
    let config = Config::load(&store).expect("Failed to load configuration");
    tracing::info!(port = config.port, sheet = %config.sheet_id, "Starting assignment form");

    let google = GoogleClient::new(config.oauth_client.clone());

    let sheets = SheetService::new(
        google.clone(),
        store,
        config.sheet_id.clone(),
        format!("{}/watch", config.external_url),
    );

    // Resume a persisted credential if one exists; otherwise the form stays
    // inactive until the operator visits /activate.
    match sheets.load_persisted().await {
        Ok(true) => {}
        Ok(false) => tracing::info!("No persisted credential, form inactive until activated"),
        Err(e) => tracing::warn!(error = %e, "Failed to load persisted credential"),
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        google,
        sheets,
    });

    let app = assignment_form::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("assignment_form=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
