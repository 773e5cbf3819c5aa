// SPDX-License-Identifier: MIT

pub mod mock_google;

use assignment_form::config::Config;
use assignment_form::models::Credential;
use assignment_form::routes::create_router;
use assignment_form::services::{GoogleClient, SheetHandle, SheetService};
use assignment_form::state::StateStore;
use assignment_form::AppState;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A test app with its state and the tempdir backing its state store.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    _state_dir: tempfile::TempDir,
}

/// Create a test app whose Google client points at the real endpoints.
/// Fine for tests that never leave the process.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::test_default();
    create_test_app_with(GoogleClient::new(config.oauth_client.clone()))
}

/// Create a test app with a custom Google client (e.g. one pointed at a
/// local mock server).
#[allow(dead_code)]
pub fn create_test_app_with(google: GoogleClient) -> TestApp {
    let config = Config::test_default();
    let state_dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::new(state_dir.path());

    let sheets = SheetService::new(
        google.clone(),
        store,
        config.sheet_id.clone(),
        format!("{}/watch", config.external_url),
    );

    let state = Arc::new(AppState {
        config,
        google,
        sheets,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        _state_dir: state_dir,
    }
}

/// Install an authorized handle with memoized sheet data, so form routes
/// work without any Google traffic.
#[allow(dead_code)]
pub async fn install_active_handle(state: &AppState, channel: &str) {
    let mut handle = SheetHandle::new(
        state.config.sheet_id.clone(),
        Credential {
            access_token: "cached_token".to_string(),
            refresh_token: Some("cached_refresh".to_string()),
            expires_at: Utc::now() + Duration::hours(1),
        },
    );
    handle.channel = Some(channel.to_string());
    handle.channel_expires_at = Some(Utc::now() + Duration::hours(1));
    handle.texters = Some(vec!["Ada".to_string(), "Grace".to_string()]);
    handle.campaigns = Some(BTreeMap::from([
        ("Alpha".to_string(), 500),
        ("Beta".to_string(), 120),
    ]));

    state.sheets.install(handle).await.expect("install handle");
}
