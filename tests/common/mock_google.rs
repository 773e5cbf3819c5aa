// SPDX-License-Identifier: MIT

//! A local stand-in for the Google endpoints the service talks to: the
//! OAuth token endpoint, Sheets values/namedRanges, and Drive watch.

use assignment_form::config::OAuthClient;
use assignment_form::services::GoogleClient;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockState {
    /// Rows appended via values:append.
    pub appended: Arc<Mutex<Vec<Vec<String>>>>,
    /// Channel ids registered via files.watch.
    pub channels: Arc<Mutex<Vec<String>>>,
    /// AvailableTexts column cells, header excluded. Mutable so tests can
    /// change the sheet out from under the cache.
    pub available: Arc<Mutex<Vec<String>>>,
    /// Named ranges the mock spreadsheet defines.
    pub named_ranges: Arc<Mutex<Vec<String>>>,
}

pub struct MockGoogle {
    pub base_url: String,
    pub state: MockState,
}

impl MockGoogle {
    /// A GoogleClient wired to this mock.
    pub fn client(&self) -> GoogleClient {
        GoogleClient::new(OAuthClient {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            auth_uri: format!("{}/auth", self.base_url),
            token_uri: format!("{}/token", self.base_url),
        })
        .with_base_urls(&self.base_url, &self.base_url)
    }

    #[allow(dead_code)]
    pub fn appended(&self) -> Vec<Vec<String>> {
        self.state.appended.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn channels(&self) -> Vec<String> {
        self.state.channels.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn set_available(&self, cells: &[&str]) {
        *self.state.available.lock().unwrap() =
            cells.iter().map(|s| s.to_string()).collect();
    }
}

/// Spawn the mock server. The sheet has texters Ada and Grace, campaigns
/// Alpha (Assigning) and Beta (Paused), and the given AvailableTexts cells.
pub async fn spawn(named_ranges: &[&str], available: &[&str]) -> MockGoogle {
    let state = MockState {
        named_ranges: Arc::new(Mutex::new(
            named_ranges.iter().map(|s| s.to_string()).collect(),
        )),
        available: Arc::new(Mutex::new(
            available.iter().map(|s| s.to_string()).collect(),
        )),
        ..Default::default()
    };

    let router = Router::new()
        .route("/token", post(token))
        .route("/{sheet}", get(named_ranges_handler))
        .route("/{sheet}/values/{range}", get(get_values).post(append_values))
        .route("/files/{sheet}/watch", post(watch))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockGoogle {
        base_url: format!("http://{}", addr),
        state,
    }
}

async fn token() -> Json<Value> {
    Json(json!({"access_token": "refreshed_token", "expires_in": 3600}))
}

async fn named_ranges_handler(State(state): State<MockState>) -> Json<Value> {
    let ranges: Vec<Value> = state
        .named_ranges
        .lock()
        .unwrap()
        .iter()
        .map(|name| json!({"name": name}))
        .collect();
    Json(json!({"namedRanges": ranges}))
}

async fn get_values(
    State(state): State<MockState>,
    Path((_sheet, range)): Path<(String, String)>,
) -> Json<Value> {
    let column = |header: &str, cells: &[&str]| -> Value {
        let mut rows = vec![json!([header])];
        rows.extend(cells.iter().map(|c| json!([c])));
        json!(rows)
    };

    let values = match range.as_str() {
        "TexterList" => column("Texter name", &["Ada", "Grace"]),
        "CampaignList" => column("Campaign", &["Alpha", "Beta"]),
        "ActiveRange" => column("State", &["Assigning", "Paused"]),
        "AvailableTexts" => {
            let cells = state.available.lock().unwrap();
            let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
            column("Available", &refs)
        }
        _ => json!([]),
    };
    Json(json!({"values": values}))
}

async fn append_values(
    State(state): State<MockState>,
    Path((_sheet, _range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if let Some(rows) = body["values"].as_array() {
        let mut appended = state.appended.lock().unwrap();
        for row in rows {
            let cells = row
                .as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|c| c.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default();
            appended.push(cells);
        }
    }
    Json(json!({}))
}

async fn watch(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state
        .channels
        .lock()
        .unwrap()
        .push(body["id"].as_str().unwrap_or_default().to_string());
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp_millis();
    Json(json!({"expiration": expiration.to_string()}))
}
