// SPDX-License-Identifier: MIT

//! Google OAuth authorization routes.
//!
//! `/activate` starts the authorization-code flow; `/oauth2callback`
//! finishes it, checks the spreadsheet structure, and installs the handle.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::models::Credential;
use crate::services::sheet::{self, SheetHandle};
use crate::AppState;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activate", get(activate))
        .route("/oauth2callback", get(oauth2_callback))
}

/// Start the OAuth flow: redirect the operator to Google with a signed
/// state parameter.
async fn activate(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let oauth_state = sign_state(timestamp, &state.config.secret_key)?;
    let redirect_uri = callback_url(&state.config.external_url);
    let auth_url = state.google.authorization_url(&redirect_uri, &oauth_state);

    tracing::info!("Starting OAuth flow, redirecting to Google");
    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: exchange the code, verify the spreadsheet has every
/// required named range, then persist and install the new handle. A missing
/// range fails with 424 before anything is cached.
async fn oauth2_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    if !verify_state(&params.state, &state.config.secret_key) {
        tracing::warn!("Invalid or tampered OAuth state parameter");
        return Err(AppError::BadRequest("invalid OAuth state".to_string()));
    }

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Err(AppError::BadRequest(format!("authorization failed: {}", error)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let redirect_uri = callback_url(&state.config.external_url);
    let tokens = state.google.exchange_code(&code, &redirect_uri).await?;

    let credential = Credential {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
    };

    // Make sure we can reach the sheet and it has the structure we need
    let sheet_id = &state.config.sheet_id;
    let ranges = state
        .google
        .named_ranges(&credential.access_token, sheet_id)
        .await?;
    for required in sheet::ALL_RANGES {
        if !ranges.iter().any(|name| name == required) {
            tracing::warn!(range = required, "Spreadsheet missing required named range");
            return Err(AppError::MissingNamedRange(required.to_string()));
        }
    }

    // Leave an activation marker in the responses log, which also proves
    // we can write before the credential is cached
    let marker = sheet::timestamped_row(&[
        String::new(),
        "activating".to_string(),
        String::new(),
        format!("{}/activate", state.config.external_url),
    ]);
    state
        .google
        .append_row(&credential.access_token, sheet_id, sheet::RESPONSES, &marker)
        .await?;

    state
        .sheets
        .install(SheetHandle::new(sheet_id.clone(), credential))
        .await?;

    tracing::info!("Authorization complete, sheet handle installed");
    Ok(Redirect::temporary("/"))
}

fn callback_url(external_url: &str) -> String {
    format!("{}/oauth2callback", external_url)
}

/// Sign a millisecond timestamp into an OAuth state parameter:
/// base64url("timestamp_hex|signature_hex").
fn sign_state(timestamp: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{:x}", timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature on an OAuth state parameter.
fn verify_state(state: &str, secret: &[u8]) -> bool {
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(state) else {
        return false;
    };
    let Ok(state_str) = String::from_utf8(bytes) else {
        return false;
    };

    let parts: Vec<&str> = state_str.splitn(2, '|').collect();
    if parts.len() != 2 {
        return false;
    }
    let (payload, signature_hex) = (parts[0], parts[1]);

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected {
        tracing::warn!("OAuth state signature mismatch");
        return false;
    }
    true
}
