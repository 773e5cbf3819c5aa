// SPDX-License-Identifier: MIT

//! Google API client: OAuth2 token endpoints, Sheets v4 values and named
//! ranges, and Drive v3 push-notification channels.
//!
//! Plain REST over reqwest. A 401 from any endpoint means the credential is
//! no longer good, which surfaces as the form being inactive; every other
//! failure is a gateway-class Google error. No retries.

use crate::config::OAuthClient;
use crate::error::AppError;
use serde::Deserialize;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

/// OAuth scopes requested at authorization.
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets \
                      https://www.googleapis.com/auth/drive.metadata.readonly";

/// Google API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    oauth: OAuthClient,
    sheets_base: String,
    drive_base: String,
}

/// Token response from the OAuth token endpoint. Refresh responses omit
/// the refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until expiry.
    pub expires_in: i64,
}

#[derive(Deserialize)]
struct NamedRangesResponse {
    #[serde(rename = "namedRanges", default)]
    named_ranges: Vec<NamedRange>,
}

#[derive(Deserialize)]
struct NamedRange {
    name: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Drive watch response; expiration is a millisecond timestamp sent as a
/// JSON string.
#[derive(Deserialize)]
struct WatchResponse {
    expiration: String,
}

impl GoogleClient {
    pub fn new(oauth: OAuthClient) -> Self {
        Self {
            http: reqwest::Client::new(),
            oauth,
            sheets_base: SHEETS_BASE.to_string(),
            drive_base: DRIVE_BASE.to_string(),
        }
    }

    /// Override API base URLs (tests only; the token endpoint is already
    /// injectable through the OAuth client config).
    pub fn with_base_urls(mut self, sheets_base: &str, drive_base: &str) -> Self {
        self.sheets_base = sheets_base.trim_end_matches('/').to_string();
        self.drive_base = drive_base.trim_end_matches('/').to_string();
        self
    }

    // ─── OAuth ───────────────────────────────────────────────────────────

    /// Build the authorization URL the operator is redirected to.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
             access_type=offline&include_granted_scopes=true&prompt=consent&state={}",
            self.oauth.auth_uri,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth.token_uri)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth.token_uri)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token refresh failed: {}", e)))?;

        // A revoked or stale refresh token comes back as 400 invalid_grant.
        // That credential is dead, so the form is inactive.
        if response.status().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                tracing::warn!("Refresh token no longer valid (invalid_grant)");
                return Err(AppError::Inactive);
            }
            return Err(AppError::GoogleApi(format!("HTTP 400: {}", body)));
        }

        self.check_response_json(response).await
    }

    // ─── Sheets ──────────────────────────────────────────────────────────

    /// List the names of all named ranges on a spreadsheet.
    pub async fn named_ranges(
        &self,
        access_token: &str,
        sheet_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let url = format!("{}/{}?fields=namedRanges", self.sheets_base, sheet_id);
        let response: NamedRangesResponse = self.get_json(&url, access_token).await?;
        Ok(response.named_ranges.into_iter().map(|r| r.name).collect())
    }

    /// Read a range (named ranges are valid range strings).
    pub async fn get_range(
        &self,
        access_token: &str,
        sheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, AppError> {
        let url = format!(
            "{}/{}/values/{}",
            self.sheets_base,
            sheet_id,
            urlencoding::encode(range)
        );
        let response: ValueRange = self.get_json(&url, access_token).await?;
        Ok(response.values)
    }

    /// Append one row to a range.
    pub async fn append_row(
        &self,
        access_token: &str,
        sheet_id: &str,
        range: &str,
        values: &[String],
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.sheets_base,
            sheet_id,
            urlencoding::encode(range)
        );

        let body = serde_json::json!({ "values": [values] });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        self.check_response(response).await
    }

    // ─── Drive ───────────────────────────────────────────────────────────

    /// Register a web_hook push channel for changes to a file.
    /// Returns the channel expiry as a Unix millisecond timestamp.
    pub async fn watch_file(
        &self,
        access_token: &str,
        file_id: &str,
        channel_id: &str,
        address: &str,
    ) -> Result<i64, AppError> {
        let url = format!("{}/files/{}/watch", self.drive_base, file_id);

        let body = serde_json::json!({
            "id": channel_id,
            "type": "web_hook",
            "address": address,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        let watch: WatchResponse = self.check_response_json(response).await?;
        watch
            .expiration
            .parse()
            .map_err(|_| AppError::GoogleApi(format!("Bad watch expiration: {}", watch.expiration)))
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.error_for(response).await)
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))
    }

    async fn error_for(&self, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Rejected credential means the form is no longer active
        if status.as_u16() == 401 {
            tracing::warn!("Google rejected credential (401)");
            return AppError::Inactive;
        }

        AppError::GoogleApi(format!("HTTP {}: {}", status, body))
    }
}
