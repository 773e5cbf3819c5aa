// SPDX-License-Identifier: MIT

//! The cached sheet handle and its lifecycle.
//!
//! `SheetService` owns the one handle for the process: the OAuth credential,
//! the Drive watch channel, and the memoized texter/campaign data. It is
//! constructed once at startup and passed to every handler through
//! `AppState`; all mutation happens under a single write lock, which also
//! serializes credential refresh. The handle is persisted to the state
//! store as a versioned blob and resumed across restarts.

use crate::error::AppError;
use crate::models::campaign::zip_campaigns;
use crate::models::{CachedSheet, Credential};
use crate::services::google::GoogleClient;
use crate::state::{keys, StateStore};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Named ranges the spreadsheet must define.
pub const TEXTER_LIST: &str = "TexterList";
pub const CAMPAIGN_LIST: &str = "CampaignList";
pub const ACTIVE_STATE: &str = "ActiveRange";
pub const AVAILABLE_TEXTS: &str = "AvailableTexts";
pub const RESPONSES: &str = "Responses";

pub const ALL_RANGES: [&str; 5] = [
    TEXTER_LIST,
    CAMPAIGN_LIST,
    ACTIVE_STATE,
    AVAILABLE_TEXTS,
    RESPONSES,
];

/// The in-process sheet handle: credential plus memoized sheet data.
#[derive(Debug, Clone)]
pub struct SheetHandle {
    pub sheet_id: String,
    pub credential: Credential,
    pub channel: Option<String>,
    pub channel_expires_at: Option<DateTime<Utc>>,
    /// Memoized texter roster (first column of TexterList, header dropped).
    pub texters: Option<Vec<String>>,
    /// Memoized campaign→quota map for rows marked Assigning.
    pub campaigns: Option<BTreeMap<String, i64>>,
}

impl SheetHandle {
    pub fn new(sheet_id: String, credential: Credential) -> Self {
        Self {
            sheet_id,
            credential,
            channel: None,
            channel_expires_at: None,
            texters: None,
            campaigns: None,
        }
    }

    fn from_cached(cached: CachedSheet) -> Self {
        let mut handle = Self::new(cached.sheet_id, cached.credential);
        handle.channel = cached.channel;
        handle.channel_expires_at = cached.channel_expires_at;
        handle
    }

    fn to_cached(&self) -> CachedSheet {
        CachedSheet {
            version: crate::models::credential::CACHED_SHEET_VERSION,
            sheet_id: self.sheet_id.clone(),
            credential: self.credential.clone(),
            channel: self.channel.clone(),
            channel_expires_at: self.channel_expires_at,
        }
    }

    /// The sheet changed: drop memoized data so the next read refetches.
    pub fn modified(&mut self) {
        self.texters = None;
        self.campaigns = None;
    }
}

/// Process-wide sheet access, injected into handlers via `AppState`.
#[derive(Clone)]
pub struct SheetService {
    google: GoogleClient,
    store: StateStore,
    sheet_id: String,
    /// Address Drive pushes change notifications to.
    watch_address: String,
    handle: Arc<RwLock<Option<SheetHandle>>>,
}

impl SheetService {
    pub fn new(
        google: GoogleClient,
        store: StateStore,
        sheet_id: String,
        watch_address: String,
    ) -> Self {
        Self {
            google,
            store,
            sheet_id,
            watch_address,
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Resume a persisted handle, if one exists for the configured sheet.
    /// Called once at startup; a missing or stale blob just means the
    /// operator has to re-authorize.
    pub async fn load_persisted(&self) -> Result<bool, AppError> {
        let Some(bytes) = self.store.get(keys::SHEET)? else {
            return Ok(false);
        };
        let Some(cached) = CachedSheet::from_bytes(&bytes) else {
            return Ok(false);
        };
        if cached.sheet_id != self.sheet_id {
            tracing::warn!(
                cached_sheet = %cached.sheet_id,
                "Persisted handle is for a different spreadsheet, ignoring"
            );
            return Ok(false);
        }

        *self.handle.write().await = Some(SheetHandle::from_cached(cached));
        tracing::info!("Resumed persisted sheet credential");
        Ok(true)
    }

    /// Persist and install a freshly authorized handle.
    pub async fn install(&self, handle: SheetHandle) -> Result<(), AppError> {
        self.persist(&handle)?;
        *self.handle.write().await = Some(handle);
        Ok(())
    }

    fn persist(&self, handle: &SheetHandle) -> Result<(), AppError> {
        let bytes = handle
            .to_cached()
            .to_bytes()
            .map_err(|e| AppError::State(format!("failed to serialize handle: {}", e)))?;
        self.store.set(keys::SHEET, &bytes)
    }

    /// Texter roster and open campaigns, fetching and memoizing as needed.
    pub async fn form_data(&self) -> Result<(Vec<String>, BTreeMap<String, i64>), AppError> {
        let mut guard = self.handle.write().await;
        if guard.is_none() {
            // Lazy resume for requests that arrive before any startup load
            drop(guard);
            self.load_persisted().await?;
            guard = self.handle.write().await;
        }
        let handle = guard.as_mut().ok_or(AppError::Inactive)?;

        let token = self.ensure_fresh_credential(handle).await?;
        self.rewatch(handle, &token).await;

        if let (Some(texters), Some(campaigns)) = (&handle.texters, &handle.campaigns) {
            return Ok((texters.clone(), campaigns.clone()));
        }

        let sheet_id = handle.sheet_id.clone();
        let texters = self.get_column(&token, &sheet_id, TEXTER_LIST).await?;
        let names = self.get_column(&token, &sheet_id, CAMPAIGN_LIST).await?;
        let states = self.get_column(&token, &sheet_id, ACTIVE_STATE).await?;
        let counts = self.get_column(&token, &sheet_id, AVAILABLE_TEXTS).await?;
        let campaigns = zip_campaigns(&names, &states, &counts);

        tracing::debug!(
            texters = texters.len(),
            campaigns = campaigns.len(),
            "Fetched sheet data"
        );

        handle.texters = Some(texters.clone());
        handle.campaigns = Some(campaigns.clone());
        Ok((texters, campaigns))
    }

    /// Append a response row: local timestamp, then the given values.
    pub async fn append_response(&self, values: &[String]) -> Result<(), AppError> {
        let mut guard = self.handle.write().await;
        let handle = guard.as_mut().ok_or(AppError::Inactive)?;
        let token = self.ensure_fresh_credential(handle).await?;

        let row = timestamped_row(values);
        self.google
            .append_row(&token, &handle.sheet_id, RESPONSES, &row)
            .await
    }

    /// Handle a Drive push notification. Returns false if the channel does
    /// not match the cached handle (the caller answers 410); the cache is
    /// left untouched in that case.
    pub async fn notify_change(
        &self,
        channel_id: &str,
        resource_state: &str,
        changed: &[&str],
    ) -> bool {
        let mut guard = self.handle.write().await;
        let Some(handle) = guard.as_mut() else {
            return false;
        };
        if handle.channel.as_deref() != Some(channel_id) {
            return false;
        }

        if resource_state == "update" && changed.contains(&"content") {
            tracing::info!("Sheet content changed, clearing memoized data");
            handle.modified();
        }
        true
    }

    /// A valid access token, refreshing and persisting if expired.
    async fn ensure_fresh_credential(&self, handle: &mut SheetHandle) -> Result<String, AppError> {
        if handle.credential.expired(Utc::now()) {
            let Some(refresh_token) = handle.credential.refresh_token.clone() else {
                tracing::warn!("Credential expired with no refresh token");
                return Err(AppError::Inactive);
            };

            let response = self.google.refresh_token(&refresh_token).await?;
            handle.credential.access_token = response.access_token;
            handle.credential.expires_at = Utc::now() + Duration::seconds(response.expires_in);
            if let Some(new_refresh) = response.refresh_token {
                handle.credential.refresh_token = Some(new_refresh);
            }
            self.persist(handle)?;
            tracing::info!("Access token refreshed and persisted");
        }

        Ok(handle.credential.access_token.clone())
    }

    /// Renew the Drive watch channel if it is absent or expired. Renewal
    /// also drops memoized data, since changes may have been missed while
    /// no channel was live. A failed registration is logged and left for
    /// the next read to retry; the form still works without push
    /// invalidation.
    async fn rewatch(&self, handle: &mut SheetHandle, token: &str) {
        let live = handle
            .channel_expires_at
            .is_some_and(|expires| expires > Utc::now());
        if live {
            return;
        }

        handle.modified();

        let channel_id = new_channel_id();
        match self
            .google
            .watch_file(token, &handle.sheet_id, &channel_id, &self.watch_address)
            .await
        {
            Ok(expiration_ms) => {
                handle.channel = Some(channel_id);
                handle.channel_expires_at = DateTime::from_timestamp_millis(expiration_ms);
                if let Err(e) = self.persist(handle) {
                    tracing::warn!(error = %e, "Failed to persist renewed watch channel");
                }
                tracing::info!(
                    expires_at = ?handle.channel_expires_at,
                    "Watch channel registered"
                );
            }
            Err(e) => {
                handle.channel = None;
                handle.channel_expires_at = None;
                tracing::warn!(error = %e, "Failed to register watch channel");
            }
        }
    }

    /// Read a named range and keep the first cell of each row, dropping the
    /// header row.
    async fn get_column(
        &self,
        token: &str,
        sheet_id: &str,
        range: &str,
    ) -> Result<Vec<String>, AppError> {
        let rows = self.google.get_range(token, sheet_id, range).await?;
        Ok(first_column(rows))
    }
}

/// First cell of each row after the header.
fn first_column(rows: Vec<Vec<String>>) -> Vec<String> {
    rows.into_iter()
        .skip(1)
        .filter_map(|row| row.into_iter().next())
        .collect()
}

/// Prepend the local timestamp to a response row.
pub fn timestamped_row(values: &[String]) -> Vec<String> {
    let mut row = Vec::with_capacity(values.len() + 1);
    row.push(chrono::Local::now().format("%m/%d/%y %H:%M:%S").to_string());
    row.extend_from_slice(values);
    row
}

/// Random 16-byte hex channel id.
fn new_channel_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
