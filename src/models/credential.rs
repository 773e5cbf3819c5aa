// SPDX-License-Identifier: MIT

//! OAuth credential and the versioned persisted form of the sheet handle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before token expiration when we treat it as expired (1 minute).
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Current on-disk format version for [`CachedSheet`].
pub const CACHED_SHEET_VERSION: u32 = 1;

/// Google OAuth access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    /// Absent if the user authorized without offline access.
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC).
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// True if the access token is expired or about to expire.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Persisted sheet handle: everything that survives a process restart.
///
/// Serialized as JSON with an explicit version field. An unknown version or
/// a sheet id that no longer matches the configured one is discarded rather
/// than migrated; the operator just re-authorizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSheet {
    pub version: u32,
    pub sheet_id: String,
    pub credential: Credential,
    /// Drive push notification channel id, if a watch is registered.
    pub channel: Option<String>,
    /// When the watch channel expires (UTC).
    pub channel_expires_at: Option<DateTime<Utc>>,
}

impl CachedSheet {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a persisted blob, rejecting unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let cached: CachedSheet = serde_json::from_slice(bytes).ok()?;
        if cached.version != CACHED_SHEET_VERSION {
            tracing::warn!(
                version = cached.version,
                "Discarding cached sheet with unknown format version"
            );
            return None;
        }
        Some(cached)
    }
}
