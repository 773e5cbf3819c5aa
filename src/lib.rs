// SPDX-License-Identifier: MIT

//! Assignment form: volunteer texters request campaign assignments,
//! backed by a Google Sheet and authorized once via Google OAuth2.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use config::Config;
use services::{GoogleClient, SheetService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub google: GoogleClient,
    pub sheets: SheetService,
}
