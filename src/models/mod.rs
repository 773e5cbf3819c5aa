// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod campaign;
pub mod credential;

pub use credential::{CachedSheet, Credential};
