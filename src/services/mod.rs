// SPDX-License-Identifier: MIT

//! Services module - Google API access and the sheet handle lifecycle.

pub mod google;
pub mod sheet;

pub use google::GoogleClient;
pub use sheet::{SheetHandle, SheetService};
