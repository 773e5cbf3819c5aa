// SPDX-License-Identifier: MIT

//! Campaign model derived from spreadsheet columns.

use std::collections::BTreeMap;

/// Active-state cell value marking a campaign as open for assignment.
const ASSIGNING: &str = "Assigning";

/// Build the campaign→quota map by zipping the name, active-state, and
/// available-count columns. Only rows whose state cell is exactly
/// "Assigning" are kept; a count cell that does not parse drops the row.
///
/// Column order in the map is alphabetical (BTreeMap), which keeps the
/// rendered form stable across refreshes.
pub fn zip_campaigns(
    names: &[String],
    states: &[String],
    counts: &[String],
) -> BTreeMap<String, i64> {
    names
        .iter()
        .zip(states.iter())
        .zip(counts.iter())
        .filter(|((_, state), _)| state.as_str() == ASSIGNING)
        .filter_map(|((name, _), count)| {
            match count.trim().parse::<i64>() {
                Ok(n) => Some((name.clone(), n)),
                Err(_) => {
                    tracing::warn!(campaign = %name, count = %count, "Unparseable quota cell, skipping row");
                    None
                }
            }
        })
        .collect()
}
