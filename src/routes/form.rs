// SPDX-License-Identifier: MIT

//! The assignment request form: render on GET, validate and append on POST.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

/// Number-of-texts bounds; the per-campaign quota lowers both.
const MIN_TEXTS: i64 = 300;
const MAX_TEXTS: i64 = 1000;

const CHECK1_LABEL: &str =
    "I have joined the ThruText account for the assignment that I am requesting";
const CHECK2_LABEL: &str = "I will not \"ghost!\" I will check ThruText for replies \
     AT LEAST twice a day through November 5 and AT LEAST four times on November 6!";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(show_form).post(submit))
}

#[derive(Deserialize)]
pub struct ViewParams {
    #[serde(default)]
    format: Option<String>,
}

/// Texters and open campaigns, as JSON.
#[derive(Serialize)]
pub struct FormDataResponse {
    pub texters: Vec<String>,
    /// Campaign name → remaining quota, open campaigns only.
    pub campaigns: BTreeMap<String, i64>,
}

/// Render the form (or the underlying data as JSON with `?format=json`).
async fn show_form(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Response> {
    let (texters, campaigns) = state.sheets.form_data().await?;
    let open = open_campaigns(&campaigns);

    if params.format.as_deref() == Some("json") {
        return Ok(Json(FormDataResponse {
            texters,
            campaigns: open,
        })
        .into_response());
    }

    Ok(Html(render_form(&texters, &open, &Submission::default(), &FieldErrors::default()))
        .into_response())
}

/// Raw form submission. Checkboxes are absent when unchecked, and the
/// number arrives as text; validation handles both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub texter: String,
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub check1: Option<String>,
    #[serde(default)]
    pub check2: Option<String>,
}

/// Per-field validation errors, re-rendered inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    pub texter: Option<String>,
    pub campaign: Option<String>,
    pub number: Option<String>,
    pub check1: Option<String>,
    pub check2: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.texter.is_none()
            && self.campaign.is_none()
            && self.number.is_none()
            && self.check1.is_none()
            && self.check2.is_none()
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub texter: String,
    pub campaign: String,
    pub number: i64,
}

/// Validate a submission against the current roster and open campaigns.
pub fn validate(
    submission: &Submission,
    texters: &[String],
    campaigns: &BTreeMap<String, i64>,
) -> std::result::Result<ValidSubmission, FieldErrors> {
    let mut errors = FieldErrors::default();

    if !texters.iter().any(|t| t == &submission.texter) {
        errors.texter = Some("Pick your name from the texter list.".to_string());
    }

    let quota = match campaigns.get(&submission.campaign) {
        Some(&quota) if quota > 0 => Some(quota),
        _ => {
            errors.campaign = Some("This campaign is not open for assignment.".to_string());
            None
        }
    };

    match submission.number.trim().parse::<i64>() {
        Ok(number) => {
            if let Some(quota) = quota {
                let min = MIN_TEXTS.min(quota);
                let max = MAX_TEXTS.min(quota);
                if number < min || number > max {
                    errors.number =
                        Some(format!("Number must be between {} and {}.", min, max));
                }
            }
        }
        Err(_) => {
            errors.number = Some("Enter the number of texts requested.".to_string());
        }
    }

    if submission.check1.is_none() {
        errors.check1 = Some("This box is required.".to_string());
    }
    if submission.check2.is_none() {
        errors.check2 = Some("This box is required.".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidSubmission {
        texter: submission.texter.clone(),
        campaign: submission.campaign.clone(),
        number: submission.number.trim().parse().expect("checked above"),
    })
}

/// Handle a submission: re-render with inline errors on failure, append one
/// response row and confirm on success.
async fn submit(
    State(state): State<Arc<AppState>>,
    Form(submission): Form<Submission>,
) -> Result<Response> {
    let (texters, campaigns) = state.sheets.form_data().await?;
    let open = open_campaigns(&campaigns);

    match validate(&submission, &texters, &open) {
        Ok(valid) => {
            state
                .sheets
                .append_response(&[
                    valid.texter.clone(),
                    valid.campaign.clone(),
                    valid.number.to_string(),
                ])
                .await?;

            tracing::info!(
                texter = %valid.texter,
                campaign = %valid.campaign,
                number = valid.number,
                "Assignment request recorded"
            );

            Ok(Html(render_submitted(&valid)).into_response())
        }
        Err(errors) => Ok(Html(render_form(&texters, &open, &submission, &errors)).into_response()),
    }
}

fn open_campaigns(campaigns: &BTreeMap<String, i64>) -> BTreeMap<String, i64> {
    campaigns
        .iter()
        .filter(|(_, &quota)| quota > 0)
        .map(|(name, &quota)| (name.clone(), quota))
        .collect()
}

// ─── Rendering ───────────────────────────────────────────────────────────

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn error_span(error: &Option<String>) -> String {
    match error {
        Some(msg) => format!(" <span class=\"error\">{}</span>", html_escape(msg)),
        None => String::new(),
    }
}

fn render_form(
    texters: &[String],
    campaigns: &BTreeMap<String, i64>,
    values: &Submission,
    errors: &FieldErrors,
) -> String {
    let texter_options: String = texters
        .iter()
        .map(|texter| {
            let selected = if *texter == values.texter { " selected" } else { "" };
            format!(
                "<option value=\"{0}\"{1}>{0}</option>",
                html_escape(texter),
                selected
            )
        })
        .collect();

    let campaign_options: String = campaigns
        .iter()
        .map(|(name, quota)| {
            let selected = if *name == values.campaign { " selected" } else { "" };
            format!(
                "<option value=\"{0}\" data-count=\"{1}\"{2}>{0}</option>",
                html_escape(name),
                quota,
                selected
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Assignment Request</title>
<style>
body {{ font-family: sans-serif; max-width: 40em; margin: 2em auto; }}
label {{ display: block; margin-top: 1em; }}
.error {{ color: #b00; }}
</style>
</head>
<body>
<h1>Request a texting assignment</h1>
<form name="form" method="post" action="/">
<label>Texter name{texter_error}
<select name="texter">{texter_options}</select></label>
<label>Campaign requested{campaign_error}
<select name="campaign">{campaign_options}</select></label>
<label>Number of texts requested{number_error}
<input type="number" name="number" value="{number}"></label>
<label><input type="checkbox" name="check1"{check1_checked}> {check1_label}{check1_error}</label>
<label><input type="checkbox" name="check2"{check2_checked}> {check2_label}{check2_error}</label>
<p><button type="submit">Request assignment</button></p>
</form>
</body>
</html>
"#,
        texter_options = texter_options,
        texter_error = error_span(&errors.texter),
        campaign_options = campaign_options,
        campaign_error = error_span(&errors.campaign),
        number = html_escape(&values.number),
        number_error = error_span(&errors.number),
        check1_checked = if values.check1.is_some() { " checked" } else { "" },
        check1_label = html_escape(CHECK1_LABEL),
        check1_error = error_span(&errors.check1),
        check2_checked = if values.check2.is_some() { " checked" } else { "" },
        check2_label = html_escape(CHECK2_LABEL),
        check2_error = error_span(&errors.check2),
    )
}

fn render_submitted(valid: &ValidSubmission) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Submitted</title></head>
<body>
<h1>Submitted</h1>
<p>{} texts on {} requested for {}. Thank you!</p>
</body>
</html>
"#,
        valid.number,
        html_escape(&valid.campaign),
        html_escape(&valid.texter),
    )
}
