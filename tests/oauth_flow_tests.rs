// SPDX-License-Identifier: MIT

//! End-to-end authorization flow against the mock Google endpoints:
//! /activate redirect, /oauth2callback validation, and form availability
//! after a completed flow.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

const ALL_RANGES: [&str; 5] = [
    "TexterList",
    "CampaignList",
    "ActiveRange",
    "AvailableTexts",
    "Responses",
];

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Run GET /activate and pull the signed state parameter out of the
/// redirect. The authorization URL puts state last and base64url needs no
/// percent-encoding.
async fn activate_state(app: &common::TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/activate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = location(&response);
    assert!(location.contains("access_type=offline"));
    let (_, state) = location
        .split_once("state=")
        .expect("state parameter in authorization URL");
    state.to_string()
}

#[tokio::test]
async fn test_activate_redirects_to_authorization_url() {
    let mock = common::mock_google::spawn(&ALL_RANGES, &["500"]).await;
    let app = common::create_test_app_with(mock.client());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/activate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = location(&response);
    assert!(location.starts_with(&format!("{}/auth?", mock.base_url)));
    assert!(location.contains("redirect_uri="));
    assert!(location.contains("prompt=consent"));
}

#[tokio::test]
async fn test_full_flow_activates_the_form() {
    let mock = common::mock_google::spawn(&ALL_RANGES, &["500", "300"]).await;
    let app = common::create_test_app_with(mock.client());

    let state = activate_state(&app).await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth2callback?state={}&code=test_code", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");

    // The activation marker was written to the responses log
    let appended = mock.appended();
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0][2], "activating");
    assert!(appended[0][4].ends_with("/activate"));

    // The form is live now
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Ada"));
    assert!(body.contains("Alpha"));

    // And the first read registered a watch channel
    assert_eq!(mock.channels().len(), 1);
}

#[tokio::test]
async fn test_callback_with_missing_named_range_is_424() {
    // No Responses range on the spreadsheet
    let mock = common::mock_google::spawn(
        &["TexterList", "CampaignList", "ActiveRange", "AvailableTexts"],
        &["500"],
    )
    .await;
    let app = common::create_test_app_with(mock.client());

    let state = activate_state(&app).await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth2callback?state={}&code=test_code", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
    let body = body_string(response).await;
    assert!(body.contains("Responses"));

    // Nothing was written and nothing was cached
    assert!(mock.appended().is_empty());
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_callback_with_forged_state_is_400() {
    let mock = common::mock_google::spawn(&ALL_RANGES, &["500"]).await;
    let app = common::create_test_app_with(mock.client());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/oauth2callback?state=Zm9yZ2Vk&code=test_code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mock.appended().is_empty());
}

#[tokio::test]
async fn test_callback_with_provider_error_is_400() {
    let mock = common::mock_google::spawn(&ALL_RANGES, &["500"]).await;
    let app = common::create_test_app_with(mock.client());

    let state = activate_state(&app).await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth2callback?state={}&error=access_denied", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("access_denied"));
}
