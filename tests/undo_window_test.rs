mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::json;

use common::{response_json, ConfigSeed, TestApp};
use repricer_api::entities::AutomationState;

#[tokio::test]
async fn undo_restores_the_exact_pre_toggle_state() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(60)).await;
    app.set_item_price(item.id, dec!(70)).await;
    let next_eligible = Utc::now() + Duration::hours(6);
    app.seed_config(
        item.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(50)),
            last_automation_price: Some(dec!(70)),
            is_first_increase: false,
            next_eligible_change_at: Some(next_eligible),
            ..ConfigSeed::default()
        },
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/disable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));

    // The window is open and counting down.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], json!(true));
    let remaining = body["data"]["seconds_remaining"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 600);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["tag"], json!("individual-off"));
    assert_eq!(body["data"]["restored"], json!(1));
    assert!(body["data"]["warnings"].as_array().unwrap().is_empty());

    // Price and config are exactly as they were before the disable.
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(70));
    let config = app.config_for(item.id).await;
    assert!(config.auto_pricing_enabled);
    assert_eq!(config.current_state, AutomationState::Increasing);
    let restored_eligible = config.next_eligible_change_at.expect("window restored");
    assert!((restored_eligible - next_eligible).num_seconds().abs() <= 1);

    // The storefront saw the restore push after the disable push.
    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(50), dec!(70)]);

    // The undo state is consumed; a second attempt finds nothing.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undo_window_expires_after_ten_minutes() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(60)).await;
    app.set_item_price(item.id, dec!(70)).await;
    app.seed_config(
        item.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(50)),
            is_first_increase: false,
            ..ConfigSeed::default()
        },
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/disable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Age the registered state past the window.
    let ledger = &app.state.services.undo_ledger;
    let mut state = ledger
        .take_fresh(store.id, Utc::now())
        .expect("toggle registered an undo state");
    state.created_at = Utc::now() - Duration::minutes(11);
    ledger.register(store.id, state);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::GONE);

    // The expired undo changed nothing.
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));
    assert!(!app.config_for(item.id).await.auto_pricing_enabled);

    // The expired state was discarded on the way out.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undo_with_nothing_registered_is_not_found() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn a_newer_toggle_replaces_the_undo_state() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(60)).await;
    app.set_item_price(item.id, dec!(70)).await;
    app.seed_config(
        item.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(50)),
            last_automation_price: Some(dec!(70)),
            is_first_increase: false,
            ..ConfigSeed::default()
        },
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/disable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            Some(json!({ "resume_strategy": "last" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(70));

    // Undo reverses only the enable, the most recent toggle.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["tag"], json!("individual-on"));

    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));
    assert!(!app.config_for(item.id).await.auto_pricing_enabled);
}

#[tokio::test]
async fn undo_reports_push_failures_but_still_restores_locally() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(60)).await;
    app.set_item_price(item.id, dec!(70)).await;
    app.seed_config(
        item.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(50)),
            is_first_increase: false,
            ..ConfigSeed::default()
        },
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/disable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.storefront.reject("ext-1");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["restored"], json!(1));
    let warnings = body["data"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("push failed"));

    // Local state is back even though the storefront refused the push.
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(70));
    assert!(app.config_for(item.id).await.auto_pricing_enabled);
}

#[tokio::test]
async fn store_wide_undo_restores_every_item_from_the_snapshot() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let first = app.seed_item(store.id, "ext-1", dec!(44)).await;
    app.set_item_price(first.id, dec!(48)).await;
    app.seed_config(
        first.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(40)),
            is_first_increase: false,
            ..ConfigSeed::default()
        },
    )
    .await;
    let second = app.seed_item(store.id, "ext-2", dec!(55)).await;
    app.set_item_price(second.id, dec!(60)).await;
    app.seed_config(
        second.id,
        ConfigSeed {
            pre_automation_price: Some(dec!(55)),
            is_first_increase: false,
            ..ConfigSeed::default()
        },
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/disable", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.item_by_id(first.id).await.current_price, dec!(40));
    assert_eq!(app.item_by_id(second.id).await.current_price, dec!(55));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["tag"], json!("global-off"));
    assert_eq!(body["data"]["restored"], json!(2));

    assert_eq!(app.item_by_id(first.id).await.current_price, dec!(48));
    assert_eq!(app.item_by_id(second.id).await.current_price, dec!(60));
    assert!(app.config_for(first.id).await.auto_pricing_enabled);
    assert!(app.config_for(second.id).await.auto_pricing_enabled);
}
