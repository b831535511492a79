mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{decimal_field, response_json, ConfigSeed, TestApp};
use repricer_api::entities::{AutomationState, PriceAction};

#[tokio::test]
async fn disabling_automation_restores_the_remembered_base_price() {
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

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(body["data"]["count"], json!(1));
    let snapshots = body["data"]["snapshots"].as_array().unwrap();
    assert_eq!(decimal_field(&snapshots[0]["price_before"]), dec!(70));
    assert_eq!(decimal_field(&snapshots[0]["display_price"]), dec!(50));

    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(50)]);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));

    let config = app.config_for(item.id).await;
    assert!(!config.auto_pricing_enabled);
    assert_eq!(config.current_state, AutomationState::Increasing);
    assert!(config.next_eligible_change_at.is_none());
    assert!(config.revert_wait_until.is_none());
    // The remembered prices survive the disable.
    assert_eq!(config.pre_automation_price, Some(dec!(50)));
    assert_eq!(config.last_automation_price, Some(dec!(70)));

    let changes = app.price_changes(item.id).await;
    let restore = changes.last().unwrap();
    assert_eq!(restore.action, PriceAction::Revert);
    assert_eq!(restore.old_price, dec!(70));
    assert_eq!(restore.new_price, dec!(50));
    assert!(restore.reason.contains("disabled"));
}

#[tokio::test]
async fn disabling_needs_an_enabled_config() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let unconfigured = app.seed_item(store.id, "ext-1", dec!(100)).await;
    let switched_off = app.seed_item(store.id, "ext-2", dec!(100)).await;
    app.seed_config(
        switched_off.id,
        ConfigSeed::disabled_with_prices(dec!(90), None),
    )
    .await;

    for item_id in [unconfigured.id, switched_off.id] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/items/{}/pricing/disable", item_id),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn first_ever_enable_creates_a_default_config() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(80)).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(body["data"]["count"], json!(1));

    let config = app.config_for(item.id).await;
    assert!(config.auto_pricing_enabled);
    assert!(config.is_first_increase);
    assert_eq!(config.increment_percentage, dec!(5));
    assert_eq!(config.period_hours, 24);
    assert_eq!(config.pre_automation_price, Some(dec!(80)));
    // Eligible immediately; the next sweep takes the first step.
    assert!(config.next_eligible_change_at.expect("eligible") <= Utc::now());

    // Enabling never touches the price by itself.
    assert!(app.storefront.pushes().is_empty());
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(80));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], json!(true));
    assert_eq!(body["data"]["tag"], json!("individual-on"));
}

#[tokio::test]
async fn enabling_an_already_enabled_item_is_invalid() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(100)).await;
    app.seed_config(item.id, ConfigSeed::default()).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn re_enable_with_agreeing_prices_needs_no_strategy() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(80)).await;
    app.seed_config(
        item.id,
        ConfigSeed::disabled_with_prices(dec!(65), Some(dec!(65))),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));

    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(65)]);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(65));

    let config = app.config_for(item.id).await;
    assert!(config.auto_pricing_enabled);
    assert!(config.is_first_increase);
    assert_eq!(config.current_state, AutomationState::Increasing);

    let changes = app.price_changes(item.id).await;
    assert!(changes.last().unwrap().reason.contains("agreed"));
}

#[tokio::test]
async fn re_enable_with_differing_prices_requires_a_choice() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(80)).await;
    app.seed_config(
        item.id,
        ConfigSeed::disabled_with_prices(dec!(50), Some(dec!(65))),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("choice_required"));
    let choices = body["data"]["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0]["item_id"], json!(item.id));
    assert_eq!(decimal_field(&choices[0]["base_price"]), dec!(50));
    assert_eq!(decimal_field(&choices[0]["last_price"]), dec!(65));

    // Asking for a choice changes nothing.
    assert!(app.storefront.pushes().is_empty());
    assert!(!app.config_for(item.id).await.auto_pricing_enabled);
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(80));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], json!(false));
}

#[tokio::test]
async fn base_strategy_resumes_from_the_base_price() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(80)).await;
    app.seed_config(
        item.id,
        ConfigSeed::disabled_with_prices(dec!(50), Some(dec!(65))),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            Some(json!({ "resume_strategy": "base" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(50));
    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(50)]);
}

#[tokio::test]
async fn last_strategy_resumes_from_the_last_automated_price() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(80)).await;
    app.seed_config(
        item.id,
        ConfigSeed::disabled_with_prices(dec!(50), Some(dec!(65))),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/pricing/enable", item.id),
            Some(json!({ "resume_strategy": "last" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.item_by_id(item.id).await.current_price, dec!(65));
    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(65)]);

    let changes = app.price_changes(item.id).await;
    let resume = changes.last().unwrap();
    assert_eq!(resume.action, PriceAction::Increase);
    assert!(resume.reason.contains("last automated price"));
}

#[tokio::test]
async fn store_wide_disable_restores_every_enabled_item() {
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
    let third = app.seed_item(store.id, "ext-3", dec!(20)).await;
    app.seed_config(third.id, ConfigSeed::disabled_with_prices(dec!(20), None))
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/disable", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(body["data"]["count"], json!(2));
    assert_eq!(body["data"]["snapshots"].as_array().unwrap().len(), 2);

    assert_eq!(app.item_by_id(first.id).await.current_price, dec!(40));
    assert_eq!(app.item_by_id(second.id).await.current_price, dec!(55));
    assert_eq!(app.item_by_id(third.id).await.current_price, dec!(20));
    assert!(!app.config_for(first.id).await.auto_pricing_enabled);
    assert!(!app.config_for(second.id).await.auto_pricing_enabled);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], json!(true));
    assert_eq!(body["data"]["tag"], json!("global-off"));
    assert_eq!(body["data"]["items"], json!(2));
}

#[tokio::test]
async fn store_wide_disable_with_nothing_enabled_applies_zero() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let item = app.seed_item(store.id, "ext-1", dec!(20)).await;
    app.seed_config(item.id, ConfigSeed::disabled_with_prices(dec!(20), None))
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/disable", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(body["data"]["count"], json!(0));

    // Nothing to undo after a no-op.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/{}/pricing/undo", store.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], json!(false));
}

#[tokio::test]
async fn store_wide_enable_surfaces_ambiguities_before_writing_anything() {
    let app = TestApp::new().await;
    let store = app.seed_store(true).await;
    let ambiguous = app.seed_item(store.id, "ext-1", dec!(80)).await;
    app.seed_config(
        ambiguous.id,
        ConfigSeed::disabled_with_prices(dec!(50), Some(dec!(65))),
    )
    .await;
    let plain = app.seed_item(store.id, "ext-2", dec!(30)).await;
    app.seed_config(plain.id, ConfigSeed::disabled_with_prices(dec!(30), None))
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/enable", store.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("choice_required"));
    let choices = body["data"]["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0]["item_id"], json!(ambiguous.id));

    // The unambiguous item was not enabled either; the toggle is all or
    // nothing until the caller answers.
    assert!(!app.config_for(plain.id).await.auto_pricing_enabled);
    assert!(app.storefront.pushes().is_empty());

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/pricing/enable", store.id),
            Some(json!({ "resume_strategy": "last" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["outcome"], json!("applied"));
    assert_eq!(body["data"]["count"], json!(2));

    assert_eq!(app.item_by_id(ambiguous.id).await.current_price, dec!(65));
    assert!(app.config_for(ambiguous.id).await.auto_pricing_enabled);
    assert!(app.config_for(plain.id).await.auto_pricing_enabled);
    // Only the resumed item needed a storefront push.
    assert_eq!(app.storefront.pushes_for("ext-1"), vec![dec!(65)]);
    assert!(app.storefront.pushes_for("ext-2").is_empty());
}
