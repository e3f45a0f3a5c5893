use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use dora_shop::api;
use dora_shop::models::{PlanType, Role};

mod support;

macro_rules! build_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(api::configure),
        )
        .await
    };
}

macro_rules! create_order {
    ($app:expr, $token:expr, $plan:expr) => {{
        let req = TestRequest::post()
            .uri("/api/orders")
            .insert_header(support::bearer($token))
            .set_json(json!({ "planType": $plan }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

#[actix_web::test]
async fn create_order_uses_configured_pricing() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;

    let body = create_order!(&app, &token, "day");
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["amount"], 120.0);
    assert_eq!(body["payment"]["currency"], "NT$");

    // Week has the zero-price "coming soon" sentinel.
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(support::bearer(&token))
        .set_json(json!({ "planType": "week" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // Unknown plan types are rejected at deserialization.
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(support::bearer(&token))
        .set_json(json!({ "planType": "decade" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn pay_binds_card_and_is_idempotent() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;

    support::seed_card(&test_db.pool, "DORA-AAAA-AAAA-AAAA-AAAA", PlanType::Day).await;

    let body = create_order!(&app, &token, "day");
    let order_id = body["order"]["id"].as_i64().expect("order id");

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/pay"))
        .insert_header(support::bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(body["order"]["paymentMethod"], "mock_payment");
    assert_eq!(body["card"]["cardKey"], "DORA-AAAA-AAAA-AAAA-AAAA");

    let (status, bound_order): (String, Option<i64>) =
        sqlx::query_as("SELECT status, order_id FROM cards WHERE card_key = ?")
            .bind("DORA-AAAA-AAAA-AAAA-AAAA")
            .fetch_one(&test_db.pool)
            .await
            .expect("card row");
    assert_eq!(status, "used");
    assert_eq!(bound_order, Some(order_id));

    // Second pay returns the same binding without allocating again.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/pay"))
        .insert_header(support::bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "order already paid");
    assert_eq!(body["card"]["cardKey"], "DORA-AAAA-AAAA-AAAA-AAAA");

    let used: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE status = 'used'")
        .fetch_one(&test_db.pool)
        .await
        .expect("used count");
    assert_eq!(used, 1);
}

#[actix_web::test]
async fn one_card_pays_exactly_one_of_two_orders() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;

    support::seed_card(&test_db.pool, "DORA-ONLY-ONLY-ONLY-ONLY", PlanType::Day).await;

    let first = create_order!(&app, &token, "day");
    let second = create_order!(&app, &token, "day");
    let first_id = first["order"]["id"].as_i64().expect("id");
    let second_id = second["order"]["id"].as_i64().expect("id");

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{first_id}/pay"))
        .insert_header(support::bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{second_id}/pay"))
        .insert_header(support::bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "NO_CARD_AVAILABLE");

    // The failed attempt must not have flipped the order.
    let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
        .bind(second_id)
        .fetch_one(&test_db.pool)
        .await
        .expect("order status");
    assert_eq!(status, "pending");

    let bound: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE order_id IS NOT NULL")
        .fetch_one(&test_db.pool)
        .await
        .expect("bound count");
    assert_eq!(bound, 1);
}

#[actix_web::test]
async fn pay_checks_ownership_and_state() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, owner_token) =
        support::create_user(&test_db.pool, "owner@example.com", Role::User).await;
    let (_, other_token) =
        support::create_user(&test_db.pool, "other@example.com", Role::User).await;
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;

    support::seed_card(&test_db.pool, "DORA-OWNS-OWNS-OWNS-OWNS", PlanType::Day).await;
    let body = create_order!(&app, &owner_token, "day");
    let order_id = body["order"]["id"].as_i64().expect("id");

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/pay"))
        .insert_header(support::bearer(&other_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    // Cancel it, then paying must conflict.
    let req = TestRequest::put()
        .uri(&format!("/api/orders/{order_id}"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/pay"))
        .insert_header(support::bearer(&owner_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );

    let req = TestRequest::post()
        .uri("/api/orders/999999/pay")
        .insert_header(support::bearer(&owner_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn admin_status_override_tolerates_empty_pool() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, user_token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;

    let body = create_order!(&app, &user_token, "month");
    let order_id = body["order"]["id"].as_i64().expect("id");

    // No month cards in inventory: the status still flips, with no card.
    let req = TestRequest::put()
        .uri(&format!("/api/orders/{order_id}"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "status": "paid" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["status"], "paid");
    assert!(body["assignedCard"].is_null());

    // Permissive by design: paid -> pending is allowed.
    let req = TestRequest::put()
        .uri(&format!("/api/orders/{order_id}"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "status": "pending" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["status"], "pending");

    // Non-admins cannot touch the endpoint.
    let req = TestRequest::put()
        .uri(&format!("/api/orders/{order_id}"))
        .insert_header(support::bearer(&user_token))
        .set_json(json!({ "status": "paid" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[actix_web::test]
async fn admin_status_override_allocates_when_possible() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, user_token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;

    support::seed_card(&test_db.pool, "DORA-LIFE-LIFE-LIFE-LIFE", PlanType::Lifetime).await;
    let body = create_order!(&app, &user_token, "lifetime");
    let order_id = body["order"]["id"].as_i64().expect("id");

    let req = TestRequest::put()
        .uri(&format!("/api/orders/{order_id}"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "status": "paid" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["assignedCard"]["cardKey"], "DORA-LIFE-LIFE-LIFE-LIFE");
    assert_eq!(body["assignedCard"]["status"], "used");
    assert_eq!(body["assignedCard"]["orderId"], order_id);
}

#[actix_web::test]
async fn order_listing_and_detail_respect_ownership() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, alice_token) =
        support::create_user(&test_db.pool, "alice@example.com", Role::User).await;
    let (_, bob_token) = support::create_user(&test_db.pool, "bob@example.com", Role::User).await;
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;

    let alice_order = create_order!(&app, &alice_token, "day");
    create_order!(&app, &bob_token, "month");
    let alice_order_id = alice_order["order"]["id"].as_i64().expect("id");

    let req = TestRequest::get()
        .uri("/api/orders")
        .insert_header(support::bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["orders"][0]["user"]["email"], "alice@example.com");

    let req = TestRequest::get()
        .uri("/api/orders")
        .insert_header(support::bearer(&admin_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 2);

    let req = TestRequest::get()
        .uri(&format!("/api/orders/{alice_order_id}"))
        .insert_header(support::bearer(&bob_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = TestRequest::get()
        .uri(&format!("/api/orders/{alice_order_id}"))
        .insert_header(support::bearer(&admin_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
