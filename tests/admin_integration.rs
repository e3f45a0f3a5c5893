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

#[actix_web::test]
async fn init_creates_admin_only_once() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);

    let req = TestRequest::get().uri("/api/admin/check-init").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["initialized"], false);

    let req = TestRequest::post().uri("/api/admin/init").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let email = body["admin"]["email"].as_str().expect("email").to_string();
    let password = body["admin"]["password"]
        .as_str()
        .expect("password")
        .to_string();

    let req = TestRequest::get().uri("/api/admin/check-init").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["initialized"], true);

    // Second init is refused.
    let req = TestRequest::post().uri("/api/admin/init").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // The reported credential actually logs in as an admin.
    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["role"], "admin");
}

#[actix_web::test]
async fn stats_aggregate_inventory_and_revenue() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;
    let (_, user_token) = support::create_user(&test_db.pool, "buyer@example.com", Role::User).await;

    support::seed_card(&test_db.pool, "DORA-STAT-STAT-STAT-STA1", PlanType::Day).await;
    support::seed_card(&test_db.pool, "DORA-STAT-STAT-STAT-STA2", PlanType::Day).await;

    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(support::bearer(&user_token))
        .set_json(json!({ "planType": "day" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_id = body["order"]["id"].as_i64().expect("id");

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/pay"))
        .insert_header(support::bearer(&user_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get()
        .uri("/api/admin/stats")
        .insert_header(support::bearer(&admin_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["overview"]["totalUsers"], 2);
    assert_eq!(body["overview"]["totalOrders"], 1);
    assert_eq!(body["overview"]["totalCards"], 2);
    assert_eq!(body["overview"]["unusedCards"], 1);
    assert_eq!(body["overview"]["totalRevenue"], 120.0);
    assert_eq!(body["recentOrders"][0]["user"]["email"], "buyer@example.com");

    let cards_by_plan = body["cardsByPlan"].as_array().expect("cardsByPlan");
    assert!(cards_by_plan
        .iter()
        .any(|g| g["planType"] == "day" && g["status"] == "unused" && g["count"] == 1));
    assert!(cards_by_plan
        .iter()
        .any(|g| g["planType"] == "day" && g["status"] == "used" && g["count"] == 1));
}

#[actix_web::test]
async fn user_listing_searches_and_counts_orders() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (_, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;
    let (_, alice_token) =
        support::create_user(&test_db.pool, "alice@example.com", Role::User).await;
    support::create_user(&test_db.pool, "bob@example.com", Role::User).await;

    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(support::bearer(&alice_token))
        .set_json(json!({ "planType": "month" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = TestRequest::get()
        .uri("/api/admin/users")
        .insert_header(support::bearer(&admin_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 3);

    let req = TestRequest::get()
        .uri("/api/admin/users?search=alice")
        .insert_header(support::bearer(&admin_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["users"][0]["email"], "alice@example.com");
    assert_eq!(body["users"][0]["orderCount"], 1);
}

#[actix_web::test]
async fn role_updates_exclude_self() {
    let test_db = support::init_test_db().await;
    let state = support::build_state(test_db.pool.clone());
    let app = build_app!(state);
    let (admin_id, admin_token) =
        support::create_user(&test_db.pool, "admin@example.com", Role::Admin).await;
    let (user_id, _) = support::create_user(&test_db.pool, "user@example.com", Role::User).await;

    let req = TestRequest::put()
        .uri(&format!("/api/admin/users/{user_id}/role"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "role": "admin" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["role"], "admin");

    let req = TestRequest::put()
        .uri(&format!("/api/admin/users/{admin_id}/role"))
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "role": "user" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = TestRequest::put()
        .uri("/api/admin/users/999999/role")
        .insert_header(support::bearer(&admin_token))
        .set_json(json!({ "role": "user" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}
