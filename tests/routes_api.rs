#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use dialect_base::models::Subscription;
use dialect_base::repo::UserRepo;
use dialect_base::{config, SecurityHeaders};
use serde_json::{json, Value};

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(SecurityHeaders::default())
                .app_data(web::Data::new($state))
                .configure(config),
        )
        .await
    };
}

fn asha() -> Value {
    json!({"name": "Asha", "age": 29, "email": "asha@example.com", "password": "kolam-2024"})
}

#[actix_web::test]
async fn register_then_login_flow() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["status"], "success");
    assert!(v["token"].as_str().is_some_and(|t| !t.is_empty()));
    let user = &v["data"]["user"];
    assert_eq!(user["email"], "asha@example.com");
    assert_eq!(user["subscription"], "free");
    assert_eq!(user["searchesThisWeek"], 0);
    assert!(user.get("passwordHash").is_none() && user.get("password_hash").is_none());

    // mixed-case email resolves to the same account
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": " Asha@Example.com", "password": "kolam-2024"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["data"]["user"]["name"], "Asha");
}

#[actix_web::test]
async fn duplicate_email_and_missing_fields_are_rejected() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v, json!({"status": "error", "message": "Email already exists"}));

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"name": "Ravi", "email": "ravi@example.com", "password": "pw"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post().uri("/api/auth/login").set_json(json!({"email": "asha@example.com"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["message"], "Please provide email and password");
}

#[actix_web::test]
async fn login_failures_are_indistinguishable() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "asha@example.com", "password": "wrong"}))
        .to_request();
    let wrong_pw = test::call_service(&app, req).await;
    assert_eq!(wrong_pw.status(), 401);
    let wrong_pw = test::read_body(wrong_pw).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "nobody@example.com", "password": "wrong"}))
        .to_request();
    let unknown = test::call_service(&app, req).await;
    assert_eq!(unknown.status(), 401);
    let unknown = test::read_body(unknown).await;

    assert_eq!(wrong_pw, unknown);
}

#[actix_web::test]
async fn malformed_body_gets_json_error() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["status"], "error");
}

#[actix_web::test]
async fn languages_are_listed_in_order() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::get().uri("/api/languages").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(
        v["data"],
        json!(["tamil", "telugu", "hindi", "tulu", "kannada", "malayalam", "bengali"])
    );
}

#[actix_web::test]
async fn anonymous_search_has_no_quota() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    for _ in 0..12 {
        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(json!({"word": "vanakkam", "language": "Tamil"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let v: Value = test::read_body_json(resp).await;
        assert_eq!(v["data"]["meaning"], "Hello/Welcome");
        assert_eq!(v["data"]["source"], "local-fallback");
        assert_eq!(v["data"]["language"], "tamil");
        assert!(v["data"]["searchesLeft"].is_null());
    }
}

#[actix_web::test]
async fn search_validation_and_misses() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/search").set_json(json!({"word": "  ", "language": "tamil"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["message"], "Word and language are required");

    let req = test::TestRequest::post().uri("/api/search").set_json(json!({"word": "bonjour", "language": "french"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let v: Value = test::read_body_json(resp).await;
    assert!(v["message"].as_str().unwrap().contains("tamil, telugu, hindi"));

    let req = test::TestRequest::post().uri("/api/search").set_json(json!({"word": "zzzq", "language": "kannada"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let v: Value = test::read_body_json(resp).await;
    assert!(v["message"].as_str().unwrap().contains("\"zzzq\""));
}

#[actix_web::test]
async fn free_user_gets_ten_searches_per_week() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    let v: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let token = v["token"].as_str().unwrap().to_owned();

    for expected_left in (0..10).rev() {
        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(json!({"word": "nandri", "language": "tamil", "token": token}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let v: Value = test::read_body_json(resp).await;
        assert_eq!(v["data"]["searchesLeft"], expected_left);
    }

    // header token counts the same as a body token
    let req = test::TestRequest::post()
        .uri("/api/search")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({"word": "nandri", "language": "tamil"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["message"], "Free search limit reached. Upgrade to premium.");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["data"]["user"]["searchesThisWeek"], 10);
    assert_eq!(v["data"]["searchesLeft"], 0);
}

#[actix_web::test]
async fn premium_user_is_unlimited() {
    let (state, repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::post().uri("/api/auth/register").set_json(asha()).to_request();
    let v: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let token = v["token"].as_str().unwrap().to_owned();
    let id = v["data"]["user"]["id"].as_i64().unwrap();
    repo.set_subscription(id, Subscription::Premium).await.unwrap();

    for _ in 0..15 {
        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(json!({"word": "namaste", "language": "hindi", "token": token}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let v: Value = test::read_body_json(resp).await;
        assert_eq!(v["data"]["searchesLeft"], "unlimited");
    }
    let user = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.searches_this_week, 0);
}

#[actix_web::test]
async fn bad_tokens_are_unauthorized() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/search")
        .set_json(json!({"word": "vanakkam", "language": "tamil", "token": "not-a-jwt"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["message"], "Invalid token");

    let expired = common::issuer().issue_at(1, chrono::Utc::now() - chrono::Duration::days(120)).unwrap();
    let req = test::TestRequest::post()
        .uri("/api/search")
        .set_json(json!({"word": "vanakkam", "language": "tamil", "token": expired}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // well-signed token for an account that does not exist
    let ghost = common::issuer().issue(9999).unwrap();
    let req = test::TestRequest::post()
        .uri("/api/search")
        .set_json(json!({"word": "vanakkam", "language": "tamil", "token": ghost}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["message"], "User not found");

    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn self_test_reports_local_table() {
    let (state, _repo) = common::offline_state();
    let app = app!(state);
    let req = test::TestRequest::get().uri("/api/test").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["knowledgeBaseTest"]["meaning"], "Hello/Welcome");
    assert_eq!(v["supportedLanguages"].as_array().unwrap().len(), 7);
}
