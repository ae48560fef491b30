#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{bearer, google_id_token, google_verifier, login, register, send, state, state_with};
use serde_json::{json, Value};

#[actix_rt::test]
async fn test_register_returns_identity_summary() {
    let state = state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123",
            "first_name": "Alice"
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["first_name"], "Alice");
    assert!(body["id"].is_number());
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[actix_rt::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let state = state();
    let app = test_app!(state);
    register(&app, "alice", "password123").await;

    let duplicate = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({ "username": "alice", "password": "another-password" }))
        .to_request();
    let (status, body) = send(&app, duplicate).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].is_string());

    let bad_username = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({ "username": "not allowed!", "password": "password123" }))
        .to_request();
    assert_eq!(send(&app, bad_username).await.0, StatusCode::BAD_REQUEST);

    let missing_password = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({ "username": "bob" }))
        .to_request();
    assert_eq!(send(&app, missing_password).await.0, StatusCode::BAD_REQUEST);

    // The original password still works.
    login(&app, "alice", "password123").await;
}

#[actix_rt::test]
async fn test_password_login_failures_share_one_message() {
    let state = state();
    let app = test_app!(state);
    register(&app, "alice", "password123").await;

    let wrong_password = test::TestRequest::post()
        .uri("/api/auth/token/")
        .set_json(json!({ "username": "alice", "password": "wrong" }))
        .to_request();
    let (status, wrong_password_body) = send(&app, wrong_password).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown_user = test::TestRequest::post()
        .uri("/api/auth/token/")
        .set_json(json!({ "username": "nobody", "password": "wrong" }))
        .to_request();
    let (status, unknown_user_body) = send(&app, unknown_user).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(wrong_password_body, unknown_user_body);
}

#[actix_rt::test]
async fn test_long_passwords_cannot_share_a_bcrypt_prefix() {
    let state = state();
    let app = test_app!(state);
    let prefix = "a".repeat(72);

    let too_long = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({ "username": "alice", "password": format!("{}REAL-SECRET-TAIL", prefix) }))
        .to_request();
    assert_eq!(send(&app, too_long).await.0, StatusCode::BAD_REQUEST);

    register(&app, "alice", &prefix).await;
    let impostor = test::TestRequest::post()
        .uri("/api/auth/token/")
        .set_json(json!({ "username": "alice", "password": format!("{}totally-different", prefix) }))
        .to_request();
    assert_eq!(send(&app, impostor).await.0, StatusCode::UNAUTHORIZED);

    login(&app, "alice", &prefix).await;
}

#[actix_rt::test]
async fn test_refresh_issues_new_access_token() {
    let state = state();
    let app = test_app!(state);
    register(&app, "alice", "password123").await;
    let pair = login(&app, "alice", "password123").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/token/refresh/")
        .set_json(json!({ "refresh": pair.refresh }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().expect("access token");

    let me = test::TestRequest::get()
        .uri("/api/auth/me/")
        .insert_header(bearer(access))
        .to_request();
    let (status, body) = send(&app, me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    // An access token cannot be redeemed as a refresh token.
    let misuse = test::TestRequest::post()
        .uri("/api/auth/token/refresh/")
        .set_json(json!({ "refresh": pair.access }))
        .to_request();
    assert_eq!(send(&app, misuse).await.0, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_me_requires_valid_access_token() {
    let state = state();
    let app = test_app!(state);
    register(&app, "alice", "password123").await;
    let pair = login(&app, "alice", "password123").await;

    let anonymous = test::TestRequest::get().uri("/api/auth/me/").to_request();
    let (status, body) = send(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let garbage = test::TestRequest::get()
        .uri("/api/auth/me/")
        .insert_header(bearer("not-a-token"))
        .to_request();
    assert_eq!(send(&app, garbage).await.0, StatusCode::UNAUTHORIZED);

    let refresh_as_access = test::TestRequest::get()
        .uri("/api/auth/me/")
        .insert_header(bearer(&pair.refresh))
        .to_request();
    assert_eq!(send(&app, refresh_as_access).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/auth/me/")
        .insert_header(bearer(&pair.access))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "username": "alice", "email": "alice@example.com", "name": null })
    );
}

#[actix_rt::test]
async fn test_google_login_creates_identity_once() {
    let state = state();
    let app = test_app!(state);

    let token = google_id_token(
        "grace@example.com",
        json!(true),
        json!({ "name": "Grace Hopper", "given_name": "Grace", "family_name": "Hopper" }),
    );
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["user"],
        json!({ "username": "grace@example.com", "email": "grace@example.com", "name": "Grace Hopper" })
    );
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());

    let created = state
        .storage
        .users
        .find_user_by_username("grace@example.com")
        .await
        .unwrap()
        .expect("identity created");
    assert!(!created.has_usable_password());
    assert_eq!(created.first_name, "Grace");
    assert_eq!(created.last_name, "Hopper");

    // Password login is impossible for a federated identity.
    let password_login = test::TestRequest::post()
        .uri("/api/auth/token/")
        .set_json(json!({ "username": "grace@example.com", "password": "anything" }))
        .to_request();
    assert_eq!(send(&app, password_login).await.0, StatusCode::UNAUTHORIZED);

    // A second login with different name claims reuses the identity unchanged.
    let token = google_id_token(
        "grace@example.com",
        json!("true"),
        json!({ "given_name": "Amazing", "family_name": "Grace" }),
    );
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Grace Hopper");

    let reused = state
        .storage
        .users
        .find_user_by_username("grace@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reused.id, created.id);
    assert_eq!(reused.first_name, "Grace");

    let me = test::TestRequest::get()
        .uri("/api/auth/me/")
        .insert_header(bearer(body["access"].as_str().unwrap()))
        .to_request();
    let (status, body) = send(&app, me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "grace@example.com");
}

#[actix_rt::test]
async fn test_google_login_reuses_password_account_with_same_email() {
    let state = state();
    let app = test_app!(state);
    register(&app, "grace@example.com", "password123").await;
    let registered = state
        .storage
        .users
        .find_user_by_username("grace@example.com")
        .await
        .unwrap()
        .unwrap();

    let token = google_id_token("grace@example.com", json!(true), json!({ "given_name": "Grace" }));
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], Value::Null);

    let reused = state
        .storage
        .users
        .find_user_by_username("grace@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reused.id, registered.id);
    assert_eq!(reused.first_name, "");
    login(&app, "grace@example.com", "password123").await;
}

#[actix_rt::test]
async fn test_google_login_falls_back_to_full_name() {
    let state = state();
    let app = test_app!(state);

    let token = google_id_token("ada@example.com", json!(true), json!({ "name": "Ada Lovelace" }));
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada Lovelace");

    let user = state
        .storage
        .users
        .find_user_by_username("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.first_name, "Ada Lovelace");
    assert_eq!(user.last_name, "");
}

#[actix_rt::test]
async fn test_google_login_rejects_unverified_email() {
    let state = state();
    let app = test_app!(state);

    let token = google_id_token("eve@example.com", json!(false), json!({}));
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Google account email not verified");

    assert!(state
        .storage
        .users
        .find_user_by_username("eve@example.com")
        .await
        .unwrap()
        .is_none());
}

#[actix_rt::test]
async fn test_google_login_error_statuses() {
    let state = state();
    let app = test_app!(state);

    let missing = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({}))
        .to_request();
    let (status, body) = send(&app, missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "id_token is required");

    let forged = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": "eyJhbGciOiJSUzI1NiJ9.e30.c2ln" }))
        .to_request();
    let (status, body) = send(&app, forged).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid Google token");

    let token = google_id_token("grace@example.com", json!(true), json!({}));

    let disabled_state = state_with(google_verifier(false, Some(common::GOOGLE_CLIENT_ID)));
    let disabled = test_app!(disabled_state);
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    assert_eq!(send(&disabled, req).await.0, StatusCode::INTERNAL_SERVER_ERROR);

    let unconfigured_state = state_with(google_verifier(true, None));
    let unconfigured = test_app!(unconfigured_state);
    let req = test::TestRequest::post()
        .uri("/api/auth/google/")
        .set_json(json!({ "id_token": token }))
        .to_request();
    let (status, body) = send(&unconfigured, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(body["detail"], Value::Null);
    assert!(unconfigured_state
        .storage
        .users
        .find_user_by_username("grace@example.com")
        .await
        .unwrap()
        .is_none());
}

#[actix_rt::test]
async fn test_health_is_public() {
    let state = state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
