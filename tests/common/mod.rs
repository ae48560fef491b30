#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    body::{self, MessageBody},
    dev::ServiceResponse,
    http::{header, StatusCode},
    test, web,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use taskdesk::auth::{GoogleVerifier, PasswordAuthenticator, StaticJwks, TokenPair, TokenService};
use taskdesk::store::Storage;
use taskdesk::AppState;

pub const GOOGLE_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
const GOOGLE_KEY: &str = include_str!("../fixtures/google_test_key.pem");
const GOOGLE_JWKS: &str = include_str!("../fixtures/google_test_jwks.json");

/// Builds the full application around `$state`, wired the same way as `main`.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .wrap(
                    actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .wrap(actix_web::middleware::Logger::default())
                .service(taskdesk::routes::health::health)
                .service(
                    actix_web::web::scope("/api")
                        .wrap(taskdesk::auth::AuthMiddleware)
                        .configure(taskdesk::routes::config),
                ),
        )
        .await
    };
}

pub fn google_verifier(enabled: bool, client_id: Option<&str>) -> GoogleVerifier {
    let keys = StaticJwks::from_json(GOOGLE_JWKS).expect("test JWKS parses");
    GoogleVerifier::new(enabled, client_id.map(str::to_string), Arc::new(keys))
}

pub fn state_with(google: GoogleVerifier) -> web::Data<AppState> {
    web::Data::new(AppState {
        storage: Storage::memory(),
        tokens: TokenService::new(
            b"integration-test-secret",
            Duration::from_secs(300),
            Duration::from_secs(86_400),
        ),
        passwords: PasswordAuthenticator::new(4),
        google,
        page_size: 10,
    })
}

pub fn state() -> web::Data<AppState> {
    state_with(google_verifier(true, Some(GOOGLE_CLIENT_ID)))
}

/// Signs Google-style ID-token claims with the fixture key.
pub fn google_id_token(email: &str, email_verified: Value, extra: Value) -> String {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "iss": "accounts.google.com",
        "aud": GOOGLE_CLIENT_ID,
        "sub": format!("google-{}", email),
        "iat": now,
        "exp": now + 3600,
        "email": email,
        "email_verified": email_verified,
    });
    if let (Some(claims), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            claims.insert(key.clone(), value.clone());
        }
    }

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());
    let key = EncodingKey::from_rsa_pem(GOOGLE_KEY.as_bytes()).expect("fixture key parses");
    encode(&header, &claims, &key).expect("token signs")
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Sends `req` and returns the status and JSON body (`Null` when empty), including
/// requests the auth middleware rejects before they reach a handler.
pub async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: MessageBody,
{
    let (status, bytes) = match test::try_call_service(app, req).await {
        Ok(resp) => (resp.status(), test::read_body(resp).await),
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = body::to_bytes(resp.into_body()).await.unwrap_or_default();
            (status, bytes)
        }
    };
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, json)
}

pub async fn register<S, B>(app: &S, username: &str, password: &str)
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password,
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

pub async fn login<S, B>(app: &S, username: &str, password: &str) -> TokenPair
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/token/")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    test::read_body_json(resp).await
}

/// Registers `username` and returns its access token.
pub async fn signed_up<S, B>(app: &S, username: &str) -> String
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: MessageBody,
{
    register(app, username, "password123").await;
    login(app, username, "password123").await.access
}
