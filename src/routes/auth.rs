use crate::{
    auth::{
        AccessTokenResponse, AuthenticatedUser, GoogleLoginRequest, LoginRequest, RefreshRequest,
        RegisterRequest,
    },
    error::AppError,
    models::RegisteredUser,
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use validator::Validate;

/// Register a new user
///
/// Creates an identity with a password credential. No tokens are issued; the client logs
/// in through `/auth/token/` afterwards.
///
/// ## Responses:
/// - `201 Created`: `{id, username, email, first_name}`.
/// - `400 Bad Request`: If the input fails validation.
/// - `409 Conflict`: If the username is already taken.
#[post("/register/")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .passwords
        .register(state.storage.users.as_ref(), register_data.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(RegisteredUser::from(&user)))
}

/// Obtain a token pair
///
/// Exchanges a username and password for `{access, refresh}`. Every credential failure is
/// reported with the same `401` message.
#[post("/token/")]
pub async fn obtain_token(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let pair = state
        .passwords
        .authenticate(
            state.storage.users.as_ref(),
            &state.tokens,
            &login_data.username,
            &login_data.password,
        )
        .await?;

    Ok(HttpResponse::Ok().json(pair))
}

/// Refresh an access token
///
/// Redeems a refresh token for a new access token bound to the same identity.
#[post("/token/refresh/")]
pub async fn refresh_token(
    state: web::Data<AppState>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    let access = state.tokens.refresh(&refresh_data.refresh)?;
    Ok(HttpResponse::Ok().json(AccessTokenResponse { access }))
}

/// Sign in with Google
///
/// Verifies a Google ID token, creates the local identity on first sign-in and returns a
/// token pair with the identity's display view.
///
/// ## Responses:
/// - `200 OK`: `{access, refresh, user: {username, email, name}}`.
/// - `400 Bad Request`: If the token is missing, fails verification, or its email is not verified.
/// - `500 Internal Server Error`: If Google sign-in is disabled or not configured.
#[post("/google/")]
pub async fn google_login(
    state: web::Data<AppState>,
    login_data: web::Json<GoogleLoginRequest>,
) -> Result<impl Responder, AppError> {
    let response = state
        .google
        .verify_and_login(
            state.storage.users.as_ref(),
            &state.tokens,
            login_data.id_token.as_deref(),
        )
        .await
        .map_err(|err| match err {
            // A rejected ID token is a bad request here, not a failed bearer credential.
            AppError::Unauthorized(msg) => AppError::BadRequest(msg),
            other => other,
        })?;

    Ok(HttpResponse::Ok().json(response))
}

/// Current user
///
/// Returns `{username, email, name}` for the identity the access token is bound to.
#[get("/me/")]
pub async fn me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let stored = state
        .storage
        .users
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(HttpResponse::Ok().json(stored.profile()))
}
