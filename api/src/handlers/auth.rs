//! Authentication handlers: signup, login, token refresh, logout and `me`

use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use tracing::{debug, info, warn};
use user::{
    auth::{
        AuthContext, CookieTransport, Credentials, UserRegistration, ACCESS_COOKIE_NAME,
        REFRESH_COOKIE_NAME,
    },
    UserError,
};

use crate::{
    error::{ApiError, ApiResult},
    models::{
        AccessTokenResponse, LoginRequest, MessageResponse, RefreshAccessRequest, RefreshRequest,
        SignupRequest, SignupResponse, TokenPairResponse, UserProfileResponse, UserResponse,
    },
    AppState,
};

/// Register a new user
/// POST /auth/signup
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User created", body = SignupResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ApiErrorResponse),
        (status = 417, description = "Email or username already taken", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    let user = state
        .user_manager
        .register(UserRegistration {
            email: req.email,
            username: req.username,
            password: req.password,
        })
        .await?;

    info!("Signup completed for user {}", user.id);

    Ok(Json(SignupResponse {
        message: "user created".to_string(),
        user: UserProfileResponse::from(user),
    }))
}

/// Log in with email and password
/// POST /auth/login
///
/// Sets both token cookies. The body carries only the user's id and name.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, token cookies set", body = UserResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<UserResponse>)> {
    let credentials = Credentials::new(req.email, req.password);

    let (principal, pair) = state
        .user_manager
        .login(&credentials)
        .await
        .map_err(|e| {
            if matches!(e, UserError::InvalidCredentials) {
                warn!("Failed login attempt");
            }
            ApiError::from(e)
        })?;

    let mut headers = HeaderMap::new();
    CookieTransport::write_token(&mut headers, ACCESS_COOKIE_NAME, &pair.access)?;
    CookieTransport::write_token(&mut headers, REFRESH_COOKIE_NAME, &pair.refresh)?;

    Ok((
        headers,
        Json(UserResponse {
            id: principal.id(),
            username: principal.display_name().to_string(),
        }),
    ))
}

/// Rotate the full token pair
/// POST /auth/login/refresh
///
/// Takes `refreshToken` from the body, or the `refresh_token` cookie when the
/// body has none.
#[utoipa::path(
    post,
    path = "/auth/login/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued and set as cookies", body = TokenPairResponse),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(HeaderMap, Json<TokenPairResponse>)> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let refresh_token = body
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| CookieTransport::read(&request_headers, REFRESH_COOKIE_NAME))
        .ok_or(ApiError::InvalidRefreshToken)?;

    let pair = state.user_manager.issuer().rotate(&refresh_token)?;

    let mut headers = HeaderMap::new();
    CookieTransport::write_token(&mut headers, ACCESS_COOKIE_NAME, &pair.access)?;
    CookieTransport::write_token(&mut headers, REFRESH_COOKIE_NAME, &pair.refresh)?;

    debug!("Token pair rotated through refresh endpoint");

    Ok((
        headers,
        Json(TokenPairResponse {
            access_token: pair.access.value,
            refresh_token: pair.refresh.value,
        }),
    ))
}

/// Renew only the access token
/// POST /auth/login/refresh-access
///
/// Both tokens must belong to the same subject. The access token may have
/// expired but must still carry a valid signature.
#[utoipa::path(
    post,
    path = "/auth/login/refresh-access",
    request_body = RefreshAccessRequest,
    responses(
        (status = 200, description = "New access token issued and set as cookie", body = AccessTokenResponse),
        (status = 401, description = "Cannot refresh token", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_access(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Option<Json<RefreshAccessRequest>>,
) -> ApiResult<(HeaderMap, Json<AccessTokenResponse>)> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .or_else(|| CookieTransport::read(&request_headers, ACCESS_COOKIE_NAME))
        .ok_or(ApiError::CannotRefresh)?;
    let refresh_token = body
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| CookieTransport::read(&request_headers, REFRESH_COOKIE_NAME))
        .ok_or(ApiError::CannotRefresh)?;

    let access = state
        .user_manager
        .issuer()
        .refresh_access(&access_token, &refresh_token)?;

    let mut headers = HeaderMap::new();
    CookieTransport::write_token(&mut headers, ACCESS_COOKIE_NAME, &access)?;

    Ok((
        headers,
        Json(AccessTokenResponse {
            access_token: access.value,
        }),
    ))
}

/// Logout endpoint
/// POST /auth/logout
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Token cookies cleared", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(auth: AuthContext) -> ApiResult<(HeaderMap, Json<MessageResponse>)> {
    let mut headers = HeaderMap::new();
    CookieTransport::clear(&mut headers, ACCESS_COOKIE_NAME)?;
    CookieTransport::clear(&mut headers, REFRESH_COOKIE_NAME)?;

    info!("{} logged out", auth.principal);

    Ok((
        headers,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Get current user info
/// GET /auth/me
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(auth: AuthContext) -> Json<UserResponse> {
    Json(UserResponse {
        id: auth.principal.id(),
        username: auth.principal.display_name().to_string(),
    })
}
