//! Warp integration: request context extraction, guarded routes and the
//! login/logout/refresh/me endpoints

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::auth::context::RequestContext;
use crate::auth::driver::{Credentials, LoginOptions, Principal};
use crate::error::AuthFusionError;
use crate::facade::AuthFusion;
use crate::security::{with_api_security_headers, AuthTimer};

/// Minimum time a failed login takes
const FAILED_LOGIN_FLOOR: Duration = Duration::from_millis(100);

/// No principal could be resolved for the request
#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// A driver or manager failure surfaced by a route
#[derive(Debug)]
pub struct AuthRejection(pub AuthFusionError);

impl warp::reject::Reject for AuthRejection {}

fn reject(err: AuthFusionError) -> Rejection {
    warp::reject::custom(AuthRejection(err))
}

/// Selects a driver other than the default
#[derive(Debug, Default, Deserialize)]
pub struct DriverQuery {
    pub driver: Option<String>,
    /// Logout every token of the principal instead of the presented one
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub credentials: Credentials,
    #[serde(default)]
    pub options: LoginOptions,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    driver: &'static str,
    token: String,
    principal: Principal,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Helper to include the facade in a route
pub fn with_fusion(
    fusion: AuthFusion,
) -> impl Filter<Extract = (AuthFusion,), Error = Infallible> + Clone {
    warp::any().map(move || fusion.clone())
}

/// Builds a [`RequestContext`] from the request headers
pub fn with_request_context() -> impl Filter<Extract = (RequestContext,), Error = Infallible> + Clone
{
    warp::header::headers_cloned().map(|headers: HeaderMap| {
        RequestContext::from_headers(headers.iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        }))
    })
}

/// Rejects with [`Unauthorized`] unless the default driver resolves the bearer token
pub fn require_principal(
    fusion: AuthFusion,
) -> impl Filter<Extract = (RequestContext,), Error = Rejection> + Clone {
    with_request_context()
        .and(with_fusion(fusion))
        .and_then(|ctx: RequestContext, fusion: AuthFusion| async move {
            let principal = fusion.for_request(&ctx).user().await;
            match principal {
                Some(principal) => Ok(ctx.with_principal(principal)),
                None => Err(warp::reject::custom(Unauthorized)),
            }
        })
}

async fn handle_login(
    query: DriverQuery,
    request: LoginRequest,
    fusion: AuthFusion,
) -> Result<impl Reply, Rejection> {
    let timer = AuthTimer::new(FAILED_LOGIN_FLOOR);
    let driver = fusion.driver(query.driver.as_deref()).map_err(reject)?;

    match driver.login(&request.credentials, &request.options).await {
        Ok(result) => {
            log::info!("Login succeeded for {} via {}", result.principal.id, driver.name());
            let body = LoginResponse {
                driver: driver.name(),
                token: result.token,
                principal: result.principal,
            };
            Ok(with_api_security_headers(warp::reply::json(&body)))
        }
        Err(e) => {
            log::warn!("Login failed via {}: {}", driver.name(), e);
            timer.wait().await;
            Err(reject(e))
        }
    }
}

async fn handle_logout(
    query: DriverQuery,
    ctx: RequestContext,
    fusion: AuthFusion,
) -> Result<impl Reply, Rejection> {
    let driver = fusion.driver(query.driver.as_deref()).map_err(reject)?;

    let success = if query.all {
        driver.logout(None, &ctx).await
    } else {
        match ctx.bearer_token() {
            Some(token) => driver.logout(Some(&token), &ctx).await,
            None => false,
        }
    };

    Ok(with_api_security_headers(warp::reply::json(
        &serde_json::json!({ "success": success }),
    )))
}

async fn handle_refresh(
    query: DriverQuery,
    ctx: RequestContext,
    fusion: AuthFusion,
) -> Result<impl Reply, Rejection> {
    let driver = fusion.driver(query.driver.as_deref()).map_err(reject)?;
    let token = ctx
        .bearer_token()
        .ok_or_else(|| reject(AuthFusionError::InvalidToken("no bearer token".to_string())))?;

    let result = driver.refresh(&token).await.map_err(reject)?;
    Ok(with_api_security_headers(warp::reply::json(&result)))
}

async fn handle_me(
    query: DriverQuery,
    ctx: RequestContext,
    fusion: AuthFusion,
) -> Result<impl Reply, Rejection> {
    let driver = fusion.driver(query.driver.as_deref()).map_err(reject)?;
    let token = ctx
        .bearer_token()
        .ok_or_else(|| warp::reject::custom(Unauthorized))?;

    match driver.get_user(&token).await {
        Some(principal) => Ok(with_api_security_headers(warp::reply::json(&principal))),
        None => Err(warp::reject::custom(Unauthorized)),
    }
}

/// `/auth/*` routes plus `/health`
pub fn auth_routes(
    fusion: AuthFusion,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::query::<DriverQuery>())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_fusion(fusion.clone()))
        .and_then(handle_login);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::query::<DriverQuery>())
        .and(with_request_context())
        .and(with_fusion(fusion.clone()))
        .and_then(handle_logout);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(warp::query::<DriverQuery>())
        .and(with_request_context())
        .and(with_fusion(fusion.clone()))
        .and_then(handle_refresh);

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(warp::query::<DriverQuery>())
        .and(with_request_context())
        .and(with_fusion(fusion))
        .and_then(handle_me);

    let health = warp::path!("health").and(warp::get()).map(|| "OK");

    login.or(logout).or(refresh).or(me).or(health)
}

/// Maps rejections to JSON error responses
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "unauthenticated".to_string())
    } else if let Some(AuthRejection(e)) = err.find::<AuthRejection>() {
        let status = match e {
            AuthFusionError::InvalidCredentials | AuthFusionError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthFusionError::UnsupportedOperation(_) | AuthFusionError::UnsupportedDriver(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthFusionError::DriverUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Auth route failed: {}", e);
            (status, "internal error".to_string())
        } else {
            (status, e.to_string())
        }
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "malformed request body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };

    let body = warp::reply::json(&ErrorResponse { error: message });
    Ok(warp::reply::with_status(with_api_security_headers(body), status))
}
