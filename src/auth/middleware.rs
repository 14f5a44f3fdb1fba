use axum::{
    extract::{Request, State},
    http::{
        header::{HeaderName, AUTHORIZATION},
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::auth::{AuthError, JwtService, UserSession};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(jwt_service): State<JwtService>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = match bearer {
        Some(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
        None if request.headers().contains_key(AUTHORIZATION) => {
            return Err(AuthError::InvalidAuthHeaderFormat)
        }
        None => return Err(AuthError::MissingAuthHeader),
    };

    let session = jwt_service.extract_user_session(&token).map_err(|err| {
        tracing::debug!(error = %err, "Rejected bearer token");
        err
    })?;

    // Add user session to request extensions
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Admin-only middleware; must run after `jwt_auth_middleware`
pub async fn admin_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = request
        .extensions()
        .get::<UserSession>()
        .ok_or(AuthError::InsufficientPermissions)?;

    if !session.role.is_admin() {
        tracing::warn!(user_id = %session.user_id, "Non-admin attempted admin access");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// CORS configuration for the browser client
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Security headers middleware
pub fn security_headers_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}
