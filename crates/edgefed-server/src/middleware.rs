//! Request authentication for the management API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header carrying the acting user, checked before `Authorization`.
pub const USER_HEADER: &str = "X-Edgefed-User";

/// The authenticated user, stored in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorContext(pub String);

/// Resolves the acting user from `X-Edgefed-User` or `Authorization: Bearer`.
///
/// The token names the user directly. Verifying it (mTLS, an auth proxy) is
/// left to the deployment; authorization happens per operation against the
/// configured policy.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let actor = if let Some(val) = req.headers().get(USER_HEADER) {
        val.to_str()
            .map_err(|_| StatusCode::UNAUTHORIZED)?
            .trim()
            .to_string()
    } else if let Some(val) = req.headers().get("Authorization") {
        let val_str = val.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
        match val_str.strip_prefix("Bearer ") {
            Some(token) => token.trim().to_string(),
            None => return Err(StatusCode::UNAUTHORIZED),
        }
    } else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if actor.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    tracing::debug!(%actor, path = %req.uri().path(), "authenticated request");
    req.extensions_mut().insert(ActorContext(actor));
    Ok(next.run(req).await)
}
