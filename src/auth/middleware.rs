use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Deserialize;

use crate::auth;

#[derive(Deserialize)]
pub struct TokenParams {
    token: Option<String>,
}

/// Resolves the bearer token (header, or `token` query parameter for
/// websocket upgrades) into an [`auth::User`] request extension.
pub async fn authorize(
    auth_service: State<auth::Service>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(params): Query<TokenParams>,
    mut req: Request,
    next: Next,
) -> crate::Result<Response> {
    let token = match (&bearer, &params.token) {
        (Some(TypedHeader(Authorization(bearer))), _) => bearer.token(),
        (None, Some(token)) => token.as_str(),
        (None, None) => return Err(auth::Error::Unauthorized.into()),
    };

    let auth_user = auth_service.validate(token)?;
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
