use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::RequestContext;

#[derive(ToSchema, Serialize, Debug)]
pub struct CurrentUser {
    username: String,
    admin: bool,
}

#[utoipa::path(
    get,
    path = "/user/current.query",
    responses(
        (status = 200, description = "User resolved for this request", body = CurrentUser),
        (status = 204, description = "No user resolved (login not required)"),
        (status = 302, description = "Not logged in, redirected to the login page"),
    ),
    tag = "user"
)]
pub async fn current(context: Option<Extension<RequestContext>>) -> impl IntoResponse {
    let Some(user) = context.as_ref().and_then(|ctx| ctx.current_user()) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    Json(CurrentUser {
        username: user.username().to_string(),
        admin: user.is_admin(),
    })
    .into_response()
}
