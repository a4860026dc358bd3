pub mod csrf;
pub mod health;
pub mod login;
pub mod user;

use serde::Serialize;
use utoipa::ToSchema;

pub(crate) const STATUS_OK: i32 = 0;
pub(crate) const STATUS_FAILED: i32 = -1;

/// Envelope the dashboard front-end expects from the login endpoints.
#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResult {
    status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(rename = "errMsg", skip_serializing_if = "Option::is_none")]
    err_msg: Option<String>,
}

impl LoginResult {
    pub(crate) fn ok(data: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            data: Some(data.into()),
            err_msg: None,
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILED,
            data: None,
            err_msg: Some(message.into()),
        }
    }
}
