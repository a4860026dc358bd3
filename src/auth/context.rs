//! Per-request storage for the user resolved by the authenticator.
//!
//! A [`RequestContext`] belongs to exactly one request. The HTTP layer creates a
//! fresh one per request, hands it to the gate by `&mut`, and then moves it into
//! the request extensions so handlers can read the resolved user. It is dropped
//! with the request, so nothing leaks between concurrent requests.

use std::collections::HashMap;

use super::{users::UserInfo, USER_NAME};

#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    values: HashMap<String, UserInfo>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: UserInfo) {
        self.values.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UserInfo> {
        self.values.get(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// User stored under [`USER_NAME`] by a successful authentication.
    #[must_use]
    pub fn current_user(&self) -> Option<&UserInfo> {
        self.get(USER_NAME)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
