use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Name of the cookie carrying the one-shot message between a redirect and the
/// page it lands on.
pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum FlashLevel {
    Success,
    Danger,
}

impl FlashLevel {
    fn as_str(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Danger => "danger",
        }
    }
}

/// Flash
///
/// A user-visible outcome message. Every denial, validation failure and
/// successful mutation ends in a redirect carrying one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Danger,
            message: message.into(),
        }
    }

    // `level:message`; the jar percent-encodes the value on the wire.
    fn encode(&self) -> String {
        format!("{}:{}", self.level.as_str(), self.message)
    }

    fn decode(value: &str) -> Option<Self> {
        let (level, message) = value.split_once(':')?;
        let level = match level {
            "success" => FlashLevel::Success,
            "danger" => FlashLevel::Danger,
            _ => return None,
        };
        Some(Self {
            level,
            message: message.to_string(),
        })
    }
}

/// take
///
/// Reads the pending message, if any, and schedules its removal so it is shown
/// exactly once.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| Flash::decode(cookie.value()));

    if flash.is_some() {
        (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
    } else {
        (jar, None)
    }
}

/// redirect
///
/// `303 See Other` to `to` with `flash` stored for the next page.
pub fn redirect(jar: CookieJar, to: &str, flash: Flash) -> Response {
    let cookie = Cookie::build((FLASH_COOKIE, flash.encode()))
        .path("/")
        .http_only(true)
        .build();
    (jar.add(cookie), Redirect::to(to)).into_response()
}
