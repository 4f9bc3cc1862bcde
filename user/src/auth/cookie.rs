//! Cookie transport for access and refresh tokens
//!
//! Every cookie written here carries the same fixed attributes:
//! `HttpOnly; Secure; SameSite=None; Path=/` plus a `Max-Age` equal to the
//! remaining lifetime of the token it wraps.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use chrono::Utc;
use cookie::{Cookie, SameSite};
use tracing::{debug, warn};

use super::types::IssuedToken;
use crate::error::{Result, UserError};

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Reads and writes token cookies on raw header maps.
pub struct CookieTransport;

impl CookieTransport {
    pub fn build(name: &str, value: &str, max_age_seconds: i64) -> Cookie<'static> {
        Cookie::build((name.to_string(), value.to_string()))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .path("/")
            .max_age(cookie::time::Duration::seconds(max_age_seconds.max(0)))
            .build()
    }

    /// Sets `name`, replacing any `Set-Cookie` entry already present for it.
    pub fn write(
        headers: &mut HeaderMap,
        name: &str,
        value: &str,
        max_age_seconds: i64,
    ) -> Result<()> {
        let cookie = Self::build(name, value, max_age_seconds);
        Self::append(headers, &cookie)
    }

    /// Sets a cookie whose `Max-Age` tracks the token's expiry.
    pub fn write_token(headers: &mut HeaderMap, name: &str, token: &IssuedToken) -> Result<()> {
        Self::write(headers, name, &token.value, token.remaining_seconds(Utc::now()))
    }

    /// Sets an immediately expiring cookie with the same path and flags.
    pub fn clear(headers: &mut HeaderMap, name: &str) -> Result<()> {
        Self::write(headers, name, "", 0)
    }

    /// Value of the inbound cookie `name`, if any.
    ///
    /// Unparseable pairs in the `Cookie` header are skipped.
    pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| Cookie::split_parse(raw.to_string()))
            .filter_map(|parsed| parsed.ok())
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    /// True when a `Set-Cookie` entry for `name` is already on `headers`.
    pub fn has_set_cookie(headers: &HeaderMap, name: &str) -> bool {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .any(|value| Self::set_cookie_name(value).as_deref() == Some(name))
    }

    /// Copies `cookies` onto `headers`, skipping names already set there.
    pub fn merge(headers: &mut HeaderMap, cookies: &[Cookie<'static>]) -> Result<()> {
        for cookie in cookies {
            if Self::has_set_cookie(headers, cookie.name()) {
                debug!("Response already sets cookie {}, keeping it", cookie.name());
                continue;
            }
            Self::append(headers, cookie)?;
        }
        Ok(())
    }

    fn append(headers: &mut HeaderMap, cookie: &Cookie<'static>) -> Result<()> {
        let encoded = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
            warn!("Cookie {} could not be encoded: {}", cookie.name(), e);
            UserError::Cookie(e.to_string())
        })?;

        let name = cookie.name();
        let retained: Vec<HeaderValue> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter(|value| Self::set_cookie_name(value).as_deref() != Some(name))
            .cloned()
            .collect();

        headers.remove(SET_COOKIE);
        for value in retained {
            headers.append(SET_COOKIE, value);
        }
        headers.append(SET_COOKIE, encoded);
        Ok(())
    }

    fn set_cookie_name(value: &HeaderValue) -> Option<String> {
        let raw = value.to_str().ok()?;
        Cookie::parse(raw.to_string())
            .ok()
            .map(|cookie| cookie.name().to_string())
    }
}
