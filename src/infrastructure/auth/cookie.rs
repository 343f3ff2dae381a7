use axum::http::{header, HeaderMap};
use chrono::Duration;

/// Cookie carrying the refresh token for browser clients.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// The refresh cookie is only sent back to the token endpoints.
const REFRESH_COOKIE_PATH: &str = "/auth";

pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

pub fn refresh_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Strict",
        REFRESH_COOKIE_NAME,
        token,
        REFRESH_COOKIE_PATH,
        max_age.num_seconds().max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", Duration::zero(), secure)
}
