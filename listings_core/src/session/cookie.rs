//! Signed session cookie.
//!
//! The cookie value is the session id signed with a key derived from the
//! session secret. Parsing, signing and `Set-Cookie` formatting go through the
//! `cookie` crate.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use cookie::{
    time::{Duration as CookieDuration, OffsetDateTime},
    Cookie, CookieJar, Key, SameSite,
};
use sha2::{Digest, Sha512};

use crate::session::model::SessionId;

#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    key: Key,
    max_age: chrono::Duration,
    secure: bool,
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionCookie {
    /// Secrets of any length are stretched to the 64 bytes a signing key needs.
    pub fn new(name: impl Into<String>, secret: &str, max_age: chrono::Duration, secure: bool) -> Self {
        let digest = Sha512::digest(secret.as_bytes());
        Self {
            name: name.into(),
            key: Key::from(digest.as_slice()),
            max_age,
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> chrono::Duration {
        self.max_age
    }

    /// Signed cookie value carrying `id`.
    pub fn sign(&self, id: &SessionId) -> String {
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key)
            .add(Cookie::new(self.name.clone(), id.as_str().to_string()));
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_string())
            .unwrap_or_default()
    }

    /// Returns the id carried by a cookie value if its signature checks out.
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(self.name.clone(), value.to_string()));
        let verified = jar.signed(&self.key).get(&self.name)?;
        SessionId::parse(verified.value())
    }

    /// Finds the first validly signed session cookie in the request headers.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| Cookie::split_parse(header))
            .filter_map(Result::ok)
            .filter(|cookie| cookie.name() == self.name)
            .find_map(|cookie| self.verify(cookie.value()))
    }

    /// `Set-Cookie` value issuing `id`, valid for `max_age` from `now`.
    pub fn issue(&self, id: &SessionId, now: DateTime<Utc>) -> Option<HeaderValue> {
        let expires = match OffsetDateTime::from_unix_timestamp((now + self.max_age).timestamp()) {
            Ok(expires) => expires,
            Err(e) => {
                tracing::error!(error = %e, "session expiry is out of range");
                return None;
            }
        };

        let cookie = self
            .base(self.sign(id))
            .max_age(CookieDuration::seconds(self.max_age.num_seconds()))
            .expires(expires)
            .build();
        header_value(&cookie)
    }

    /// `Set-Cookie` value that makes the browser drop the cookie.
    pub fn expire(&self) -> Option<HeaderValue> {
        let mut cookie = self.base(String::new()).build();
        cookie.make_removal();
        header_value(&cookie)
    }

    fn base(&self, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((self.name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
    }
}

fn header_value(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(header) => Some(header),
        Err(e) => {
            tracing::error!(error = %e, "session cookie is not a valid header value");
            None
        }
    }
}
