//! Cookie storage for the backend origin.
//!
//! The client talks to a single backend, so cookies are keyed by name only.
//! Cookies are accepted from and sent to that backend's origin and nowhere
//! else. Domain, path and expiry attributes are ignored except for deletion
//! (`Max-Age=0` or an empty value).

use dashmap::DashMap;
use reqwest::header::HeaderValue;
use url::{Origin, Url};

/// Thread-safe cookie jar plugged into the reqwest client.
#[derive(Debug)]
pub struct CookieJar {
    origin: Origin,
    cookies: DashMap<String, String>,
}

impl CookieJar {
    /// A jar bound to the origin of `backend`.
    pub fn new(backend: &Url) -> Self {
        Self {
            origin: backend.origin(),
            cookies: DashMap::new(),
        }
    }

    /// Whether cookies in this jar may travel to `url`.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    /// Raw (still URL-encoded) cookie value.
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|r| r.value().clone())
    }

    /// Cookie value with percent-encoding removed.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(|raw| decode_cookie_value(&raw))
    }

    pub fn remove(&self, name: &str) -> bool {
        self.cookies.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Store a single `Set-Cookie` header value.
    pub fn store_set_cookie(&self, header: &str) {
        let Some(cookie) = parse_set_cookie(header) else {
            return;
        };
        if cookie.delete {
            self.cookies.remove(&cookie.name);
        } else {
            self.cookies.insert(cookie.name, cookie.value);
        }
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        if !self.is_same_origin(url) {
            return;
        }
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.store_set_cookie(value);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        if self.cookies.is_empty() || !self.is_same_origin(url) {
            return None;
        }

        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|r| format!("{}={}", r.key(), r.value()))
            .collect();
        pairs.sort();

        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedCookie {
    name: String,
    value: String,
    delete: bool,
}

fn parse_set_cookie(header: &str) -> Option<ParsedCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let expired = parts.any(|attr| {
        attr.split_once('=')
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("max-age"))
            .and_then(|(_, age)| age.trim().parse::<i64>().ok())
            .is_some_and(|age| age <= 0)
    });

    Some(ParsedCookie {
        name: name.to_string(),
        value: value.to_string(),
        delete: expired || value.is_empty(),
    })
}

/// Percent-decode a cookie value without treating `+` as a space.
pub fn decode_cookie_value(raw: &str) -> String {
    let escaped = raw.replace('+', "%2B").replace('&', "%26");
    url::form_urlencoded::parse(format!("v={}", escaped).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
