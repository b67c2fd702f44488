//! Reading the session back out of the browser once the agent has finished.

use std::future::Future;

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieSameSite};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::BrowsingAgent;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    /// Case-insensitive parse; anything unrecognised is `Lax`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" | "no_restriction" => SameSite::None,
            _ => SameSite::Lax,
        }
    }
}

/// A browser cookie in the shape reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds; `-1` marks a session cookie.
    pub expires: i64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

/// Attribute-style cookie: typed fields, any of which may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieAttributes {
    pub name: Option<String>,
    pub value: Option<String>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<f64>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<String>,
}

impl From<Cookie> for CookieAttributes {
    fn from(cookie: Cookie) -> Self {
        let same_site = cookie.same_site.map(|s| {
            match s {
                CookieSameSite::Strict => "Strict",
                CookieSameSite::Lax => "Lax",
                CookieSameSite::None => "None",
            }
            .to_string()
        });
        Self {
            name: Some(cookie.name),
            value: Some(cookie.value),
            domain: Some(cookie.domain),
            path: Some(cookie.path),
            expires: if cookie.session { None } else { Some(cookie.expires) },
            http_only: Some(cookie.http_only),
            secure: Some(cookie.secure),
            same_site,
        }
    }
}

/// A cookie as handed over by the delegate, in either representation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCookie {
    Attributes(CookieAttributes),
    Record(Map<String, Value>),
}

impl From<Cookie> for RawCookie {
    fn from(cookie: Cookie) -> Self {
        RawCookie::Attributes(cookie.into())
    }
}

impl From<Map<String, Value>> for RawCookie {
    fn from(record: Map<String, Value>) -> Self {
        RawCookie::Record(record)
    }
}

impl CookieRecord {
    /// Normalize either representation, applying path `/`, expires `-1` and
    /// sameSite `Lax` when absent.
    pub fn from_raw(raw: &RawCookie) -> Self {
        match raw {
            RawCookie::Attributes(attrs) => Self {
                name: attrs.name.clone().unwrap_or_default(),
                value: attrs.value.clone().unwrap_or_default(),
                domain: attrs.domain.clone().unwrap_or_default(),
                path: attrs.path.clone().unwrap_or_else(|| "/".to_string()),
                expires: attrs.expires.map(expires_seconds).unwrap_or(-1),
                http_only: attrs.http_only.unwrap_or(false),
                secure: attrs.secure.unwrap_or(false),
                same_site: attrs
                    .same_site
                    .as_deref()
                    .map(SameSite::parse)
                    .unwrap_or_default(),
            },
            RawCookie::Record(map) => {
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
                Self {
                    name: text("name").unwrap_or_default(),
                    value: text("value").unwrap_or_default(),
                    domain: text("domain").unwrap_or_default(),
                    path: text("path").unwrap_or_else(|| "/".to_string()),
                    expires: map
                        .get("expires")
                        .and_then(Value::as_f64)
                        .map(expires_seconds)
                        .unwrap_or(-1),
                    http_only: flag("httpOnly"),
                    secure: flag("secure"),
                    same_site: text("sameSite")
                        .map(|s| SameSite::parse(&s))
                        .unwrap_or_default(),
                }
            }
        }
    }
}

fn expires_seconds(expires: f64) -> i64 {
    if expires.is_finite() {
        expires.trunc() as i64
    } else {
        -1
    }
}

/// Run a non-essential step, turning any failure into `default`.
pub async fn best_effort<T, F>(label: &str, step: F, default: T) -> T
where
    F: Future<Output = Result<T>>,
{
    match step.await {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(step = label, error = %e, "best-effort step failed");
            default
        }
    }
}

/// Session state pulled from the browser after a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub cookies: Vec<CookieRecord>,
    /// Base64-encoded PNG of the final page, when one could be taken.
    pub screenshot: Option<String>,
    /// Empty when the URL could not be read.
    pub final_url: String,
}

/// Collect cookies, a final screenshot and the final URL. Never fails.
pub async fn extract_session(agent: &dyn BrowsingAgent) -> SessionSnapshot {
    let raw = best_effort("cookies", agent.cookies(), Vec::new()).await;
    let cookies = raw.iter().map(CookieRecord::from_raw).collect();

    let screenshot = best_effort(
        "screenshot",
        async { agent.screenshot().await.map(Some) },
        None,
    )
    .await
    .map(|png| base64::engine::general_purpose::STANDARD.encode(png));

    let final_url = best_effort("current url", agent.current_url(), String::new()).await;

    SessionSnapshot {
        cookies,
        screenshot,
        final_url,
    }
}
