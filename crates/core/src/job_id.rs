//! Job identifier derivation from page context.
//!
//! The aggregator redirects back into the verification step with a
//! `jobIds` query parameter. The value may hold one identifier, several
//! concatenated identifiers, or free-form text; the first UUID found wins,
//! otherwise the raw value is used verbatim.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Query-string key carrying the upstream job identifier(s).
pub const JOB_IDS_PARAM: &str = "jobIds";

/// Pattern for a hyphenated UUID, any case.
pub const UUID_PATTERN: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(UUID_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Opaque name for one unit of upstream work. Held for the lifetime of the
/// wizard step and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap an identifier that is already canonical.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the canonical identifier from a raw `jobIds` value.
    ///
    /// Returns the first UUID substring if there is one, else the raw
    /// value unchanged.
    pub fn from_param(raw: &str) -> Self {
        match UUID_RE.find(raw) {
            Some(m) => Self(m.as_str().to_string()),
            None => Self(raw.to_string()),
        }
    }

    /// Read `jobIds` from a URL query string (leading `?` optional).
    ///
    /// Returns `None` when the parameter is absent or empty. When the key
    /// repeats, the first occurrence is used.
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let raw = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .find_map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key) == JOB_IDS_PARAM).then(|| decode_component(value))
            })?;

        if raw.is_empty() {
            return None;
        }
        Some(Self::from_param(&raw))
    }

    /// Read `jobIds` from a full URL such as the redirect target.
    pub fn from_url(url: &str) -> Option<Self> {
        let without_fragment = url.split('#').next().unwrap_or(url);
        let (_, query) = without_fragment.split_once('?')?;
        Self::from_query(query)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Form-urlencoded decoding: `+` is a space, `%XX` is a byte. Malformed
/// escapes fall back to the undecoded text.
fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
