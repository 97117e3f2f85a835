use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An HTTP cookie. Deserializes from the JSON argument of the `cookie`
/// keyword; also produced at runtime from response `Set-Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    pub expires: Option<DateTime<Utc>>,
    #[serde(rename = "maxAge")]
    pub max_age: i64,
    pub secure: bool,
    #[serde(rename = "httpOnly")]
    pub http_only: bool,
}

impl Cookie {
    /// Cookies are merged by `(name, domain, path)`, never by name alone.
    pub fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}
