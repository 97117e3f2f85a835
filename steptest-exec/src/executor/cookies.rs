use chrono::{DateTime, Utc};

use steptest_core::types::{Cookie, Job};

use crate::executor::http::HttpResponseParts;

/// Merge every `Set-Cookie` in the response into the job's cookie list so
/// the next step sends them back. The merge key is `(name, domain, path)`:
/// a match overwrites the value, anything else appends. Unparsable headers
/// are skipped.
pub fn accumulate(job: &mut Job, resp: &HttpResponseParts) {
    for raw in resp.set_cookie_headers() {
        let Some(parsed) = parse_set_cookie(raw) else {
            continue;
        };
        match job.cookies.iter_mut().find(|c| c.same_slot(&parsed)) {
            Some(existing) => existing.value = parsed.value,
            None => job.cookies.push(parsed),
        }
    }
}

/// Parse one `Set-Cookie` header value. Only the attributes the engine
/// carries are read; unknown attributes are ignored.
pub fn parse_set_cookie(raw: &str) -> Option<Cookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
        ..Cookie::default()
    };

    for attribute in parts {
        let attribute = attribute.trim();
        let (key, val) = match attribute.split_once('=') {
            Some((key, val)) => (key.trim(), val.trim()),
            None => (attribute, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "path" => cookie.path = val.to_string(),
            "domain" => cookie.domain = val.to_string(),
            "max-age" => cookie.max_age = val.parse().unwrap_or(0),
            "expires" => {
                cookie.expires = DateTime::parse_from_rfc2822(val)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => {}
        }
    }

    Some(cookie)
}
