use steptest_core::types::{BasicAuth, Method, Step};

use crate::executor::http::HttpRequestParts;

/// The default User-Agent, a Chrome-on-macOS profile. A `header` directive
/// naming User-Agent replaces it.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_3) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0.3282.186 Safari/537.36";

/// Assemble the transport request for a resolved (post-substitution) step.
///
/// Attachment order: the fixed User-Agent, basic auth (step-local wins over
/// job-global), each header with set/replace semantics, then the step's
/// cookies rendered into the `Cookie` header.
pub fn build_request(method: Method, step: &Step, global_auth: Option<&BasicAuth>) -> HttpRequestParts {
    let mut headers: Vec<(String, String)> =
        vec![("User-Agent".to_string(), USER_AGENT.to_string())];

    let basic_auth = step.auth.clone().or_else(|| global_auth.cloned());

    for header in &step.headers {
        set_header(&mut headers, &header.name, &header.value);
    }

    if !step.cookies.is_empty() {
        let line = step
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        append_cookie_header(&mut headers, &line);
    }

    HttpRequestParts {
        method,
        url: step.url.clone(),
        headers,
        basic_auth,
        body: step.body.clone().into_bytes(),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some((_, existing)) => *existing = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Cookies append to an existing `Cookie` header rather than replacing it,
/// so a `header` directive setting cookies by hand still keeps its values.
fn append_cookie_header(headers: &mut Vec<(String, String)>, line: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case("cookie")) {
        Some((_, existing)) => {
            existing.push_str("; ");
            existing.push_str(line);
        }
        None => headers.push(("Cookie".to_string(), line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steptest_core::types::{Cookie, Header};

    fn header_value<'a>(req: &'a HttpRequestParts, name: &str) -> Option<&'a str> {
        req.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn user_agent_is_set_by_default() {
        let step = Step {
            url: "https://a/".to_string(),
            ..Step::default()
        };
        let req = build_request(Method::Get, &step, None);
        assert_eq!(header_value(&req, "user-agent"), Some(USER_AGENT));
    }

    #[test]
    fn a_header_directive_overrides_the_user_agent() {
        let step = Step {
            url: "https://a/".to_string(),
            headers: vec![Header::new("User-Agent", "custom")],
            ..Step::default()
        };
        let req = build_request(Method::Get, &step, None);
        assert_eq!(header_value(&req, "user-agent"), Some("custom"));
        assert_eq!(
            req.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("user-agent")).count(),
            1
        );
    }

    #[test]
    fn local_auth_takes_precedence_over_global() {
        let global = BasicAuth {
            username: "global".to_string(),
            password: "gp".to_string(),
        };
        let step = Step {
            url: "https://a/".to_string(),
            auth: Some(BasicAuth {
                username: "local".to_string(),
                password: "lp".to_string(),
            }),
            ..Step::default()
        };
        let req = build_request(Method::Get, &step, Some(&global));
        assert_eq!(req.basic_auth.as_ref().map(|a| a.username.as_str()), Some("local"));

        let bare = Step {
            url: "https://a/".to_string(),
            ..Step::default()
        };
        let req = build_request(Method::Get, &bare, Some(&global));
        assert_eq!(req.basic_auth.as_ref().map(|a| a.username.as_str()), Some("global"));
    }

    #[test]
    fn cookies_render_into_one_cookie_header() {
        let step = Step {
            url: "https://a/".to_string(),
            cookies: vec![
                Cookie {
                    name: "a".to_string(),
                    value: "1".to_string(),
                    ..Cookie::default()
                },
                Cookie {
                    name: "b".to_string(),
                    value: "2".to_string(),
                    ..Cookie::default()
                },
            ],
            ..Step::default()
        };
        let req = build_request(Method::Get, &step, None);
        assert_eq!(header_value(&req, "cookie"), Some("a=1; b=2"));
    }

    #[test]
    fn cookies_append_to_a_hand_set_cookie_header() {
        let step = Step {
            url: "https://a/".to_string(),
            headers: vec![Header::new("Cookie", "manual=1")],
            cookies: vec![Cookie {
                name: "s".to_string(),
                value: "2".to_string(),
                ..Cookie::default()
            }],
            ..Step::default()
        };
        let req = build_request(Method::Get, &step, None);
        assert_eq!(header_value(&req, "cookie"), Some("manual=1; s=2"));
    }
}
