use std::collections::BTreeMap;

use steptest_core::parse_job;
use steptest_core::types::{ConditionKind, Method, VarSource};

fn full_job_text() -> String {
    [
        r#"- @header { "Name": "X-Env", "Value": "load" }"#,
        r#"  @auth { "username": "global", "password": "gp" }"#,
        r#"  var { "name": "host", "value": "shop.example.com" }"#,
        r#"  array { "name": "products", "values": ["1", "2", "3"] }"#,
        r#"  cookie { "name": "consent", "value": "yes", "domain": "shop.example.com", "path": "/" }"#,
        "",
        r#"- POST https://{{host}}/login user=admin"#,
        r#"  header { "Name": "Content-Type", "Value": "application/x-www-form-urlencoded" }"#,
        r#"  auth { "username": "local", "password": "lp" }"#,
        r#"  varfrom { "from": "BODY", "name": "token", "find": "token=\"{{StepTestSyntax}}\"" }"#,
        "",
        r#"- for product in {{products}}"#,
        r#"- GET https://{{host}}/products/{{product}}"#,
        r#"  if { "type": "exists", "var1": "token" }"#,
        r#"- forend"#,
        "",
        r#"- DELETE https://{{host}}/session"#,
    ]
    .join("\n")
}

#[test]
fn full_job_parses_into_the_expected_shape() {
    let job = parse_job(&full_job_text(), BTreeMap::new()).expect("job should parse");

    assert_eq!(job.vars["host"], "shop.example.com");
    assert_eq!(job.arrays["products"], vec!["1", "2", "3"]);
    assert_eq!(job.global_headers.len(), 1);
    assert_eq!(job.global_headers[0].name, "X-Env");
    assert_eq!(
        job.global_auth.as_ref().map(|a| a.username.as_str()),
        Some("global")
    );
    assert_eq!(job.cookies.len(), 1);
    assert_eq!(job.cookies[0].name, "consent");

    // Directive-only first segment adds no step of its own.
    assert_eq!(job.steps.len(), 3);

    let login = &job.steps[0];
    assert_eq!(login.method, Some(Method::Post));
    assert_eq!(login.url, "https://{{host}}/login");
    assert_eq!(login.body, "user=admin");
    assert_eq!(login.headers[0].name, "Content-Type");
    assert_eq!(login.auth.as_ref().map(|a| a.username.as_str()), Some("local"));
    assert_eq!(login.var_from[0].from, VarSource::Body);
    assert_eq!(login.var_from[0].name, "token");

    let browse = &job.steps[1];
    assert!(browse.for_loop.is_active());
    assert_eq!(browse.for_loop.var_name, "product");
    assert_eq!(browse.for_loop.values, vec!["{{products}}"]);
    assert_eq!(browse.for_loop.steps.len(), 1);
    let inner = &browse.for_loop.steps[0];
    assert_eq!(inner.method, Some(Method::Get));
    assert_eq!(inner.conditions[0].kind, ConditionKind::Exists);
    assert!(!inner.for_loop.is_active());

    let logout = &job.steps[2];
    assert_eq!(logout.method, Some(Method::Delete));
}

#[test]
fn the_same_text_always_parses_to_the_same_job() {
    let text = full_job_text();
    let first = parse_job(&text, BTreeMap::new()).expect("first parse");
    let second = parse_job(&text, BTreeMap::new()).expect("second parse");
    assert_eq!(first, second);
}
