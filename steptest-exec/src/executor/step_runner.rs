use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;

use steptest_core::template;
use steptest_core::types::{Condition, ConditionKind, Job, Step};

use crate::executor::http::HttpClient;
use crate::executor::result::{ResultError, ResultStep};
use crate::executor::{cookies, extract, request};

/// Execute one step against the job's current state.
///
/// The step is taken by value: the job runner hands over a fresh clone per
/// execution, so substitution never bleeds into the step template of a
/// for-loop. Steps without a URL never fetch and return the default result.
pub async fn run_step(
    job: &mut Job,
    mut step: Step,
    transport: &dyn HttpClient,
) -> (ResultStep, Option<ResultError>) {
    if step.url.is_empty() {
        return (ResultStep::default(), None);
    }

    let start_time = Utc::now();
    let started = Instant::now();

    let (status, err) = fetch_step(job, &mut step, transport).await;

    let result = ResultStep {
        start_time: Some(start_time),
        status,
        duration: started.elapsed(),
        method: step.method,
        url: step.url,
        headers: step.headers,
        cookies: step.cookies,
        body: step.body,
    };

    match err {
        Some(mut err) => {
            err.step = Some(Box::new(result.clone()));
            (result, Some(err))
        }
        None => (result, None),
    }
}

async fn fetch_step(
    job: &mut Job,
    step: &mut Step,
    transport: &dyn HttpClient,
) -> (i32, Option<ResultError>) {
    if !conditions_allow(&step.conditions, &job.vars) {
        return (0, None);
    }

    template::resolve_step(step, job);

    let Some(method) = step.method else {
        return (0, None);
    };

    let req = request::build_request(method, step, job.global_auth.as_ref());
    let resp = match transport.send(req).await {
        Ok(resp) => resp,
        Err(e) => {
            return (
                -1,
                Some(ResultError {
                    error: format!("error sending the request: {e}"),
                    url: step.url.clone(),
                    status: -1,
                    ..ResultError::default()
                }),
            )
        }
    };

    if resp.status >= 400 {
        let status = i32::from(resp.status);
        return (
            status,
            Some(ResultError {
                error: format!("{} {} {}", resp.status, method, step.url),
                url: step.url.clone(),
                status,
                body: String::from_utf8_lossy(&resp.body).into_owned(),
                step: None,
            }),
        );
    }

    cookies::accumulate(job, &resp);

    if let Err(e) = extract::variables_from(job, step, &resp) {
        return (
            -1,
            Some(ResultError {
                error: e.to_string(),
                url: step.url.clone(),
                status: -1,
                ..ResultError::default()
            }),
        );
    }

    (i32::from(resp.status), None)
}

/// A step with no conditions always runs. With conditions, it runs iff any
/// `exists` condition finds its variable; the other kinds parse but
/// evaluate false.
fn conditions_allow(conditions: &[Condition], vars: &BTreeMap<String, String>) -> bool {
    if conditions.is_empty() {
        return true;
    }
    conditions
        .iter()
        .any(|c| c.kind == ConditionKind::Exists && vars.contains_key(&c.var1))
}
