use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use steptest_core::types::{Cookie, Header, Method};

/// The result of one job run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    /// HTTP status of the last executed step; -1 for transport, build or
    /// extraction failures, 0 for steps that never fetched.
    pub status: i32,
    pub duration: Duration,
    pub steps: Vec<ResultStep>,
    #[serde(rename = "error")]
    pub err: Option<ResultError>,
}

/// One executed step: method, URL, headers, cookies and body are recorded
/// post-substitution. Skipped steps keep the defaults (status 0, no start
/// time).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultStep {
    #[serde(rename = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    pub status: i32,
    pub duration: Duration,
    pub method: Option<Method>,
    pub url: String,
    pub headers: Vec<Header>,
    pub cookies: Vec<Cookie>,
    pub body: String,
}

/// The error that terminated a job, with a back-link to the failing step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultError {
    pub error: String,
    pub url: String,
    pub status: i32,
    /// Best-effort response body excerpt for HTTP application errors.
    pub body: String,
    pub step: Option<Box<ResultStep>>,
}
