use std::collections::BTreeMap;

use crate::types::{BasicAuth, Cookie, Header, Step};

/// One parsed load-test script, executed end-to-end by a single worker.
///
/// Variables, arrays, cookies and the global header/auth settings are
/// job-local; two concurrent jobs never share them. Within a job, mutation
/// happens only on the owning worker, so none of this needs locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    pub steps: Vec<Step>,
    /// Seeded by the caller, appended to by `var` directives and by
    /// response extraction at runtime.
    pub vars: BTreeMap<String, String>,
    pub arrays: BTreeMap<String, Vec<String>>,
    pub global_headers: Vec<Header>,
    pub global_auth: Option<BasicAuth>,
    /// Cookies accumulated across step responses, merged by
    /// `(name, domain, path)`.
    pub cookies: Vec<Cookie>,
}

impl Job {
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self {
            vars,
            ..Self::default()
        }
    }
}
