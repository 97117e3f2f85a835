//! `{{name}}` substitution against a job's variable and array stores.
//!
//! Replacement is literal-string, all occurrences, one pass per variable.
//! A substituted value is never re-scanned, so chained interpolation is not
//! supported, and `{{name}}` with an unknown `name` is left intact.

use std::collections::BTreeMap;

use crate::types::{Job, Step};

/// Sentinel token inside a `varfrom` body pattern marking the value to
/// capture.
pub const SEARCH_SYNTAX: &str = "{{StepTestSyntax}}";

/// What the sentinel becomes inside the generated regex: it closes the
/// leading-anchor group and opens the trailing-anchor group around `.+`.
const SEARCH_REPLACE: &str = ").+(";

/// The `{{name}}` token for a variable name.
pub fn var_token(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

/// Replace every `{{name}}` occurrence in `text` for every known variable.
pub fn apply_vars(text: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    for (name, value) in vars {
        out = out.replace(&var_token(name), value);
    }
    out
}

/// Build the body-search regex for a `varfrom` directive: the whole pattern
/// is wrapped in capturing parens and the sentinel becomes `).+(`, so the
/// match is any substring bracketed by the two literal anchors.
pub fn search_pattern(find: &str) -> String {
    format!("({})", find.replace(SEARCH_SYNTAX, SEARCH_REPLACE))
}

/// Prepare a step for execution: merge the job-global headers in front of
/// the step's local ones, copy the job cookies into the step's slots, then
/// substitute variables into URL, body, header values and cookie values.
/// Header and cookie names are never substituted.
pub fn resolve_step(step: &mut Step, job: &Job) {
    let mut headers = job.global_headers.clone();
    headers.append(&mut step.headers);
    step.headers = headers;
    step.cookies = job.cookies.clone();

    step.url = apply_vars(&step.url, &job.vars);
    step.body = apply_vars(&step.body, &job.vars);
    for header in &mut step.headers {
        header.value = apply_vars(&header.value, &job.vars);
    }
    for cookie in &mut step.cookies {
        cookie.value = apply_vars(&cookie.value, &job.vars);
    }
}

/// Expand a for-loop's raw value list before iteration.
///
/// The array pass runs first: a slot containing `{{arrName}}` for a known
/// array replaces the whole list with that array. Then the variable pass:
/// a slot containing `{{varName}}` is spliced with the variable's elements
/// when its value parses as a JSON string array, and otherwise becomes the
/// variable's value.
pub fn expand_loop_values(
    values: &mut Vec<String>,
    vars: &BTreeMap<String, String>,
    arrays: &BTreeMap<String, Vec<String>>,
) {
    for (name, array) in arrays {
        let token = var_token(name);
        if values.iter().any(|v| v.contains(&token)) {
            *values = array.clone();
        }
    }

    for (name, value) in vars {
        let token = var_token(name);
        let mut i = 0;
        while i < values.len() {
            if !values[i].contains(&token) {
                i += 1;
                continue;
            }
            match serde_json::from_str::<Vec<String>>(value) {
                Ok(elements) => {
                    let advance = elements.len();
                    values.splice(i..=i, elements);
                    i += advance;
                }
                Err(_) => {
                    values[i] = value.clone();
                    i += 1;
                }
            }
        }
    }
}
