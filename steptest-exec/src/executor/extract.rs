use regex::Regex;

use steptest_core::template::SEARCH_SYNTAX;
use steptest_core::types::{Job, Step, VarSource};

use crate::executor::http::HttpResponseParts;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid search pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Run the step's `varfrom` directives against the response and bind the
/// extracted values into the job's variables.
///
/// `Header` looks the header up by name (case-insensitive) and assigns when
/// present and non-empty. `Body` runs the parse-time regex over the body
/// text, strips the literal fragments surrounding the sentinel from the
/// first match, and assigns the remainder; no match is a no-op.
pub fn variables_from(
    job: &mut Job,
    step: &Step,
    resp: &HttpResponseParts,
) -> Result<(), ExtractError> {
    if step.var_from.is_empty() {
        return Ok(());
    }

    let body = String::from_utf8_lossy(&resp.body);

    for var_from in &step.var_from {
        match var_from.from {
            VarSource::Header => {
                if let Some(value) = resp.header(&var_from.find) {
                    if !value.is_empty() {
                        job.vars.insert(var_from.name.clone(), value.to_string());
                    }
                }
            }
            VarSource::Body => {
                let regex = Regex::new(&var_from.pattern).map_err(|e| ExtractError::Pattern {
                    pattern: var_from.pattern.clone(),
                    source: e,
                })?;
                let Some(found) = regex.find(&body) else {
                    continue;
                };
                let mut value = found.as_str().to_string();
                if value.is_empty() {
                    continue;
                }
                for part in var_from.find.split(SEARCH_SYNTAX) {
                    if !part.is_empty() {
                        value = value.replace(part, "");
                    }
                }
                job.vars.insert(var_from.name.clone(), value);
            }
        }
    }

    Ok(())
}
