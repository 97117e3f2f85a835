use serde::Serialize;

use crate::types::{BasicAuth, Condition, Cookie, Header, VarFrom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A for-loop container: the body steps run once per value, with the loop
/// variable bound to the current value. Bodies are flat; nesting is rejected
/// by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForLoop {
    pub var_name: String,
    pub values: Vec<String>,
    pub steps: Vec<Step>,
}

impl ForLoop {
    /// A step is a loop container iff its loop has a variable name.
    pub fn is_active(&self) -> bool {
        !self.var_name.is_empty()
    }
}

/// One unit within a job: an HTTP request, or a for-loop container.
///
/// URL, body, header values and cookie values are stored pre-substitution;
/// `{{name}}` tokens are resolved right before the step executes. The
/// `cookies` slots stay empty until runtime, when they receive substituted
/// copies of the job-global cookies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub method: Option<Method>,
    pub url: String,
    pub body: String,
    pub headers: Vec<Header>,
    pub cookies: Vec<Cookie>,
    pub auth: Option<BasicAuth>,
    pub conditions: Vec<Condition>,
    pub var_from: Vec<VarFrom>,
    pub for_loop: ForLoop,
}
