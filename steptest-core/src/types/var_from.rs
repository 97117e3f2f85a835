/// Where a `varfrom` directive reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSource {
    Body,
    Header,
}

impl VarSource {
    /// Case-insensitive, so job texts can say `BODY`, `body`, `Header`, ...
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Some(Self::Body),
            "header" => Some(Self::Header),
            _ => None,
        }
    }
}

/// An extraction directive: after the step's response arrives, pull a value
/// out of the body (regex) or a header (by name) and bind it to a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarFrom {
    pub from: VarSource,
    /// Variable name to bind the extracted value to.
    pub name: String,
    /// The user-supplied search text: a header name for `Header`, or a body
    /// pattern containing the `{{StepTestSyntax}}` sentinel for `Body`.
    pub find: String,
    /// The regex built from `find` at parse time.
    pub pattern: String,
}
