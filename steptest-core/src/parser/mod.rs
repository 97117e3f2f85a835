//! The line-based step parser.
//!
//! A job text is split into steps on lines beginning with `"- "`; within a
//! step, continuation lines begin with two spaces. Each line is
//! `KEYWORD [ARGS]` with a case-insensitive keyword; most keywords take a
//! JSON literal as their argument.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;

use crate::error::ParseError;
use crate::template::search_pattern;
use crate::types::{
    BasicAuth, Condition, ConditionKind, Cookie, ForLoop, Header, Job, Method, Step, VarFrom,
    VarSource,
};

/// Each step is introduced by a leading dash and a following space.
const STEP_SEPARATOR: &str = "(?m:^- )";
/// Each line within a step is introduced by two leading spaces.
const LINE_SEPARATOR: &str = "(?m:^  )";
/// Whitespace stripped from rows before keyword dispatch.
const TRIM: [char; 2] = [' ', '\t'];
/// Separator between the loop variable and the value list in `for`.
const FOR_IN: &str = "in";

/// Parse a job text with the caller's initial variables.
pub fn parse_job(text: &str, vars: BTreeMap<String, String>) -> Result<Job, ParseError> {
    JobParser::new(vars).parse(text)
}

/// Parser state. The for-loop bookkeeping lives here rather than on the job:
/// `for_attach` is the index of the container currently collecting body
/// steps (only one, nesting is rejected), and `for_counter` must return to
/// zero by the end of the parse.
struct JobParser {
    job: Job,
    for_counter: i32,
    for_attach: Option<usize>,
    for_terminate_next: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VariableArg {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArrayArg {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VarFromArg {
    from: String,
    name: String,
    find: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionArg {
    r#type: String,
    var1: String,
    var2: String,
}

impl JobParser {
    fn new(vars: BTreeMap<String, String>) -> Self {
        Self {
            job: Job::new(vars),
            for_counter: 0,
            for_attach: None,
            for_terminate_next: false,
        }
    }

    fn parse(mut self, text: &str) -> Result<Job, ParseError> {
        let step_separator = Regex::new(STEP_SEPARATOR)?;
        let line_separator = Regex::new(LINE_SEPARATOR)?;

        for segment in step_separator.split(text) {
            if segment.trim().is_empty() {
                continue;
            }
            self.parse_segment(&line_separator, segment)?;
        }

        match self.for_counter {
            c if c > 0 => Err(ParseError::ForWithoutForend),
            c if c < 0 => Err(ParseError::ForendWithoutFor),
            _ => Ok(self.job),
        }
    }

    fn parse_segment(&mut self, line_separator: &Regex, segment: &str) -> Result<(), ParseError> {
        let mut step = Step::default();
        for row in line_separator.split(segment) {
            let row = row.replace('\n', "");
            self.parse_line(&mut step, &row)?;
        }
        self.finish_segment(step);
        Ok(())
    }

    /// Place a parsed step: inside the open for-loop container when one is
    /// collecting, on the job's top-level list otherwise. The segment that
    /// opened a loop carries the container itself; any other content it had
    /// becomes the first body step. Segments that produced nothing (a bare
    /// `forend`, or directives that only touched job state) add no step.
    fn finish_segment(&mut self, mut step: Step) {
        match self.for_attach {
            Some(index) => {
                if self.job.steps.len() == index {
                    self.job.steps.push(Step {
                        for_loop: std::mem::take(&mut step.for_loop),
                        ..Step::default()
                    });
                }
                step.for_loop = ForLoop::default();
                if step != Step::default() {
                    self.job.steps[index].for_loop.steps.push(step);
                }
            }
            None => {
                if step != Step::default() {
                    self.job.steps.push(step);
                }
            }
        }

        if self.for_terminate_next {
            self.for_terminate_next = false;
            self.for_attach = None;
        }
    }

    fn parse_line(&mut self, step: &mut Step, row: &str) -> Result<(), ParseError> {
        let trimmed = row.trim_matches(TRIM);
        let (keyword, args) = match trimmed.split_once(' ') {
            Some((keyword, args)) => (keyword, args),
            None => (trimmed, ""),
        };

        if keyword.is_empty() {
            return Ok(());
        }

        match keyword.to_ascii_lowercase().as_str() {
            "get" => http_step(step, Method::Get, args),
            "post" => http_step(step, Method::Post, args),
            "patch" => http_step(step, Method::Patch, args),
            "put" => http_step(step, Method::Put, args),
            "delete" => http_step(step, Method::Delete, args),
            "var" => self.create_var(args),
            "array" => self.create_array(args),
            "varfrom" => create_var_from(step, args),
            "cookie" => self.create_cookie(args),
            "header" => create_header(step, args),
            "auth" => create_auth(step, args),
            "@header" => self.create_global_header(args),
            "@auth" => self.create_global_auth(args),
            "for" => self.start_for_loop(step, args),
            "forend" => self.end_for_loop(),
            "if" => create_if(step, args),
            other => Err(ParseError::UnknownKeyword {
                keyword: other.to_string(),
            }),
        }
    }

    fn create_var(&mut self, args: &str) -> Result<(), ParseError> {
        let arg: VariableArg = parse_json("var", args)?;
        if arg.name.is_empty() {
            return Err(missing("var", "NAME", args));
        }
        if arg.value.is_empty() {
            return Err(missing("var", "VALUE", args));
        }
        self.job.vars.insert(arg.name, arg.value);
        Ok(())
    }

    fn create_array(&mut self, args: &str) -> Result<(), ParseError> {
        let arg: ArrayArg = parse_json("array", args)?;
        if arg.name.is_empty() {
            return Err(missing("array", "NAME", args));
        }
        if arg.values.is_empty() {
            return Err(missing("array", "VALUES", args));
        }
        self.job.arrays.insert(arg.name, arg.values);
        Ok(())
    }

    fn create_cookie(&mut self, args: &str) -> Result<(), ParseError> {
        let cookie: Cookie = parse_json("cookie", args)?;
        if cookie.name.is_empty() {
            return Err(missing("cookie", "NAME", args));
        }
        if cookie.value.is_empty() {
            return Err(missing("cookie", "VALUE", args));
        }
        self.job.cookies.push(cookie);
        Ok(())
    }

    fn create_global_header(&mut self, args: &str) -> Result<(), ParseError> {
        let header: Header = parse_json("@header", args)?;
        if header.name.is_empty() {
            return Err(missing("@header", "NAME", args));
        }
        if header.value.is_empty() {
            return Err(missing("@header", "VALUE", args));
        }
        self.job.global_headers.push(header);
        Ok(())
    }

    fn create_global_auth(&mut self, args: &str) -> Result<(), ParseError> {
        let auth: BasicAuth = parse_json("@auth", args)?;
        if auth.username.is_empty() {
            return Err(missing("@auth", "USERNAME", args));
        }
        if auth.password.is_empty() {
            return Err(missing("@auth", "PASSWORD", args));
        }
        self.job.global_auth = Some(auth);
        Ok(())
    }

    fn start_for_loop(&mut self, step: &mut Step, args: &str) -> Result<(), ParseError> {
        if self.for_attach.is_some() {
            return Err(ParseError::NestedFor {
                raw: args.to_string(),
            });
        }

        let mut parts = args.splitn(3, ' ');
        let (var_name, separator, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(var_name), Some(separator), Some(value)) if !var_name.is_empty() => {
                (var_name, separator, value)
            }
            _ => {
                return Err(ParseError::BadForSyntax {
                    raw: args.to_string(),
                })
            }
        };
        if !separator.eq_ignore_ascii_case(FOR_IN) {
            return Err(ParseError::BadForSyntax {
                raw: args.to_string(),
            });
        }

        // A value naming a known array is kept as the literal reference and
        // expanded at run time against the job's arrays. Anything else must
        // be a JSON string array.
        let key = value.strip_prefix("{{").unwrap_or(value);
        let key = key.strip_suffix("}}").unwrap_or(key);
        let values = if self.job.arrays.contains_key(key) {
            vec![value.to_string()]
        } else {
            serde_json::from_str::<Vec<String>>(value).map_err(|_| ParseError::BadForValues {
                raw: args.to_string(),
            })?
        };

        step.for_loop = ForLoop {
            var_name: var_name.to_string(),
            values,
            steps: Vec::new(),
        };
        self.for_attach = Some(self.job.steps.len());
        self.for_counter += 1;
        Ok(())
    }

    fn end_for_loop(&mut self) -> Result<(), ParseError> {
        if self.for_counter < 1 {
            return Err(ParseError::ForendWithoutFor);
        }
        self.for_terminate_next = true;
        self.for_counter -= 1;
        Ok(())
    }
}

fn http_step(step: &mut Step, method: Method, args: &str) -> Result<(), ParseError> {
    let (url, body) = match args.split_once(' ') {
        Some((url, body)) => (url, body),
        None => (args, ""),
    };
    if url.is_empty() {
        return Err(ParseError::MissingUrl {
            method: method.as_str(),
            raw: args.to_string(),
        });
    }
    if !body.is_empty() && method != Method::Get {
        step.body = body.to_string();
    }
    step.method = Some(method);
    step.url = url.to_string();
    Ok(())
}

fn create_var_from(step: &mut Step, args: &str) -> Result<(), ParseError> {
    let arg: VarFromArg = parse_json("varfrom", args)?;
    if arg.from.is_empty() {
        return Err(missing("varfrom", "FROM", args));
    }
    if arg.name.is_empty() {
        return Err(missing("varfrom", "NAME", args));
    }
    if arg.find.is_empty() {
        return Err(missing("varfrom", "FIND", args));
    }
    let from = VarSource::parse(&arg.from).ok_or_else(|| ParseError::BadVarFromSource {
        raw: args.to_string(),
    })?;

    let pattern = search_pattern(&arg.find);
    step.var_from.push(VarFrom {
        from,
        name: arg.name,
        find: arg.find,
        pattern,
    });
    Ok(())
}

fn create_header(step: &mut Step, args: &str) -> Result<(), ParseError> {
    let header: Header = parse_json("header", args)?;
    if header.name.is_empty() {
        return Err(missing("header", "NAME", args));
    }
    if header.value.is_empty() {
        return Err(missing("header", "VALUE", args));
    }
    step.headers.push(header);
    Ok(())
}

fn create_auth(step: &mut Step, args: &str) -> Result<(), ParseError> {
    let auth: BasicAuth = parse_json("auth", args)?;
    if auth.username.is_empty() {
        return Err(missing("auth", "USERNAME", args));
    }
    if auth.password.is_empty() {
        return Err(missing("auth", "PASSWORD", args));
    }
    step.auth = Some(auth);
    Ok(())
}

fn create_if(step: &mut Step, args: &str) -> Result<(), ParseError> {
    let arg: ConditionArg = parse_json("if", args)?;
    if arg.r#type.is_empty() {
        return Err(missing("if", "TYPE", args));
    }
    if arg.var1.is_empty() {
        return Err(missing("if", "VAR1", args));
    }
    if arg.var2.is_empty() && arg.r#type != "exists" {
        return Err(missing("if", "VAR2", args));
    }

    let kind =
        ConditionKind::parse(&arg.r#type).ok_or_else(|| ParseError::UnsupportedConditionType {
            raw: args.to_string(),
        })?;
    step.conditions.push(Condition {
        kind,
        var1: arg.var1,
        var2: arg.var2,
    });
    Ok(())
}

fn parse_json<T: for<'de> Deserialize<'de>>(
    keyword: &'static str,
    args: &str,
) -> Result<T, ParseError> {
    serde_json::from_str(args).map_err(|_| ParseError::BadJson {
        keyword,
        raw: args.to_string(),
    })
}

fn missing(keyword: &'static str, field: &'static str, args: &str) -> ParseError {
    ParseError::MissingField {
        keyword,
        field,
        raw: args.to_string(),
    }
}
