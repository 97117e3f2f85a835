use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown keyword `{keyword}`")]
    UnknownKeyword { keyword: String },

    #[error("{keyword} was declared but its argument is not valid JSON. Raw: {raw}")]
    BadJson { keyword: &'static str, raw: String },

    #[error("{keyword} was declared but {field} was not supplied. Raw: {raw}")]
    MissingField {
        keyword: &'static str,
        field: &'static str,
        raw: String,
    },

    #[error("{method} was declared but URL was not supplied. Raw: {raw}")]
    MissingUrl { method: &'static str, raw: String },

    #[error("for needs the form `for VARNAME in VALUES`. Raw: {raw}")]
    BadForSyntax { raw: String },

    #[error("nested FOR loops are not supported. Raw: {raw}")]
    NestedFor { raw: String },

    #[error("for was declared but its values are not a JSON string array. Raw: {raw}")]
    BadForValues { raw: String },

    #[error("for statement without a forend")]
    ForWithoutForend,

    #[error("forend statement without a for")]
    ForendWithoutFor,

    #[error("varfrom was declared but FROM must be BODY or HEADER. Raw: {raw}")]
    BadVarFromSource { raw: String },

    #[error(
        "if was declared but the supplied TYPE is not supported \
         (supported: exists, equals, greater, less, true, false). Raw: {raw}"
    )]
    UnsupportedConditionType { raw: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),
}
