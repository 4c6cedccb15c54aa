//! Default user prompt and in-place parameter refresh.
//!
//! When parameters are confirmed, an empty user prompt is replaced by the
//! rendered default; a non-empty one keeps its text and only gets its
//! parameter-bearing lines rewritten.

use super::params::ConversionParameters;
use crate::error::Result;
use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const UNSPECIFIED: &str = "(unspecified)";

const DEFAULT_USER_PROMPT: &str = "\
You are a professional SQL rewriter.
Goal:
- Convert the input SQL from [{{ source_format }}] to [{{ destination_format }}].
- Target schema: {{ target_schema }}
- Target dialect: {{ dialect }}
Output requirements:
1) Output only the converted SQL (no explanations, no Markdown).
2) Keep the semantics equivalent; rewrite incompatible syntax sensibly.
3) Keep comments, partitioning, constraints and defaults where the target supports them.
4) When a difference cannot be avoided, explain it in a SQL comment.";

static FORMAT_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(from\s*\[)[^\]]*(\]\s*to\s*\[)[^\]]*(\])").expect("valid format pair regex")
});

static SCHEMA_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(\s*-?\s*target[ _]schema\s*:\s*).*$").expect("valid schema line regex")
});

static DIALECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(\s*-?\s*target dialect\s*:\s*).*$").expect("valid dialect line regex")
});

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Renders the default user prompt for `params`.
pub fn default_user_prompt(params: &ConversionParameters) -> Result<String> {
    let env = Environment::new();
    let template = env.template_from_str(DEFAULT_USER_PROMPT)?;
    let rendered = template.render(context! {
        source_format => or_placeholder(&params.source_format, "source format"),
        destination_format => or_placeholder(&params.destination_format, "destination format"),
        target_schema => or_placeholder(&params.target_schema, UNSPECIFIED),
        dialect => or_placeholder(&params.destination_sql_language, UNSPECIFIED),
    })?;
    Ok(rendered)
}

/// Rewrites the parameter-bearing lines of `prompt` with `params`.
pub fn refresh_user_prompt(prompt: &str, params: &ConversionParameters) -> String {
    let source = or_placeholder(&params.source_format, "source format");
    let destination = or_placeholder(&params.destination_format, "destination format");
    let schema = or_placeholder(&params.target_schema, UNSPECIFIED);
    let dialect = or_placeholder(&params.destination_sql_language, UNSPECIFIED);

    let out = FORMAT_PAIR.replace_all(prompt, |caps: &Captures| {
        format!("{}{}{}{}{}", &caps[1], source, &caps[2], destination, &caps[3])
    });
    let out = SCHEMA_LINE.replace_all(&out, |caps: &Captures| format!("{}{}", &caps[1], schema));
    let out = DIALECT_LINE.replace_all(&out, |caps: &Captures| format!("{}{}", &caps[1], dialect));
    out.into_owned()
}

/// Produces the user prompt to keep after parameters are confirmed.
pub fn prepare_user_prompt(current: &str, params: &ConversionParameters) -> Result<String> {
    if current.trim().is_empty() {
        default_user_prompt(params)
    } else {
        Ok(refresh_user_prompt(current, params))
    }
}
