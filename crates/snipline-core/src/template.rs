//! `{{name}}` placeholder substitution.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Placeholder bound to the captured text.
pub const TEXT: &str = "text";
/// Placeholder bound to the RFC 3339 request time.
pub const TIMESTAMP: &str = "timestamp";
/// Placeholder bound to the locale-formatted date.
pub const DATE: &str = "date";
/// Placeholder bound to the locale-formatted time.
pub const TIME: &str = "time";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid placeholder regex"))
}

/// Replace every `{{name}}` whose name is bound in `vars`.
///
/// Unbound placeholders are left as-is. Substitution is a single pass, so
/// placeholder syntax inside a bound value is not expanded.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Shorthand for rendering with only `{{text}}` bound.
pub fn render_text(template: &str, text: &str) -> String {
    let vars = HashMap::from([(TEXT, text)]);
    render(template, &vars)
}

/// True if `s` contains at least one `{{name}}` token.
pub fn has_placeholder(s: &str) -> bool {
    placeholder_regex().is_match(s)
}
