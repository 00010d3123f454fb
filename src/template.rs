//! `{name}` placeholder interpolation for URL templates.
//!
//! Substituted values are percent-encoded; placeholders whose name is absent
//! from the parameter map are left literal. Silent pass-through is the
//! documented contract - callers must pre-validate required parameters.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern"));

/// Replaces every `{name}` in `template` whose name is present in `params`
/// with the percent-encoded parameter value.
///
/// There is no escaping syntax for literal braces; a placeholder with no
/// matching parameter passes through unchanged.
///
/// ## Examples
///
/// ```
/// use std::collections::HashMap;
/// use api_client::template::interpolate;
///
/// let params = HashMap::from([("id".to_string(), "42".to_string())]);
/// assert_eq!(interpolate("/users/{id}", &params), "/users/42");
/// assert_eq!(interpolate("/users/{missing}", &params), "/users/{missing}");
/// ```
pub fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => urlencoding::encode(value).into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Returns `true` if `template` is already absolute and must not be joined
/// onto the client's base URL.
pub(crate) fn is_absolute(template: &str) -> bool {
    template.starts_with("http://") || template.starts_with("https://")
}
