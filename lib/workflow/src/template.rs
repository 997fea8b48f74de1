//! `{{path}}` template interpolation against execution context.
//!
//! Message content, HTTP URLs/bodies, and email/SMS fields are templates.
//! Placeholders name a dot-separated path into the context object
//! (e.g. `{{message}}`, `{{nodes.http.body.quote_id}}`). A placeholder
//! whose path does not resolve renders as the empty string.

use serde_json::Value as JsonValue;

/// Looks up a dot-separated path in a JSON value.
///
/// Returns `None` if any path segment is missing or traverses a
/// non-object.
#[must_use]
pub fn lookup_path<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = root;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Renders a template, replacing every `{{path}}` placeholder with the
/// textual form of the context value at that path.
#[must_use]
pub fn render(template: &str, context: &JsonValue) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                if let Some(value) = lookup_path(context, path) {
                    out.push_str(&value_to_text(value));
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder is kept verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Converts a JSON value to the text form used in rendered templates.
///
/// Strings render without quotes; objects and arrays render as compact
/// JSON; null renders as the empty string.
#[must_use]
pub fn value_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
