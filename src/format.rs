//! Normalizes captured headers, forms, and bodies to `serde_json::Value`
//! so the log sink can treat every dumped section uniformly, and strips
//! hidden fields along the way.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::DumpError;

/// Case-insensitive set of field names omitted from dumped output.
#[derive(Debug, Clone, Default)]
pub struct HiddenFields {
    names: Vec<String>,
}

impl HiddenFields {
    pub fn insert(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|hidden| name.eq_ignore_ascii_case(hidden))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for HiddenFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fields = Self::default();
        for name in iter {
            fields.insert(name.as_ref());
        }
        fields
    }
}

/// Parses `bytes` as JSON and removes hidden top-level fields.
pub fn json_from_bytes(bytes: &[u8], hidden: &HiddenFields) -> Result<Value, DumpError> {
    let value = serde_json::from_slice(bytes).map_err(DumpError::Decode)?;
    Ok(redact(value, hidden))
}

/// Removes every top-level key that case-insensitively matches a hidden
/// field. Non-mapping values (arrays, scalars) pass through unchanged, and
/// nested objects are not descended into.
pub fn redact(mut value: Value, hidden: &HiddenFields) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|key, _| !hidden.matches(key));
    }
    value
}

/// Re-serializes a typed value (header map, parsed form) into the generic
/// JSON model, then redacts it.
pub fn to_redacted_json<T: Serialize>(value: &T, hidden: &HiddenFields) -> Result<Value, DumpError> {
    let value = serde_json::to_value(value).map_err(DumpError::Encode)?;
    Ok(redact(value, hidden))
}

/// Header map as a name -> list-of-values mapping. Non-UTF-8 header values
/// are rendered lossily rather than dropped.
pub fn headers_to_json(headers: &HeaderMap, hidden: &HiddenFields) -> Result<Value, DumpError> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        grouped
            .entry(name.as_str().to_owned())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    to_redacted_json(&grouped, hidden)
}

/// URL-encoded form body as a key -> array-of-values mapping, preserving
/// the order of repeated keys.
pub fn form_to_json(bytes: &[u8], hidden: &HiddenFields) -> Result<Value, DumpError> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        grouped.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    to_redacted_json(&grouped, hidden)
}

/// Shortens every string leaf to at most `max` characters.
pub fn truncate_strings(value: Value, max: usize) -> Value {
    match value {
        Value::String(text) => Value::String(truncate(text, max)),
        Value::Array(items) => Value::Array(
            items.into_iter().map(|item| truncate_strings(item, max)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(key, item)| (key, truncate_strings(item, max))).collect(),
        ),
        other => other,
    }
}

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use serde_json::json;

    fn hidden(names: &[&str]) -> HiddenFields {
        names.iter().collect()
    }

    #[test]
    fn redaction_is_case_insensitive() {
        for key in ["Cookie", "COOKIE", "cookie"] {
            let value = json!({ key: "abc=1", "host": "example.com" });
            let redacted = redact(value, &hidden(&["cookie"]));
            assert_eq!(redacted, json!({"host": "example.com"}));
        }
    }

    #[test]
    fn non_mappings_pass_through_unchanged() {
        let fields = hidden(&["secret"]);
        for value in [json!(["secret", 1]), json!("secret"), json!(42), json!(null)] {
            assert_eq!(redact(value.clone(), &fields), value);
        }
    }

    #[test]
    fn redaction_is_top_level_only() {
        let value = json!({"outer": {"cookie": "abc=1"}});
        let redacted = redact(value.clone(), &hidden(&["cookie"]));
        assert_eq!(redacted, value);
    }

    #[test]
    fn json_round_trips_through_the_generic_model() {
        let original = json!({
            "string": "text",
            "number": 7,
            "nested": {"list": [1, 2, 3], "flag": true},
            "null": null,
        });
        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded = json_from_bytes(&bytes, &HiddenFields::default()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn malformed_json_reports_decode_error() {
        let err = json_from_bytes(b"{not json", &HiddenFields::default()).unwrap_err();
        assert!(matches!(err, DumpError::Decode(_)));
    }

    #[test]
    fn headers_group_repeated_names() {
        let mut headers = HeaderMap::new();
        headers.append(HeaderName::from_static("accept"), HeaderValue::from_static("text/html"));
        headers.append(HeaderName::from_static("accept"), HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static("host"), HeaderValue::from_static("example.com"));

        let value = headers_to_json(&headers, &HiddenFields::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "accept": ["text/html", "application/json"],
                "host": ["example.com"],
            })
        );
    }

    #[test]
    fn hidden_headers_are_removed_in_any_case() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("cookie"), HeaderValue::from_static("abc=1"));
        headers.insert(HeaderName::from_static("host"), HeaderValue::from_static("example.com"));

        let value = headers_to_json(&headers, &hidden(&["Cookie"])).unwrap();
        let map = value.as_object().unwrap();
        assert!(map.keys().all(|key| !key.eq_ignore_ascii_case("cookie")));
        assert!(map.contains_key("host"));
    }

    #[test]
    fn form_preserves_repeated_keys_in_order() {
        let value = form_to_json(b"foo=bar&foo=bar2&bar=baz", &HiddenFields::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "foo": ["bar", "bar2"],
                "bar": ["baz"],
            })
        );
    }

    #[test]
    fn form_redacts_hidden_fields() {
        let value = form_to_json(b"password=hunter2&user=alice", &hidden(&["PASSWORD"])).unwrap();
        assert_eq!(value, json!({"user": ["alice"]}));
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let value = json!({"text": "héllo wörld", "nested": ["αβγδε"]});
        let truncated = truncate_strings(value, 4);
        assert_eq!(truncated, json!({"text": "héll", "nested": ["αβγδ"]}));
    }

    #[test]
    fn truncation_leaves_short_strings_alone() {
        let value = json!({"text": "ok", "number": 12345});
        assert_eq!(truncate_strings(value.clone(), 10), value);
    }
}
