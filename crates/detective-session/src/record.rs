//! Session record encoding.
//!
//! The store only holds flat string fields, while sessions carry rich values
//! (analysis text, chat history lists, option maps). Each field is written
//! with an explicit type tag so decoding never has to guess:
//!
//! | stored text  | decoded as                               |
//! |--------------|------------------------------------------|
//! | `s:<text>`   | string `<text>`                          |
//! | `j:<json>`   | parsed JSON (list, map, number, ...)     |
//! | anything else| legacy untagged value, see [`decode_field`] |

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::store::FieldMap;

/// Decoded session data, keyed by field name.
pub type SessionData = BTreeMap<String, Value>;

/// Path of the session's primary uploaded asset.
pub const FILEPATH: &str = "filepath";
/// Original name of the uploaded file.
pub const FILENAME: &str = "filename";
/// Text produced by the analysis run.
pub const ANALYSIS_RESULT: &str = "analysis_result";
/// Kind of analysis requested.
pub const ANALYSIS_TYPE: &str = "analysis_type";
/// Free-form focus supplied by the user.
pub const USER_FOCUS: &str = "user_focus";
/// Conversation so far, a list of `{"user": ..}` / `{"ai": ..}` objects.
pub const CHAT_HISTORY: &str = "chat_history";

const TEXT_TAG: &str = "s:";
const JSON_TAG: &str = "j:";

/// Generate a fresh session id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Flatten session data into tagged string fields.
pub fn encode(data: &SessionData) -> FieldMap {
    data.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Rebuild session data from stored fields.
pub fn decode(fields: &FieldMap) -> SessionData {
    fields
        .iter()
        .map(|(key, raw)| (key.clone(), decode_field(raw)))
        .collect()
}

/// Encode a single value.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{TEXT_TAG}{s}"),
        other => format!("{JSON_TAG}{other}"),
    }
}

/// Decode a single stored field.
///
/// A `j:` payload that fails to parse is kept as the raw stored text rather
/// than dropped. Untagged text predates the tagged format: it is parsed as
/// JSON only when it starts with `[` or `{` and parses cleanly, otherwise it
/// stays a string.
pub fn decode_field(raw: &str) -> Value {
    if let Some(text) = raw.strip_prefix(TEXT_TAG) {
        return Value::String(text.to_string());
    }

    if let Some(json) = raw.strip_prefix(JSON_TAG) {
        return serde_json::from_str(json).unwrap_or_else(|_| Value::String(raw.to_string()));
    }

    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if value.is_array() || value.is_object() {
                return value;
            }
        }
    }

    Value::String(raw.to_string())
}

/// Primary upload path recorded in the session, if any.
pub fn filepath(data: &SessionData) -> Option<PathBuf> {
    match data.get(FILEPATH)? {
        Value::String(s) if !s.is_empty() => Some(PathBuf::from(s)),
        _ => None,
    }
}
