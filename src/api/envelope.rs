//! Response envelope decoding for list endpoints.
//!
//! The backend wraps collections under different keys depending on the
//! endpoint and version (`{"data": [...]}` or `{"messages": [...]}`). Keys are
//! tried in a fixed order and the first one holding an array wins. A body with
//! none of them decodes to an empty collection rather than an error.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// Accepted collection keys, in priority order
pub const LIST_KEYS: [&str; 2] = ["data", "messages"];

/// Decode a list envelope using [`LIST_KEYS`]
pub fn decode_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ClientError> {
    decode_list_with(body, &LIST_KEYS)
}

/// Decode a list envelope trying `keys` in order
pub fn decode_list_with<T: DeserializeOwned>(
    body: Value,
    keys: &[&str],
) -> Result<Vec<T>, ClientError> {
    let Value::Object(mut map) = body else {
        return Ok(Vec::new());
    };

    for key in keys {
        if let Some(Value::Array(items)) = map.remove(*key) {
            return items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item)
                        .map_err(|e| ClientError::Decode(format!("{}: {}", key, e)))
                })
                .collect();
        }
    }

    Ok(Vec::new())
}
