//! Typed views over pushed payloads.
//!
//! The connection moves events as raw JSON. When the `tracing` feature is
//! enabled, turning them into typed values also reports fields the client does
//! not know about and the exact path of any field that fails to parse, so
//! server-side schema drift shows up in logs instead of as silent data loss.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize `value` as `T`, logging unknown fields and failure paths.
#[cfg(feature = "tracing")]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    use std::any::type_name;

    let original = value.clone();
    let mut unknown_paths: Vec<String> = Vec::new();

    let result: T = serde_ignored::deserialize(value, |path| {
        unknown_paths.push(path.to_string());
    })
    .inspect_err(|_| {
        // Second pass only to learn where it broke
        let path_result: Result<T, _> = serde_path_to_error::deserialize(original.clone());
        if let Err(path_err) = path_result {
            let path = path_err.path().to_string();
            tracing::error!(
                type_name = %type_name::<T>(),
                %path,
                value = %format_value(lookup_value(&original, &path)),
                error = %path_err.inner(),
                "event deserialization failed"
            );
        }
    })?;

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            value = %format_value(lookup_value(&original, &path)),
            "unknown field in pushed event"
        );
    }

    Ok(result)
}

/// Pass-through deserialization when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Follow a `serde_ignored`/`serde_path_to_error` path (`data[3].media.cdn`,
/// `data.3.media.cdn`, `?` for options) into `value`.
#[cfg(feature = "tracing")]
fn lookup_value<'value>(value: &'value Value, path: &str) -> Option<&'value Value> {
    path.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty() && *segment != "?")
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
            _ => None,
        })
}

#[cfg(feature = "tracing")]
fn format_value(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unable to retrieve>".to_owned(), Value::to_string)
}
