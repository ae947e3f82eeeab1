//! Deserialization helpers for wire fields with inconsistent shapes.

use serde::{Deserialize, Deserializer};

/// Deserialize a `u32` that may arrive as a native integer or as a numeric
/// string, depending on the server implementation.
pub fn u32_int_or_str<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrStr {
        Int(u32),
        Str(String),
    }

    match IntOrStr::deserialize(deserializer)? {
        IntOrStr::Int(value) => Ok(value),
        IntOrStr::Str(value) => value.parse().map_err(serde::de::Error::custom),
    }
}
