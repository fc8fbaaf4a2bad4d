//! Dispatch of polymorphic wire objects onto closed Rust enums.
//!
//! A polymorphic type declares its shapes once, in priority order. Each
//! shape names the `object` discriminator it answers to and a structural
//! signature used only when the payload carries no discriminator. The first
//! matching shape decodes the payload; if that decode fails the whole
//! decode fails, so a structurally similar shape later in the list can
//! never shadow the right one.

use serde_json::{Map, Value};

use crate::error::CodecError;

/// Wire field carrying the discriminator.
pub const TAG_FIELD: &str = "object";

/// One named shape of a polymorphic type `T`.
pub struct VariantShape<T> {
    /// Value of the `object` discriminator for this shape.
    pub tag: &'static str,
    /// Structural test for payloads without a discriminator.
    pub signature: fn(&Map<String, Value>) -> bool,
    pub decode: fn(Value) -> Result<T, serde_json::Error>,
}

/// Decode `value` as the first declared shape that matches it.
pub fn decode_variant<T>(
    type_name: &'static str,
    value: Value,
    shapes: &[VariantShape<T>],
) -> Result<T, CodecError> {
    let Value::Object(map) = &value else {
        return Err(CodecError::NotAnObject(type_name));
    };

    // A `null` discriminator counts as absent; any other non-string is a
    // tag no shape can answer to.
    let tag = match map.get(TAG_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(tag)) => Some(tag.clone()),
        Some(other) => {
            return Err(CodecError::UnknownVariant {
                type_name,
                tag: Some(other.to_string()),
            })
        }
    };
    let shape = match &tag {
        Some(tag) => shapes.iter().find(|s| s.tag == tag.as_str()),
        None => shapes.iter().find(|s| (s.signature)(map)),
    };

    match shape {
        Some(shape) => Ok((shape.decode)(value)?),
        None => Err(CodecError::UnknownVariant { type_name, tag }),
    }
}

/// Insert the discriminator into an already-encoded shape.
pub fn with_tag(mut value: Value, tag: &'static str) -> Value {
    if let Value::Object(map) = &mut value {
        map.insert(TAG_FIELD.to_string(), Value::String(tag.to_string()));
    }
    value
}

/// Signature helper: every named key is present.
pub fn has_keys(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().all(|k| map.contains_key(*k))
}
