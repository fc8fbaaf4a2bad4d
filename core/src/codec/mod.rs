//! Bidirectional mapping between semantic values and the wire.
//!
//! # Design
//! The wire tree is `serde_json::Value`; semantic values are ordinary serde
//! types. Field policy is declared on the types with serde attributes so
//! it reads next to the field it governs:
//!
//! - optional fields: `#[serde(default, skip_serializing_if = "Option::is_none")]`,
//!   so a missing field and an explicit `null` both decode to `None`, and
//!   `None` is never sent;
//! - empty-as-absent fields additionally use
//!   `deserialize_with = "codec::empty_as_absent"`, collapsing `{}`, `[]`
//!   and `""` to `None` as well;
//! - timestamps use `chrono::serde::ts_seconds` (integer seconds, UTC);
//! - polymorphic fields are closed enums dispatched by `decode_variant`.
//!
//! No decode ever substitutes a default for unexpected data: unknown enum
//! members, unknown variant tags and missing required fields all fail.

pub mod form;
pub mod naming;
pub mod variant;

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use form::{encode_form, FormEncode, FormParams, ListStyle};
pub use variant::{decode_variant, VariantShape};

use crate::error::CodecError;

/// Encode a semantic value to the wire tree.
pub fn encode_to_wire<T: Serialize>(value: &T) -> Result<Value, CodecError> {
    Ok(serde_json::to_value(value)?)
}

/// Decode a semantic value from the wire tree.
pub fn decode_from_wire<T: DeserializeOwned>(tree: Value) -> Result<T, CodecError> {
    Ok(serde_json::from_value(tree)?)
}

/// Whether a wire value counts as absent for empty-as-absent fields.
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// `deserialize_with` helper for empty-as-absent optional fields.
///
/// Pair with `#[serde(default)]` so a missing field also yields `None`.
pub fn empty_as_absent<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if is_absent(&value) {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(D::Error::custom)
}

/// Wire tag carried by every list object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListTag;

impl Serialize for ListTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("list")
    }
}

impl<'de> Deserialize<'de> for ListTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == "list" {
            Ok(ListTag)
        } else {
            Err(D::Error::custom(format!("expected object tag \"list\", found {tag:?}")))
        }
    }
}

/// One page of a list resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct List<T> {
    #[serde(rename = "object")]
    tag: ListTag,
    pub url: String,
    /// More elements exist beyond this page.
    pub has_more: bool,
    pub data: Vec<T>,
}

impl<T> List<T> {
    pub fn new(url: impl Into<String>, has_more: bool, data: Vec<T>) -> Self {
        Self {
            tag: ListTag,
            url: url.into(),
            has_more,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T> IntoIterator for List<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// A related object that is either referenced by id or expanded inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Expandable::Object(_))
    }
}

impl<T: Serialize> Serialize for Expandable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expandable::Id(id) => serializer.serialize_str(id),
            Expandable::Object(object) => object.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Expandable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(id) => Ok(Expandable::Id(id)),
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(|object| Expandable::Object(Box::new(object)))
                .map_err(D::Error::custom),
            _ => Err(D::Error::custom("expected an id string or an expanded object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tagged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "empty_as_absent"
        )]
        labels: Option<Vec<String>>,
        #[serde(with = "chrono::serde::ts_seconds")]
        created: DateTime<Utc>,
    }

    #[test]
    fn missing_null_and_empty_collapse_to_none() {
        for wire in [
            json!({"created": 0}),
            json!({"created": 0, "labels": null}),
            json!({"created": 0, "labels": []}),
        ] {
            let decoded: Tagged = decode_from_wire(wire.clone()).unwrap();
            assert_eq!(decoded.labels, None, "{wire}");
        }
    }

    #[test]
    fn plain_optional_keeps_empty_string() {
        // Only declared fields collapse empties.
        let decoded: Tagged = decode_from_wire(json!({"created": 0, "note": ""})).unwrap();
        assert_eq!(decoded.note.as_deref(), Some(""));
    }

    #[test]
    fn non_empty_collection_is_present() {
        let decoded: Tagged = decode_from_wire(json!({"created": 0, "labels": ["a"]})).unwrap();
        assert_eq!(decoded.labels, Some(vec!["a".to_string()]));
    }

    #[test]
    fn timestamp_round_trips_to_the_second() {
        let decoded: Tagged = decode_from_wire(json!({"created": 1475761243})).unwrap();
        let expected = Utc.with_ymd_and_hms(2016, 10, 6, 13, 40, 43).unwrap();
        assert_eq!(decoded.created, expected);
        assert_eq!(decoded.created.to_rfc3339(), "2016-10-06T13:40:43+00:00");

        let wire = encode_to_wire(&decoded).unwrap();
        assert_eq!(wire["created"], json!(1475761243));
    }

    #[test]
    fn absent_fields_are_not_encoded() {
        let value = Tagged {
            note: None,
            labels: None,
            created: Utc.timestamp_opt(1, 0).unwrap(),
        };
        assert_eq!(encode_to_wire(&value).unwrap(), json!({"created": 1}));
    }

    #[test]
    fn list_preserves_has_more() {
        let wire = json!({
            "object": "list",
            "url": "/v1/charges",
            "has_more": true,
            "data": [1, 2, 3]
        });
        let list: List<u32> = decode_from_wire(wire.clone()).unwrap();
        assert!(list.has_more);
        assert_eq!(list.data, vec![1, 2, 3]);
        assert_eq!(encode_to_wire(&list).unwrap(), wire);
    }

    #[test]
    fn list_rejects_other_tags() {
        let err = decode_from_wire::<List<u32>>(json!({
            "object": "search_result",
            "url": "/v1/charges/search",
            "has_more": false,
            "data": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("search_result"));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Owner {
        id: String,
        email: String,
    }

    #[test]
    fn expandable_accepts_id_or_object() {
        let id: Expandable<Owner> = decode_from_wire(json!("cus_123")).unwrap();
        assert_eq!(id, Expandable::Id("cus_123".to_string()));
        assert!(!id.is_expanded());

        let expanded: Expandable<Owner> =
            decode_from_wire(json!({"id": "cus_123", "email": "a@b.c"})).unwrap();
        assert_eq!(expanded.as_object().map(|o| o.email.as_str()), Some("a@b.c"));

        assert!(decode_from_wire::<Expandable<Owner>>(json!(42)).is_err());
    }
}
