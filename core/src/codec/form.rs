//! Flattening of semantic values into form parameters.
//!
//! Values are first serialized to the wire tree, then walked depth-first.
//! Objects contribute one bracket segment per level, `null` contributes
//! nothing, and lists follow the `ListStyle` their owning type declares.

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use super::naming::wire_key;
use crate::error::CodecError;

/// How a list-valued field is spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// `items[0]=a&items[1]=b`
    Indexed,
    /// `expand[]=a&expand[]=b`
    Repeated,
}

/// A value that can be sent as a form-encoded body.
pub trait FormEncode: Serialize {
    /// List spelling for the field at `param` (its bracketed wire key).
    fn list_style(_param: &str) -> ListStyle {
        ListStyle::Indexed
    }
}

/// Ordered form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value recorded under `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append all of `other`'s pairs.
    pub fn extend(&mut self, other: FormParams) {
        self.0.extend(other.0);
    }

    /// `application/x-www-form-urlencoded` rendering.
    pub fn to_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl IntoIterator for FormParams {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Flatten `value` into form parameters.
///
/// The top level must serialize to an object; scalars and lists have no
/// key to live under.
pub fn encode_form<T: FormEncode>(value: &T) -> Result<FormParams, CodecError> {
    let tree = serde_json::to_value(value)?;
    let Value::Object(map) = tree else {
        return Err(CodecError::Form(format!(
            "top-level value must be an object, got {}",
            kind_of(&tree)
        )));
    };

    let mut params = FormParams::new();
    let mut path = Vec::new();
    for (key, child) in &map {
        path.push(key.clone());
        flatten::<T>(&mut path, child, &mut params);
        path.pop();
    }
    Ok(params)
}

fn flatten<T: FormEncode>(path: &mut Vec<String>, value: &Value, out: &mut FormParams) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push(wire_key(path.as_slice()), b.to_string()),
        Value::Number(n) => out.push(wire_key(path.as_slice()), n.to_string()),
        Value::String(s) => out.push(wire_key(path.as_slice()), s.clone()),
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                flatten::<T>(path, child, out);
                path.pop();
            }
        }
        Value::Array(items) => {
            let style = T::list_style(&wire_key(path.as_slice()));
            for (i, item) in items.iter().enumerate() {
                match style {
                    ListStyle::Indexed => path.push(i.to_string()),
                    ListStyle::Repeated => path.push(String::new()),
                }
                flatten::<T>(path, item, out);
                path.pop();
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
