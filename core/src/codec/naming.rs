//! Parameter naming at the wire boundary.
//!
//! Nested values are addressed on the wire with bracket syntax
//! (`legal_entity[address][city]`) and in memory with dotted field paths
//! (`legal_entity.address.city`). `wire_key` is the only place bracket keys
//! are built; `field_path` inverts it for error reporting.

/// Join path segments into a bracket-qualified form key.
///
/// An empty segment renders as `[]`, the repeated-list suffix.
pub fn wire_key<S: AsRef<str>>(segments: &[S]) -> String {
    let mut key = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if i == 0 {
            key.push_str(segment);
        } else {
            key.push('[');
            key.push_str(segment);
            key.push(']');
        }
    }
    key
}

/// Convert a wire parameter name to a dotted field path.
///
/// `legal_entity[address][city]` becomes `legal_entity.address.city`;
/// `items[0][price]` becomes `items.0.price`. Repeated-list brackets (`[]`)
/// are dropped.
pub fn field_path(param: &str) -> String {
    let mut path = String::with_capacity(param.len());
    for part in param.split(|c| c == '[' || c == ']') {
        if part.is_empty() {
            continue;
        }
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(part);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_key() {
        assert_eq!(
            wire_key(&["legal_entity", "address", "city"]),
            "legal_entity[address][city]"
        );
        assert_eq!(wire_key(&["amount"]), "amount");
        assert_eq!(wire_key(&["expand", ""]), "expand[]");
    }

    #[test]
    fn field_path_inverts_wire_key() {
        assert_eq!(field_path("legal_entity[address][city]"), "legal_entity.address.city");
        assert_eq!(field_path("items[0][price]"), "items.0.price");
        assert_eq!(field_path("expand[]"), "expand");
        assert_eq!(field_path("amount"), "amount");
    }

    #[test]
    fn field_path_of_built_key_is_the_dotted_segments() {
        for segments in [&["legal_entity", "dob", "day"][..], &["metadata", "order_id"][..], &["currency"][..]] {
            assert_eq!(field_path(&wire_key(segments)), segments.join("."));
        }
    }
}
