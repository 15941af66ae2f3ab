//! Opt-in `serde::Serialize` for `Node`, behind the `serde` feature (spec's
//! ambient-stack addition: callers that want to hand a query result to the
//! wider serde ecosystem rather than call `.string()`).
//!
//! There's no `Deserialize` counterpart — a `Node` is a view over a parsed
//! document's byte buffer, not a value serde can construct from scratch.

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

use crate::node::{Node, Type};

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.kind() {
            Type::Object => {
                let keys = self.keys();
                let mut map = serializer.serialize_map(Some(keys.len()))?;
                for key in keys {
                    map.serialize_entry(&key, &self.get(&key))?;
                }
                map.end()
            }
            Type::Array => {
                let elems = self.array_value().unwrap_or_default();
                let mut seq = serializer.serialize_seq(Some(elems.len()))?;
                for elem in &elems {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            Type::String => serializer.serialize_str(&self.string_value().unwrap_or_default()),
            Type::Number => match self.int() {
                Some(i) if self.raw_float().fract() == 0.0 => serializer.serialize_i64(i),
                _ => serializer.serialize_f64(self.raw_float()),
            },
            Type::Bool => serializer.serialize_bool(self.bool_value().unwrap_or(false)),
            Type::Null => serializer.serialize_unit(),
            Type::Invalid => Err(serde::ser::Error::custom(
                self.error().map(|e| e.to_string()).unwrap_or_else(|| "invalid node".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn object_serializes_as_a_map() {
        let root = Root::parse(br#"{"a":1,"b":"x"}"#.to_vec()).unwrap();
        let v = serde_json::to_value(root.node()).unwrap();
        assert_eq!(v, serde_json::json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn array_serializes_as_a_sequence() {
        let root = Root::parse(br#"[1,2.5,"s",true,null]"#.to_vec()).unwrap();
        let v = serde_json::to_value(root.node()).unwrap();
        assert_eq!(v, serde_json::json!([1, 2.5, "s", true, null]));
    }

    #[test]
    fn invalid_node_fails_to_serialize() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let missing = root.node().get("missing");
        assert!(serde_json::to_value(&missing).is_err());
    }
}
