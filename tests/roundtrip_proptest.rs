//! Property 1 (round-trip cleanness): `Parse(J).String()` parses back to a
//! structurally equal document, and the output is idempotent under a second
//! `String().Parse().String()` cycle.

use proptest::prelude::*;

use xjson::{Node, Root};

#[derive(Debug, Clone)]
enum Json {
    Null,
    Bool(bool),
    Number(i64),
    Str(String),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

fn json_strategy() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i16>().prop_map(|n| Json::Number(n as i64)),
        "[a-z]{0,8}".prop_map(Json::Str),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Json::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(Json::Object),
        ]
    })
}

fn render(j: &Json) -> String {
    match j {
        Json::Null => "null".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::Str(s) => format!("{:?}", s),
        Json::Array(items) => {
            let parts: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", parts.join(","))
        }
        Json::Object(entries) => {
            let mut dedup: Vec<(String, Json)> = Vec::new();
            for (k, v) in entries {
                if let Some(slot) = dedup.iter_mut().find(|(ek, _)| ek == k) {
                    slot.1 = v.clone();
                } else {
                    dedup.push((k.clone(), v.clone()));
                }
            }
            let parts: Vec<String> = dedup
                .iter()
                .map(|(k, v)| format!("{:?}:{}", k, render(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

fn same_shape(a: &Node, b: &Node) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    use xjson::Type;
    match a.kind() {
        Type::Object => {
            let mut ak = a.keys();
            let mut bk = b.keys();
            ak.sort();
            bk.sort();
            ak == bk && ak.iter().all(|k| same_shape(&a.get(k), &b.get(k)))
        }
        Type::Array => {
            let av = a.must_array();
            let bv = b.must_array();
            av.len() == bv.len() && av.iter().zip(bv.iter()).all(|(x, y)| same_shape(x, y))
        }
        Type::Null | Type::Invalid => true,
        Type::Bool => a.bool_value() == b.bool_value(),
        Type::Number => a.float() == b.float(),
        Type::String => a.string_value() == b.string_value(),
    }
}

proptest! {
    #[test]
    fn round_trip_preserves_shape(doc in json_strategy()) {
        let text = render(&doc);
        let root = Root::parse(text.clone().into_bytes()).unwrap();
        let once = root.node().string();
        let reparsed = Root::parse(once.clone().into_bytes()).unwrap();
        prop_assert!(same_shape(root.node(), reparsed.node()));

        let twice = reparsed.node().string();
        prop_assert_eq!(once, twice);
    }
}
