use jdom_core::token::{TokenKind, TokenReader};
use jdom_core::{decoder, from_native, to_native, Node, NodeKind, ObjectNode, RenderStyle};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Assert that parse → render → parse gives back the same tree, in both styles.
fn assert_roundtrip(json: &str) {
    let tree = Node::parse(json).expect("parse failed");
    for style in [RenderStyle::Minified, RenderStyle::Indented] {
        let text = tree.render(style);
        let back = Node::parse(&text).expect("reparse failed");
        assert_eq!(
            tree, back,
            "Roundtrip failed:\n  input JSON: {json}\n  rendered:   {text}"
        );
    }
}

// ============================================================================
// Primitive Roundtrips
// ============================================================================

#[test]
fn roundtrip_null() {
    assert_roundtrip("null");
}

#[test]
fn roundtrip_bools() {
    assert_roundtrip("true");
    assert_roundtrip("false");
}

#[test]
fn roundtrip_numbers() {
    for n in ["0", "-7", "42", "3.14", "-0.5", "1e-7", "2.5E10", "9223372036854775807"] {
        assert_roundtrip(n);
    }
}

#[test]
fn roundtrip_strings_with_escapes() {
    assert_roundtrip(r#""""#);
    assert_roundtrip(r#""line\nbreak \"quoted\" back\\slash \t tab""#);
    assert_roundtrip(r#""\u0001 control \b\f""#);
    assert_roundtrip(r#""café 你好""#);
}

// ============================================================================
// Numeric tags
// ============================================================================

#[test]
fn integer_tag_survives() {
    let back = Node::parse(&Node::Integer(5).to_string()).unwrap();
    assert_eq!(back.kind(), NodeKind::Integer);
}

#[test]
fn double_tag_survives_even_when_integral() {
    let text = Node::Double(5.0).to_string();
    assert_eq!(text, "5.0");
    assert_eq!(Node::parse(&text).unwrap().kind(), NodeKind::Double);
}

#[test]
fn decimal_keeps_digits_a_double_would_lose() {
    let text = "0.30000000000000000000000001";
    let node = Node::parse(text).unwrap();
    assert_eq!(node.kind(), NodeKind::Decimal);
    assert_eq!(node.to_string(), text);
}

#[test]
fn decimal_beyond_i64() {
    let node = Node::from(Decimal::from(u64::MAX));
    let back = Node::parse(&node.to_string()).unwrap();
    assert_eq!(back.kind(), NodeKind::Decimal);
    assert_eq!(back, node);
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn roundtrip_nested() {
    assert_roundtrip(r#"{"a":{"b":[1,{"c":null}],"d":[]},"e":{}}"#);
    assert_roundtrip(r#"[[],[[]],[{}],{"x":[true,false]}]"#);
}

#[test]
fn rendering_preserves_insertion_order() {
    let json = r#"{"z":1,"a":2,"m":{"y":1,"b":2}}"#;
    assert_eq!(Node::parse(json).unwrap().to_string(), json);
}

#[test]
fn undefined_is_dropped_from_objects_and_nulled_in_arrays() {
    let mut obj = ObjectNode::new();
    obj.set("keep", 1).unwrap();
    if let Some(n) = obj.get_mut("keep") {
        *n = Node::Array(vec![Node::Undefined, Node::Null]);
    }
    assert_eq!(obj.to_string(), r#"{"keep":[null,null]}"#);
    assert_eq!(Node::Undefined.to_string(), "null");
}

#[test]
fn indented_style_layout() {
    let obj = ObjectNode::parse(r#"{"a":[1,2],"b":{}}"#).unwrap();
    assert_eq!(
        obj.render(RenderStyle::Indented),
        "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}"
    );
}

#[test]
fn self_reference_round_trips() {
    let mut obj = ObjectNode::new();
    obj.set("v", 1).unwrap();
    obj.set_self_reference("me").unwrap();
    let back = ObjectNode::parse(&obj.to_string()).unwrap();
    assert!(back.is_self_reference("me"));
    assert_eq!(back, obj);
}

// ============================================================================
// Token stream bridge
// ============================================================================

/// A reader over a fixed token script, standing in for an external tokenizer.
struct Script {
    tokens: Vec<(TokenKind, Option<&'static str>)>,
    pos: usize,
}

impl TokenReader for Script {
    fn kind(&self) -> TokenKind {
        self.tokens.get(self.pos).map_or(TokenKind::EndOfInput, |t| t.0)
    }

    fn text(&self) -> Option<&str> {
        self.tokens.get(self.pos).and_then(|t| t.1)
    }

    fn advance(&mut self) -> jdom_core::Result<()> {
        self.pos += 1;
        Ok(())
    }
}

#[test]
fn external_token_stream_builds_a_tree() {
    let mut reader = Script {
        tokens: vec![
            (TokenKind::StartObject, None),
            (TokenKind::PropertyName, Some("n")),
            (TokenKind::Number, Some("1.25")),
            (TokenKind::PropertyName, Some("tags")),
            (TokenKind::StartArray, None),
            (TokenKind::String, Some("x")),
            (TokenKind::True, None),
            (TokenKind::EndArray, None),
            (TokenKind::EndObject, None),
        ],
        pos: 0,
    };
    let node = decoder::read_document(&mut reader).unwrap();
    assert_eq!(node.to_string(), r#"{"n":1.25,"tags":["x",true]}"#);
}

#[test]
fn serde_value_bridge() {
    let node = Node::parse(r#"{"a":[1,2.5,"s"]}"#).unwrap();
    let value = node.to_json().unwrap();
    assert_eq!(value["a"][2], "s");
    assert_eq!(Node::from_json(&value).unwrap(), node);

    let text = serde_json::to_string(&node).unwrap();
    let back: Node = serde_json::from_str(&text).unwrap();
    assert_eq!(back, node);
}

// ============================================================================
// Object mapping
// ============================================================================

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    items: Vec<String>,
    total: f64,
}

#[test]
fn native_round_trip() {
    let order = Order {
        id: 9,
        items: vec!["tea".into(), "cake".into()],
        total: 7.5,
    };
    let node = from_native(&order).unwrap();
    assert_eq!(node.get("id").unwrap().coerce::<i64>().unwrap(), 9);
    assert_eq!(to_native::<Order>(&node).unwrap(), order);
    let obj = node.as_object().unwrap();
    assert_eq!(obj.to_native::<Order>().unwrap(), order);
}
