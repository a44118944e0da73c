use chrono::{DateTime, Datelike, Utc};
use jdom_core::{Coercion, DateConvention, DomError, Node, NodeRef, ObjectNode};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn doc() -> ObjectNode {
    ObjectNode::parse(
        r#"{
            "flag": "TrUe",
            "yes": "yes",
            "count": "42",
            "bad": "4x2",
            "whole": 3.0,
            "half": 3.5,
            "big": 18446744073709551615,
            "price": 19.99,
            "nothing": null,
            "when": "2024-03-01T12:30:00Z",
            "epoch": 86400,
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "site": "https://example.com/a?b=c",
            "blob": "aGVsbG8=",
            "bytes": [104, 105],
            "nested": {"k": 1},
            "list": [7, 8]
        }"#,
    )
    .unwrap()
}

// ============================================================================
// Booleans and strings
// ============================================================================

#[test]
fn string_to_bool_is_case_insensitive_literal_match() {
    let d = doc();
    assert!(d.get_value::<bool>("flag").unwrap());
    assert!(matches!(
        d.get_value::<bool>("yes"),
        Err(DomError::WrongKind { expected: "bool", found: "string", .. })
    ));
    assert_eq!(d.try_get_value::<bool>("yes"), None);
}

#[test]
fn bool_and_numbers_to_string() {
    assert_eq!(Node::Bool(false).coerce::<String>().unwrap(), "false");
    assert_eq!(Node::Integer(42).coerce::<String>().unwrap(), "42");
    assert_eq!(doc().get_value::<String>("price").unwrap(), "19.99");
    assert_eq!(doc().get_value::<String>("big").unwrap(), "18446744073709551615");
}

#[test]
fn bool_does_not_read_as_number() {
    assert!(Node::Bool(true).coerce::<i32>().is_err());
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn string_to_number_uses_target_parse() {
    let d = doc();
    assert_eq!(d.get_value::<i32>("count").unwrap(), 42);
    assert_eq!(d.get_value::<f64>("count").unwrap(), 42.0);
    assert!(d.get_value::<i32>("bad").is_err());
    assert_eq!(d.try_get_value::<i32>("bad"), None);
}

#[test]
fn integral_double_reads_as_integer() {
    let d = doc();
    assert_eq!(d.get_value::<i64>("whole").unwrap(), 3);
    assert!(matches!(
        d.get_value::<i64>("half"),
        Err(DomError::WrongKind { expected: "i64", found: "double", .. })
    ));
}

#[test]
fn range_is_checked_per_target() {
    let d = doc();
    assert!(d.get_value::<i64>("big").is_err());
    assert_eq!(d.get_value::<u64>("big").unwrap(), u64::MAX);
    assert!(Node::Integer(70_000).coerce::<i16>().is_err());
    assert!(Node::Integer(-1).coerce::<u64>().is_err());
}

#[test]
fn float_range_is_the_same_for_text_and_numbers() {
    assert!(matches!(
        Node::from("1e40").coerce::<f32>(),
        Err(DomError::WrongKind { .. })
    ));
    assert!(Node::Double(1e40).coerce::<f32>().is_err());
    assert!(Node::from("1e400").coerce::<f64>().is_err());
    assert_eq!(Node::from("1e38").coerce::<f32>().unwrap(), 1e38f32);
    assert_eq!(Node::from("-2.5").coerce::<f64>().unwrap(), -2.5);
}

#[test]
fn decimal_reads() {
    let d = doc();
    assert_eq!(d.get_value::<Decimal>("price").unwrap(), Decimal::new(1999, 2));
    assert_eq!(d.get_value::<Decimal>("count").unwrap(), Decimal::from(42));
}

#[test]
fn null_reads_as_zero_unless_strict() {
    let d = doc();
    assert_eq!(d.get_value::<i64>("nothing").unwrap(), 0);
    assert_eq!(d.get_value::<f32>("nothing").unwrap(), 0.0);
    assert!(!d.get_value::<bool>("nothing").unwrap());
    assert!(d.get_value_with::<i64>("nothing", &Coercion::STRICT).is_err());
    assert_eq!(d.get_value::<Option<i64>>("nothing").unwrap(), None);
}

#[test]
fn missing_key_is_missing_property_not_zero() {
    assert!(matches!(
        doc().get_value::<i64>("absent"),
        Err(DomError::MissingProperty { .. })
    ));
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn object_to_scalar_always_fails() {
    let d = doc();
    assert!(d.get_value::<String>("nested").is_err());
    assert!(d.get_value::<i64>("nested").is_err());
    assert_eq!(d.get_value::<ObjectNode>("nested").unwrap().len(), 1);
}

#[test]
fn arrays_unwrap_only_through_single_element_coercion() {
    let d = doc();
    assert!(d.get_value::<i64>("list").is_err());
    let list = d.get("list").unwrap();
    assert_eq!(list.coerce_single::<i64>(&Coercion::default()).unwrap(), 7);

    let empty = Node::array();
    assert!(matches!(
        NodeRef::Node(&empty).coerce_single::<i64>(&Coercion::default()),
        Err(DomError::IndexOutOfRange { index: 0, len: 0, .. })
    ));
}

// ============================================================================
// Dates, identifiers, URIs, bytes
// ============================================================================

#[test]
fn date_from_string_and_unix_seconds() {
    let d = doc();
    let when: DateTime<Utc> = d.get_value("when").unwrap();
    assert_eq!((when.year(), when.month(), when.day()), (2024, 3, 1));
    let epoch: DateTime<Utc> = d.get_value("epoch").unwrap();
    assert_eq!(epoch.timestamp(), 86_400);
}

#[test]
fn legacy_ticks_are_opt_in() {
    let ticks = Node::Integer(621_355_968_000_000_000 + 864_000_000_000);
    let legacy = Coercion::default().with_dates(DateConvention::LegacyTicks);
    let dt: DateTime<Utc> = ticks.coerce_with(&legacy).unwrap();
    assert_eq!(dt.timestamp(), 86_400);
    // Read as Unix seconds the same number is far out of range.
    assert!(ticks.coerce::<DateTime<Utc>>().is_err());
}

#[test]
fn dates_write_as_rfc3339() {
    let mut obj = ObjectNode::new();
    let dt = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    obj.set("at", dt).unwrap();
    assert_eq!(obj.get_value::<String>("at").unwrap(), "2023-11-14T22:13:20Z");
    assert_eq!(obj.get_value::<DateTime<Utc>>("at").unwrap(), dt);
}

#[test]
fn uuid_and_uri() {
    let d = doc();
    let id: uuid::Uuid = d.get_value("id").unwrap();
    assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    let site: http::Uri = d.get_value("site").unwrap();
    assert_eq!(site.host(), Some("example.com"));
    assert!(d.get_value::<uuid::Uuid>("count").is_err());
}

#[test]
fn bytes_from_base64_or_integer_array() {
    let d = doc();
    assert_eq!(d.get_value::<Vec<u8>>("blob").unwrap(), b"hello");
    assert_eq!(d.get_value::<Vec<u8>>("bytes").unwrap(), b"hi");
    assert_eq!(Node::bytes(b"hello"), Node::from("aGVsbG8="));
}

// ============================================================================
// Determinism
// ============================================================================

fn arb_scalar() -> impl Strategy<Value = Node> {
    prop_oneof![
        Just(Node::Null),
        Just(Node::Undefined),
        any::<bool>().prop_map(Node::Bool),
        any::<i64>().prop_map(Node::Integer),
        (-1e12f64..1e12).prop_map(Node::Double),
        "[a-zA-Z0-9 .:-]{0,12}".prop_map(Node::String),
    ]
}

fn outcome<T: jdom_core::FromNode + std::fmt::Debug>(node: &Node) -> String {
    format!("{:?}", node.coerce::<T>().map_err(|e| e.to_string()))
}

proptest! {
    #[test]
    fn coercion_is_deterministic_and_pure(node in arb_scalar()) {
        let before = node.clone();
        prop_assert_eq!(outcome::<i64>(&node), outcome::<i64>(&node));
        prop_assert_eq!(outcome::<bool>(&node), outcome::<bool>(&node));
        prop_assert_eq!(outcome::<String>(&node), outcome::<String>(&node));
        prop_assert_eq!(outcome::<f64>(&node), outcome::<f64>(&node));
        prop_assert_eq!(outcome::<Decimal>(&node), outcome::<Decimal>(&node));
        prop_assert_eq!(&node, &before);
    }
}
