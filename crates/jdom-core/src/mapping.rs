//! Object mapping between native Rust types and document nodes.
//!
//! Mapping goes through serde: a native value is serialized to the JSON
//! representation serde would produce and folded into a tree, and back.
//! Whatever `#[serde(...)]` attributes say about renaming or skipping
//! applies unchanged.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::node::Node;
use crate::object::ObjectNode;

/// Build a node from any serializable value.
pub fn from_native<T: Serialize + ?Sized>(value: &T) -> Result<Node> {
    let json = serde_json::to_value(value)?;
    Node::from_json(&json)
}

/// Read a node back into a native type.
pub fn to_native<T: DeserializeOwned>(node: &Node) -> Result<T> {
    let json = node.to_json()?;
    Ok(serde_json::from_value(json)?)
}

impl ObjectNode {
    /// Map an object into a native type.
    pub fn to_native<T: DeserializeOwned>(&self) -> Result<T> {
        let json = serde_json::to_value(self)?;
        Ok(serde_json::from_value(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        #[serde(rename = "Y")]
        y: f64,
        label: Option<String>,
    }

    #[test]
    fn maps_through_serde() {
        let p = Point {
            x: 1,
            y: 2.5,
            label: None,
        };
        let node = from_native(&p).unwrap();
        assert_eq!(node.get("Y").unwrap().coerce::<f64>().unwrap(), 2.5);
        assert!(node.get("label").unwrap().node().unwrap().is_null());
        assert_eq!(to_native::<Point>(&node).unwrap(), p);
    }

    #[test]
    fn shape_mismatch_is_a_json_error() {
        let node = Node::from("not a point");
        assert!(matches!(
            to_native::<Point>(&node),
            Err(crate::error::DomError::Json(_))
        ));
    }
}
