//! Structured-document utilities.
//!
//! Rendered resource bodies are decoded into a loosely-typed [`Document`] so
//! that transforms can read and write nested fields by key path without
//! knowing the resource schema.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{TemplateError, TemplateResult};

/// A decoded resource body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    object: Map<String, Value>,
}

impl Document {
    /// Decode the first YAML document in `bytes`.
    ///
    /// The document must be a mapping with a non-empty `kind`.
    pub fn from_yaml(bytes: &[u8]) -> TemplateResult<Self> {
        let value = match serde_yaml::Deserializer::from_slice(bytes).next() {
            Some(doc) => Value::deserialize(doc)?,
            None => Value::Null,
        };
        Self::from_value(value)
    }

    /// Build a document from an already decoded value.
    pub fn from_value(value: Value) -> TemplateResult<Self> {
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Err(TemplateError::document(&[], "Object 'Kind' is missing")),
            other => {
                return Err(TemplateError::document(
                    &[],
                    format!("expected a mapping, found {}", type_name(&other)),
                ))
            }
        };
        let doc = Self { object };
        if doc.kind().is_empty() {
            return Err(TemplateError::document(&["kind"], "Object 'Kind' is missing"));
        }
        Ok(doc)
    }

    /// Serialize back to YAML bytes. Keys are emitted in sorted order.
    pub fn to_yaml(&self) -> TemplateResult<Vec<u8>> {
        Ok(serde_yaml::to_string(&self.object)?.into_bytes())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.object
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.object)
    }

    pub fn kind(&self) -> &str {
        self.string_or_empty(&["kind"])
    }

    pub fn api_version(&self) -> &str {
        self.string_or_empty(&["apiVersion"])
    }

    pub fn name(&self) -> &str {
        self.string_or_empty(&["metadata", "name"])
    }

    pub fn namespace(&self) -> &str {
        self.string_or_empty(&["metadata", "namespace"])
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> TemplateResult<()> {
        set_nested_field(&mut self.object, &["metadata", "name"], Value::String(name.into()))
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> TemplateResult<()> {
        set_nested_field(
            &mut self.object,
            &["metadata", "namespace"],
            Value::String(namespace.into()),
        )
    }

    /// Read `metadata.annotations`; an absent map is returned empty.
    pub fn annotations(&self) -> TemplateResult<BTreeMap<String, String>> {
        Ok(nested_string_map(&self.object, &["metadata", "annotations"])?.unwrap_or_default())
    }

    /// Replace `metadata.annotations`; an empty map removes the field.
    pub fn set_annotations(&mut self, annotations: BTreeMap<String, String>) -> TemplateResult<()> {
        self.set_string_map(&["metadata", "annotations"], annotations)
    }

    /// Read `metadata.labels`; an absent map is returned empty.
    pub fn labels(&self) -> TemplateResult<BTreeMap<String, String>> {
        Ok(nested_string_map(&self.object, &["metadata", "labels"])?.unwrap_or_default())
    }

    /// Replace `metadata.labels`; an empty map removes the field.
    pub fn set_labels(&mut self, labels: BTreeMap<String, String>) -> TemplateResult<()> {
        self.set_string_map(&["metadata", "labels"], labels)
    }

    pub fn nested_string(&self, path: &[&str]) -> TemplateResult<Option<&str>> {
        nested_string(&self.object, path)
    }

    pub fn nested_i64(&self, path: &[&str]) -> TemplateResult<Option<i64>> {
        nested_i64(&self.object, path)
    }

    pub fn nested_string_map(&self, path: &[&str]) -> TemplateResult<Option<BTreeMap<String, String>>> {
        nested_string_map(&self.object, path)
    }

    pub fn set_nested_field(&mut self, path: &[&str], value: Value) -> TemplateResult<()> {
        set_nested_field(&mut self.object, path, value)
    }

    fn set_string_map(&mut self, path: &[&str], map: BTreeMap<String, String>) -> TemplateResult<()> {
        if map.is_empty() {
            remove_nested_field(&mut self.object, path);
            return Ok(());
        }
        let value = map.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        set_nested_field(&mut self.object, path, Value::Object(value))
    }

    // Lenient accessor for well-known fields: wrong types read as unset.
    fn string_or_empty(&self, path: &[&str]) -> &str {
        nested_string(&self.object, path).ok().flatten().unwrap_or("")
    }
}

/// Walk `path` and return the value at its end, `None` if any segment is
/// missing. Intermediate values that are not mappings are an error.
pub fn nested_field<'a>(
    object: &'a Map<String, Value>,
    path: &[&str],
) -> TemplateResult<Option<&'a Value>> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(None);
    };
    let mut current = object;
    for (i, segment) in parents.iter().enumerate() {
        match current.get(*segment) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) => current = map,
            Some(other) => {
                return Err(TemplateError::document(
                    &path[..=i],
                    format!(
                        "accessor error: {} is of the type {}, expected map",
                        other,
                        type_name(other)
                    ),
                ))
            }
        }
    }
    Ok(current.get(*last).filter(|v| !v.is_null()))
}

pub fn nested_string<'a>(
    object: &'a Map<String, Value>,
    path: &[&str],
) -> TemplateResult<Option<&'a str>> {
    match nested_field(object, path)? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(type_error(path, other, "string")),
    }
}

pub fn nested_i64(object: &Map<String, Value>, path: &[&str]) -> TemplateResult<Option<i64>> {
    match nested_field(object, path)? {
        None => Ok(None),
        Some(Value::Number(n)) if n.is_i64() => Ok(n.as_i64()),
        Some(other) => Err(type_error(path, other, "int64")),
    }
}

/// Read a map whose values must all be strings.
pub fn nested_string_map(
    object: &Map<String, Value>,
    path: &[&str],
) -> TemplateResult<Option<BTreeMap<String, String>>> {
    let map = match nested_field(object, path)? {
        None => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(type_error(path, other, "map[string]string")),
    };
    let mut out = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                out.insert(key.clone(), s.clone());
            }
            other => {
                let mut full: Vec<&str> = path.to_vec();
                full.push(key);
                return Err(type_error(&full, other, "string"));
            }
        }
    }
    Ok(Some(out))
}

/// Set the value at `path`, creating intermediate mappings as needed.
pub fn set_nested_field(
    object: &mut Map<String, Value>,
    path: &[&str],
    value: Value,
) -> TemplateResult<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(TemplateError::document(&[], "empty field path"));
    };
    let mut current = object;
    for (i, segment) in parents.iter().enumerate() {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            other => {
                return Err(TemplateError::document(
                    &path[..=i],
                    format!("value cannot be set because {} is not a map", type_name(other)),
                ))
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

pub fn remove_nested_field(object: &mut Map<String, Value>, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = object;
    for segment in parents {
        current = match current.get_mut(*segment) {
            Some(Value::Object(map)) => map,
            _ => return,
        };
    }
    current.remove(*last);
}

fn type_error(path: &[&str], value: &Value, expected: &str) -> TemplateError {
    TemplateError::document(
        path,
        format!(
            "accessor error: {} is of the type {}, expected {}",
            value,
            type_name(value),
            expected
        ),
    )
}

/// Go-style type name used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int64",
        Value::String(_) => "string",
        Value::Array(_) => "[]interface {}",
        Value::Object(_) => "map[string]interface {}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml(yaml.as_bytes()).unwrap()
    }

    #[test]
    fn test_decode_reads_first_document_only() {
        let d = doc("kind: Cluster\nmetadata:\n  name: one\n---\nkind: Other\nmetadata:\n  name: two\n");
        assert_eq!(d.kind(), "Cluster");
        assert_eq!(d.name(), "one");
    }

    #[test]
    fn test_decode_requires_kind() {
        let err = Document::from_yaml(b"metadata:\n  name: x\n").unwrap_err();
        assert!(err.to_string().contains("Object 'Kind' is missing"));

        let err = Document::from_yaml(b"").unwrap_err();
        assert!(err.to_string().contains("Object 'Kind' is missing"));

        let err = Document::from_yaml(b"- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("expected a mapping"));
    }

    #[test]
    fn test_decode_malformed_yaml() {
        assert!(Document::from_yaml(b"kind: [unclosed").is_err());
    }

    #[test]
    fn test_round_trip_sorts_keys() {
        let d = doc("kind: Cluster\napiVersion: v1\nmetadata:\n  name: testing\n");
        let out = String::from_utf8(d.to_yaml().unwrap()).unwrap();
        assert_eq!(out, "apiVersion: v1\nkind: Cluster\nmetadata:\n  name: testing\n");
    }

    #[test]
    fn test_nested_accessors() {
        let d = doc("kind: Deployment\nspec:\n  replicas: 3\n  template:\n    name: x\n");
        assert_eq!(d.nested_i64(&["spec", "replicas"]).unwrap(), Some(3));
        assert_eq!(d.nested_string(&["spec", "template", "name"]).unwrap(), Some("x"));
        assert_eq!(d.nested_string(&["spec", "missing", "name"]).unwrap(), None);
        assert!(d.nested_string(&["spec", "replicas"]).is_err());
        assert!(d.nested_string(&["spec", "replicas", "deeper"]).is_err());
    }

    #[test]
    fn test_string_map_rejects_non_strings() {
        let d = doc("kind: NotCluster\nmetadata:\n  annotations:\n    test.annotation: true\n");
        let err = d.annotations().unwrap_err();
        assert!(err.to_string().starts_with(".metadata.annotations.test.annotation"));
    }

    #[test]
    fn test_setters_create_parents() {
        let mut d = doc("kind: Cluster\n");
        d.set_namespace("ns").unwrap();
        d.set_name("n").unwrap();
        let mut labels = BTreeMap::new();
        labels.insert("a".to_string(), "b".to_string());
        d.set_labels(labels).unwrap();
        assert_eq!(
            d.clone().into_value(),
            json!({"kind": "Cluster", "metadata": {"name": "n", "namespace": "ns", "labels": {"a": "b"}}})
        );

        d.set_labels(BTreeMap::new()).unwrap();
        assert!(d.as_map()["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut d = doc("kind: Cluster\nmetadata: oops\n");
        assert!(d.set_namespace("ns").is_err());
    }
}
