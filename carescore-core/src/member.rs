//! Member records and member file loading
//!
//! A member record is the read-only output of the feature-engineering
//! pipeline: an identifier plus a map of feature name to value. Values are
//! typed once here, at the boundary, and never re-interpreted downstream.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// A single feature value as delivered by the feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    /// Categorical value that has no numeric reading
    Category(String),
}

impl FeatureValue {
    /// Type a raw JSON value. Returns `None` for `null` (treated as missing).
    ///
    /// Booleans and `Y`/`N` flags become 1/0, numeric strings are parsed,
    /// anything else is kept as a category.
    pub fn from_json(value: &Value) -> Option<FeatureValue> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(FeatureValue::Number(if *b { 1.0 } else { 0.0 })),
            Value::Number(n) => Some(match n.as_f64() {
                Some(v) => FeatureValue::Number(v),
                None => FeatureValue::Category(n.to_string()),
            }),
            Value::String(s) => Some(parse_text(s)),
            other => Some(FeatureValue::Category(other.to_string())),
        }
    }

    /// Numeric reading of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) => None,
        }
    }
}

fn parse_text(s: &str) -> FeatureValue {
    let trimmed = s.trim();
    match trimmed {
        "Y" | "y" => FeatureValue::Number(1.0),
        "N" | "n" => FeatureValue::Number(0.0),
        _ => match trimmed.parse::<f64>() {
            Ok(v) => FeatureValue::Number(v),
            Err(_) => FeatureValue::Category(s.to_string()),
        },
    }
}

/// Feature vector for one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    pub features: BTreeMap<String, FeatureValue>,
}

impl MemberRecord {
    pub fn new(id: impl Into<String>) -> Self {
        MemberRecord {
            id: id.into(),
            features: BTreeMap::new(),
        }
    }

    /// Builder-style numeric feature insertion
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), FeatureValue::Number(value));
        self
    }

    /// Builder-style categorical feature insertion
    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.features
            .insert(name.into(), FeatureValue::Category(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }

    /// Build a record from a JSON object.
    ///
    /// The id is read from `id_field` (string or number); records without one
    /// are named `member_{index}`. The id field is not kept as a feature.
    pub fn from_json_object(object: &Map<String, Value>, index: usize, id_field: &str) -> Self {
        let id = match object.get(id_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("member_{}", index),
        };

        let features = object
            .iter()
            .filter(|(name, _)| name.as_str() != id_field)
            .filter_map(|(name, value)| FeatureValue::from_json(value).map(|v| (name.clone(), v)))
            .collect();

        MemberRecord { id, features }
    }
}

/// Parse member records from a JSON array of objects or from JSON Lines
pub fn parse_members(content: &str, id_field: &str) -> Result<Vec<MemberRecord>> {
    let trimmed = content.trim_start();

    let objects: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("failed to parse member array")?
    } else {
        let mut values = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("failed to parse member on line {}", line_no + 1))?;
            values.push(value);
        }
        values
    };

    objects
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(object) => Ok(MemberRecord::from_json_object(object, index, id_field)),
            other => anyhow::bail!(
                "member #{} must be a JSON object (got {})",
                index,
                json_kind(other)
            ),
        })
        .collect()
}

/// Load member records from a `.json` or `.jsonl` file
pub fn load_members(path: &Path, id_field: &str) -> Result<Vec<MemberRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read member file: {}", path.display()))?;
    parse_members(&content, id_field)
        .with_context(|| format!("invalid member file: {}", path.display()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_value_typing() {
        assert_eq!(FeatureValue::from_json(&json!(null)), None);
        assert_eq!(
            FeatureValue::from_json(&json!(true)),
            Some(FeatureValue::Number(1.0))
        );
        assert_eq!(
            FeatureValue::from_json(&json!("N")),
            Some(FeatureValue::Number(0.0))
        );
        assert_eq!(
            FeatureValue::from_json(&json!(" 12.5 ")),
            Some(FeatureValue::Number(12.5))
        );
        assert_eq!(
            FeatureValue::from_json(&json!("female")),
            Some(FeatureValue::Category("female".to_string()))
        );
    }

    #[test]
    fn test_from_json_object_extracts_id() {
        let value = json!({"DESYNPUF_ID": "00013D2EFD8E45D1", "severity_score": 4, "note": null});
        let record = MemberRecord::from_json_object(value.as_object().unwrap(), 7, "DESYNPUF_ID");
        assert_eq!(record.id, "00013D2EFD8E45D1");
        assert!(record.get("DESYNPUF_ID").is_none());
        assert!(record.get("note").is_none());
        assert_eq!(
            record.get("severity_score").and_then(FeatureValue::as_f64),
            Some(4.0)
        );
    }

    #[test]
    fn test_missing_id_falls_back_to_index() {
        let value = json!({"severity_score": 1});
        let record = MemberRecord::from_json_object(value.as_object().unwrap(), 3, "DESYNPUF_ID");
        assert_eq!(record.id, "member_3");
    }

    #[test]
    fn test_parse_members_array_and_jsonl() {
        let array = r#"[{"id": "a", "x": 1}, {"id": "b", "x": 2}]"#;
        let members = parse_members(array, "id").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].id, "b");

        let jsonl = "{\"id\": \"a\", \"x\": 1}\n\n{\"id\": \"b\", \"x\": 2}\n";
        let members = parse_members(jsonl, "id").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, "a");
    }

    #[test]
    fn test_parse_members_rejects_non_objects() {
        assert!(parse_members("[1, 2]", "id").is_err());
        assert!(parse_members("{\"id\": \"a\"}\nnot json\n", "id").is_err());
    }

    #[test]
    fn test_load_members_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.jsonl");
        std::fs::write(&path, "{\"DESYNPUF_ID\": \"m1\", \"total_spending\": 1200}\n").unwrap();
        let members = load_members(&path, "DESYNPUF_ID").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "m1");
    }
}
