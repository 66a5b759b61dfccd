use serde_yaml::{Mapping, Value};

use crate::macros::dedent;

// ============================================================================
// DATA STORE: run-scoped values shared by every document
// ============================================================================

/// String-keyed values written by `setdata` and read by templates.
///
/// The root is always a mapping. Merging is deep: nested mappings merge key by
/// key, anything else replaces what was there.
#[derive(Clone, Debug, PartialEq)]
pub struct DataStore {
    data: Value,
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            data: Value::Mapping(Mapping::new()),
        }
    }

    /// The whole store as one mapping value.
    pub fn value(&self) -> &Value {
        &self.data
    }

    /// Looks up a dotted path such as `site.title`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;
        for key in path.split('.').filter(|k| !k.is_empty()) {
            let Value::Mapping(map) = current else {
                return None;
            };
            current = map.get(key)?;
        }
        Some(current)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        let mut incoming = Mapping::new();
        incoming.insert(Value::from(key), value);
        self.merge(incoming);
    }

    pub fn merge(&mut self, incoming: Mapping) {
        tracing::debug!(keys = incoming.len(), "merging shared data");
        merge_into(&mut self.data, Value::Mapping(incoming));
    }

    pub fn len(&self) -> usize {
        match &self.data {
            Value::Mapping(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses a flow-style body (`a: 1, b: [x, y]`) into a mapping.
    pub fn parse_flow(text: &str) -> Result<Mapping, String> {
        as_mapping(serde_yaml::from_str(&format!("{{{}}}", text)).map_err(|e| e.to_string())?)
    }

    /// Parses a block-style (indented) body into a mapping.
    pub fn parse_block(text: &str) -> Result<Mapping, String> {
        as_mapping(serde_yaml::from_str(&dedent(text)).map_err(|e| e.to_string())?)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn as_mapping(value: Value) -> Result<Mapping, String> {
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        Value::Sequence(_) => Err("expected key/value pairs, found a sequence".to_string()),
        _ => Err("expected key/value pairs, found a scalar".to_string()),
    }
}

fn merge_into(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Mapping(existing), Value::Mapping(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
