use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the store; never part of the domain fields.
const BOOKKEEPING_KEYS: [&str; 6] = [
    "id",
    "synced",
    "cachedAt",
    "updatedAt",
    "cached_at",
    "updated_at",
];

/// Domain fields of a record (position, classification, notes, ...). Opaque to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordData(Map<String, Value>);

impl RecordData {
    pub fn new(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err("Record data must be a JSON object".to_string()),
        }
    }

    pub fn from_map(mut map: Map<String, Value>) -> Self {
        for key in BOOKKEEPING_KEYS {
            map.remove(key);
        }
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Shallow merge; later fields win.
    pub fn merge(&mut self, updates: &RecordData) {
        for (key, value) in &updates.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
