use serde::{Deserialize, Serialize};

/// Serializable state of a materialised collection
///
/// Holds member keys and their JSON column values plus the pending change sets; the
/// cursor, session and database handle are not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub entity: String,
    pub keys: Vec<String>,
    pub objects: Vec<serde_json::Value>,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub count: usize,
    pub is_list: bool,
}

impl CollectionSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Member JSON under a key
    pub fn object(&self, key: &str) -> Option<&serde_json::Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.objects.get(i))
    }
}
