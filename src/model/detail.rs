use serde::Deserialize;
use serde_json::Value;

/// Detail payload for one work item as returned by the service: a top-level
/// `id` plus a `fields` map keyed by reference name. Read-only, dropped after
/// normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawDetail(Value);

impl RawDetail {
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id")
    }

    /// The `fields` document, or `Value::Null` when missing.
    pub fn fields(&self) -> &Value {
        self.0.get("fields").unwrap_or(&Value::Null)
    }

    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }
}

impl From<Value> for RawDetail {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
