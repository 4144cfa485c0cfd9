use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body of a queued action. Always a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionPayload(Value);

impl ActionPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn from_serializable<T: Serialize>(data: &T) -> Result<Self, String> {
        let value = serde_json::to_value(data).map_err(|e| format!("Invalid payload: {e}"))?;
        Self::new(value)
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.0.clone()).map_err(|e| format!("Payload mismatch: {e}"))
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    fn validate(value: &Value) -> Result<(), String> {
        if !value.is_object() {
            return Err("Action payload must be a JSON object".to_string());
        }
        Ok(())
    }
}

impl From<ActionPayload> for Value {
    fn from(payload: ActionPayload) -> Self {
        payload.0
    }
}
