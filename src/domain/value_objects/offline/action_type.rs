use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation a queued action carries. Decides which remote operation
/// the sync engine invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ActionType {
    CheckIn,
    CheckOut,
    Custom(String),
}

impl ActionType {
    pub fn custom(name: &str) -> Result<Self, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Action type cannot be empty".to_string());
        }
        Ok(ActionType::from(name))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::CheckIn => "check_in",
            ActionType::CheckOut => "check_out",
            ActionType::Custom(value) => value.as_str(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        match value {
            "check_in" => ActionType::CheckIn,
            "check_out" => ActionType::CheckOut,
            other => ActionType::Custom(other.to_string()),
        }
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        ActionType::from(value.as_str())
    }
}

impl From<ActionType> for String {
    fn from(kind: ActionType) -> Self {
        kind.as_str().to_string()
    }
}
