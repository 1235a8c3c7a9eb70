//! Items and priority classes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Priority class of an item
///
/// Exactly two classes exist; there is no cross-class promotion. The
/// wire form is the capitalised name (`"Low"` / `"High"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    High,
}

impl Priority {
    /// Wire name of the class
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::High => "High",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque payload flowing through the queues
///
/// `Record` holds a structured (decoded) item; `Text` holds a raw
/// string exactly as received. Which variant ingress produces depends
/// on the supervisor's dataflow form.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Record(Value),
    Text(String),
}

impl Item {
    /// Wrap a structured record
    pub fn record(value: Value) -> Self {
        Item::Record(value)
    }

    /// Wrap a raw string
    pub fn text(s: impl Into<String>) -> Self {
        Item::Text(s.into())
    }

    /// Parse frame bytes as a structured record
    pub fn parse_record(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value = serde_json::from_slice(bytes).map_err(ProtocolError::MalformedRecord)?;
        Ok(Item::Record(value))
    }

    /// String form: `Text` verbatim, `Record` as compact JSON
    pub fn string_form(&self) -> String {
        match self {
            Item::Text(s) => s.clone(),
            Item::Record(v) => v.to_string(),
        }
    }

    /// Binary form: serialised bytes of the item
    pub fn binary_form(&self) -> Vec<u8> {
        match self {
            Item::Text(s) => s.clone().into_bytes(),
            Item::Record(v) => v.to_string().into_bytes(),
        }
    }

    /// View the structured record, if this item is one
    pub fn as_record(&self) -> Option<&Value> {
        match self {
            Item::Record(v) => Some(v),
            Item::Text(_) => None,
        }
    }
}
