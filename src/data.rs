//! Data units flowing along graph edges.
//!
//! A node consumes and produces [`DataBundle`]s: per named port, an ordered
//! list of branch slots, each slot holding one [`ItemBatch`] (or nothing, if
//! that branch has not produced data). Individual records carry a JSON
//! payload plus optional binary attachments.

use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The generic data channel every ordinary connection uses.
pub const MAIN_PORT: &str = "main";

/// A single record travelling through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub json: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<HashMap<String, BinaryData>>,
}

impl ExecutionRecord {
    /// The seed record a run starts from when no input exists: `{}`.
    pub fn empty() -> Self {
        Self {
            json: Value::Object(serde_json::Map::new()),
            binary: None,
        }
    }

    pub fn from_json(json: Value) -> Self {
        Self { json, binary: None }
    }

    pub fn with_binary(mut self, key: impl Into<String>, data: BinaryData) -> Self {
        self.binary
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), data);
        self
    }
}

/// A binary attachment, stored base64-encoded so records stay JSON-serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl BinaryData {
    pub fn from_bytes(bytes: &[u8], mime_type: Option<&str>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.map(str::to_string),
            file_name: None,
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.data)
    }
}

/// One batch of records, produced by one output branch of one node run.
pub type ItemBatch = Vec<ExecutionRecord>;

/// Data assembled per port for one node invocation (or produced by one).
///
/// Each port maps to a list of branch slots indexed by connection index.
/// `None` in a slot means "no data arrived on this branch" — for a join
/// node's pending input, or for a branch that ended with an empty success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBundle {
    ports: HashMap<String, Vec<Option<ItemBatch>>>,
}

impl DataBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bundle with a single batch on the first `main` branch.
    pub fn single_main(batch: ItemBatch) -> Self {
        Self::main(vec![Some(batch)])
    }

    /// A bundle with the given `main` branch slots.
    pub fn main(slots: Vec<Option<ItemBatch>>) -> Self {
        let mut ports = HashMap::new();
        ports.insert(MAIN_PORT.to_string(), slots);
        Self { ports }
    }

    pub fn port(&self, name: &str) -> Option<&Vec<Option<ItemBatch>>> {
        self.ports.get(name)
    }

    pub fn port_mut(&mut self, name: &str) -> Option<&mut Vec<Option<ItemBatch>>> {
        self.ports.get_mut(name)
    }

    pub fn set_port(&mut self, name: impl Into<String>, slots: Vec<Option<ItemBatch>>) {
        self.ports.insert(name.into(), slots);
    }

    pub fn main_slots(&self) -> Option<&Vec<Option<ItemBatch>>> {
        self.port(MAIN_PORT)
    }

    /// The first `main` batch, if present. This is what `continue_on_fail`
    /// passes through when a node errors.
    pub fn first_main_batch(&self) -> Option<&ItemBatch> {
        self.main_slots()?.first()?.as_ref()
    }

    /// Whether the first `expected_slots` slots of the given port hold data.
    pub fn port_complete(&self, name: &str, expected_slots: usize) -> bool {
        match self.port(name) {
            Some(slots) => {
                slots.len() >= expected_slots
                    && slots.iter().take(expected_slots).all(|slot| slot.is_some())
            }
            None => expected_slots == 0,
        }
    }
}
