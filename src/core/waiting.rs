//! Waiting Buffer — the side-table of partially-satisfied join nodes.
//!
//! Multi-input nodes cannot run until every input slot holds data. Arriving
//! branches fill their slot here; when the last slot fills, the whole bundle
//! is promoted onto the execution stack and the entry disappears. Removal is
//! structural: taking the last run-index entry of a node also removes the
//! node's outer entry, so no empty maps survive promotion.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::data::{DataBundle, ItemBatch, MAIN_PORT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitingExecution {
    entries: HashMap<String, BTreeMap<usize, DataBundle>>,
}

impl WaitingExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: &str, run_index: usize) -> bool {
        self.entries
            .get(node)
            .is_some_and(|runs| runs.contains_key(&run_index))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create an entry with `slot_count` empty `main` slots and the arriving
    /// branch filled in. `batch` may be `None`: a branch that ended with an
    /// empty success leaves its slot permanently unfilled.
    pub fn insert(
        &mut self,
        node: &str,
        run_index: usize,
        slot_count: usize,
        input_index: usize,
        batch: Option<ItemBatch>,
    ) {
        let mut slots = vec![None; slot_count.max(input_index + 1)];
        slots[input_index] = batch;
        self.entries
            .entry(node.to_string())
            .or_default()
            .insert(run_index, DataBundle::main(slots));
    }

    /// Fill one slot of an existing entry in place. Returns false when no
    /// entry exists for `(node, run_index)`.
    pub fn fill_slot(
        &mut self,
        node: &str,
        run_index: usize,
        input_index: usize,
        batch: Option<ItemBatch>,
    ) -> bool {
        let Some(bundle) = self
            .entries
            .get_mut(node)
            .and_then(|runs| runs.get_mut(&run_index))
        else {
            return false;
        };
        let Some(slots) = bundle.port_mut(MAIN_PORT) else {
            return false;
        };
        if slots.len() <= input_index {
            slots.resize_with(input_index + 1, || None);
        }
        slots[input_index] = batch;
        true
    }

    /// Remove and return the bundle if every one of its `slot_count` slots is
    /// filled. The node's outer entry is dropped together with its last run.
    pub fn take_if_complete(
        &mut self,
        node: &str,
        run_index: usize,
        slot_count: usize,
    ) -> Option<DataBundle> {
        let runs = self.entries.get_mut(node)?;
        if !runs
            .get(&run_index)
            .is_some_and(|bundle| bundle.port_complete(MAIN_PORT, slot_count))
        {
            return None;
        }
        let bundle = runs.remove(&run_index);
        if runs.is_empty() {
            self.entries.remove(node);
        }
        bundle
    }
}
