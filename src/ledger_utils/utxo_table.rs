use crate::chain_event::{Edge, Hash256};
use crate::error::StreamError;
use rustc_hash::FxHashMap;
use std::fmt;

/// Exact `(tx hash, output index)` pair naming one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey {
    pub tx_hash: Hash256,
    pub index: u32,
}

impl OutputKey {
    pub fn new(tx_hash: Hash256, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

/// Sequential identifier handed to every output at discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

/// Correlates spends with the outputs they consume.
///
/// Grow-only for the whole run: resolving a spend does not remove the
/// entry.
pub struct UtxoTable {
    outputs: FxHashMap<OutputKey, OutputId>,
    next_id: u64,
}

impl UtxoTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outputs: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            next_id: 0,
        }
    }

    /// Registers a freshly discovered output. A repeated key replaces the
    /// previous mapping; the id sequence keeps advancing.
    pub fn insert(&mut self, key: OutputKey) -> OutputId {
        let id = OutputId(self.next_id);
        self.next_id += 1;
        if self.outputs.insert(key, id).is_some() {
            tracing::debug!("output {} registered twice, keeping the latest id", key);
        }
        id
    }

    pub fn resolve(&self, key: &OutputKey) -> Option<OutputId> {
        self.outputs.get(key).copied()
    }

    pub fn resolve_spend(&self, edge: &Edge) -> Result<OutputId, StreamError> {
        let key = OutputKey::new(edge.up_tx_hash, edge.output_index);
        self.resolve(&key).ok_or(StreamError::DanglingSpend {
            key,
            spender: edge.down_tx_hash,
            input_index: edge.input_index,
        })
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn discovered(&self) -> u64 {
        self.next_id
    }
}
