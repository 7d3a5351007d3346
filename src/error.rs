use crate::chain_event::Hash256;
use crate::ledger_utils::utxo_table::OutputKey;
use crate::stream_state::{EventKind, StreamState};

/// Structural failures of the event stream. None of them is recoverable: the
/// run is halted once one is raised.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("unconnected input: {spender}:{input_index} spends {key} which was never seen as an output")]
    DanglingSpend {
        key: OutputKey,
        spender: Hash256,
        input_index: u32,
    },
    #[error("event {event} is not allowed in state {state:?}")]
    OutOfOrder {
        event: EventKind,
        state: StreamState,
    },
}
