use crate::chain_event::{BlockHeader, Edge, Hash256, InputStart, TxEnd, TxOutput, TxStart};
use crate::consumer::ChainConsumer;
use crate::error::StreamError;

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Start,
    StartBlock,
    StartTx,
    StartInput { coinbase: bool },
    Edge,
    EndOutput,
    EndTx,
    EndBlock,
    Wrapup,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Start => "start",
            EventKind::StartBlock => "start_block",
            EventKind::StartTx => "start_tx",
            EventKind::StartInput { coinbase: true } => "start_input(coinbase)",
            EventKind::StartInput { coinbase: false } => "start_input",
            EventKind::Edge => "edge",
            EventKind::EndOutput => "end_output",
            EventKind::EndTx => "end_tx",
            EventKind::EndBlock => "end_block",
            EventKind::Wrapup => "wrapup",
        };
        f.write_str(name)
    }
}

/// Position inside the nested block/tx/input/output structure of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Unstarted,
    Idle,
    InBlock,
    InTx,
    /// A non-coinbase input must be closed by its edge.
    InInput { coinbase: bool },
    /// Outputs have begun, no more inputs for this transaction.
    InOutput,
    Finished,
}

impl StreamState {
    pub fn advance(self, event: EventKind) -> Result<StreamState, StreamError> {
        use crate::stream_state::EventKind as E;
        use crate::stream_state::StreamState as S;

        let next = match (self, event) {
            (S::Unstarted, E::Start) => S::Idle,
            (S::Idle, E::StartBlock) => S::InBlock,
            (S::InBlock, E::StartTx) => S::InTx,
            (S::InTx | S::InInput { coinbase: true }, E::StartInput { coinbase }) => {
                S::InInput { coinbase }
            }
            (S::InTx | S::InInput { coinbase: false }, E::Edge) => S::InTx,
            (S::InTx | S::InInput { coinbase: true } | S::InOutput, E::EndOutput) => S::InOutput,
            (S::InTx | S::InInput { coinbase: true } | S::InOutput, E::EndTx) => S::InBlock,
            (S::InBlock, E::EndBlock) => S::Idle,
            (S::Finished, E::Wrapup) => {
                return Err(StreamError::OutOfOrder {
                    event,
                    state: self,
                })
            }
            (_, E::Wrapup) => S::Finished,
            (state, event) => return Err(StreamError::OutOfOrder { event, state }),
        };
        Ok(next)
    }
}

/// Wraps a consumer and rejects every event that breaks the nesting order
/// before it reaches the inner consumer.
pub struct Sequenced<C> {
    inner: C,
    state: StreamState,
}

impl<C: ChainConsumer> Sequenced<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            state: StreamState::Unstarted,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn advance(&mut self, event: EventKind) -> anyhow::Result<()> {
        self.state = self.state.advance(event)?;
        Ok(())
    }

    fn settle(&mut self) {
        if self.inner.is_finished() {
            self.state = StreamState::Finished;
        }
    }
}

impl<C: ChainConsumer> ChainConsumer for Sequenced<C> {
    fn start(&mut self, first_block: u64, last_block: u64) -> anyhow::Result<()> {
        self.advance(EventKind::Start)?;
        self.inner.start(first_block, last_block)?;
        self.settle();
        Ok(())
    }

    fn start_block(&mut self, header: &BlockHeader, chain_offset: u64) -> anyhow::Result<()> {
        self.advance(EventKind::StartBlock)?;
        self.inner.start_block(header, chain_offset)?;
        self.settle();
        Ok(())
    }

    fn start_tx(&mut self, tx: &TxStart, tx_hash: &Hash256) -> anyhow::Result<()> {
        self.advance(EventKind::StartTx)?;
        self.inner.start_tx(tx, tx_hash)
    }

    fn start_input(&mut self, input: &InputStart) -> anyhow::Result<()> {
        self.advance(EventKind::StartInput {
            coinbase: input.is_coinbase(),
        })?;
        self.inner.start_input(input)
    }

    fn edge(&mut self, edge: &Edge) -> anyhow::Result<()> {
        self.advance(EventKind::Edge)?;
        self.inner.edge(edge)
    }

    fn end_output(&mut self, output: &TxOutput) -> anyhow::Result<()> {
        self.advance(EventKind::EndOutput)?;
        self.inner.end_output(output)
    }

    fn end_tx(&mut self, tx: &TxEnd) -> anyhow::Result<()> {
        self.advance(EventKind::EndTx)?;
        self.inner.end_tx(tx)
    }

    fn end_block(&mut self, offset: u64) -> anyhow::Result<()> {
        self.advance(EventKind::EndBlock)?;
        self.inner.end_block(offset)?;
        self.settle();
        Ok(())
    }

    fn wrapup(&mut self) -> anyhow::Result<()> {
        self.advance(EventKind::Wrapup)?;
        self.inner.wrapup()
    }

    fn abort(&mut self) -> anyhow::Result<()> {
        self.inner.abort()
    }

    fn is_finished(&self) -> bool {
        self.state == StreamState::Finished
    }
}
