use crate::chain_event::{BlockHeader, Edge, Hash256, InputStart, TxEnd, TxOutput, TxStart};

/// Receiver side of the decoder's event stream.
///
/// Events arrive synchronously, one at a time and in nesting order:
/// `start`, then per block `start_block`, per transaction `start_tx`, per
/// input an optional `start_input` followed by `edge` (never for a coinbase
/// input), per output `end_output`, then `end_tx`, `end_block`, and finally
/// `wrapup` once. An edge is only delivered after the `end_output` that
/// created the output it spends.
///
/// A consumer may terminate early (a cutoff height was reached) by running
/// its wrapup sequence from inside `start_block`; `is_finished` then reports
/// `true` and the driver stops feeding it.
pub trait ChainConsumer {
    fn start(&mut self, _first_block: u64, _last_block: u64) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_block(&mut self, header: &BlockHeader, chain_offset: u64) -> anyhow::Result<()>;

    fn start_tx(&mut self, _tx: &TxStart, _tx_hash: &Hash256) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_input(&mut self, _input: &InputStart) -> anyhow::Result<()> {
        Ok(())
    }

    fn edge(&mut self, edge: &Edge) -> anyhow::Result<()>;

    fn end_output(&mut self, output: &TxOutput) -> anyhow::Result<()>;

    fn end_tx(&mut self, _tx: &TxEnd) -> anyhow::Result<()> {
        Ok(())
    }

    fn end_block(&mut self, _offset: u64) -> anyhow::Result<()> {
        Ok(())
    }

    fn wrapup(&mut self) -> anyhow::Result<()>;

    /// Flushes whatever was already produced; called on the fatal path
    /// instead of `wrapup`.
    fn abort(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool;
}
