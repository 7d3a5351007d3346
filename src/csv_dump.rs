use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::chain_event::{BlockHeader, Edge, Hash256, InputStart, TxEnd, TxOutput, TxStart};
use crate::consumer::ChainConsumer;
use crate::ledger_utils::address_mapper::AddressMapper;
use crate::ledger_utils::utxo_table::{OutputKey, UtxoTable};
use crate::progress::ProgressMeter;
use crate::reward::block_subsidy;

pub const BLOCKS_HEADER: &str =
    "ID,Hash,Version,Timestamp,Nonce,Difficulty,Merkle,NumTransactions,OutputValue,FeesValue,Size";
pub const TRANSACTIONS_HEADER: &str =
    "ID,Hash,Version,BlockId,NumInputs,NumOutputs,OutputValue,FeesValue,LockTime,Size";
pub const INPUTS_HEADER: &str = "TransactionId,Index,Script,OutputTxHash,OutputTxIndex";
pub const OUTPUTS_HEADER: &str =
    "TransactionId,Index,Value,Script,ReceivingAddress,InputTxHash,InputTxIndex";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub events_path: PathBuf,
    /// blocks.csv, transactions.csv, inputs.csv and outputs.csv land here
    pub output_dir: PathBuf,
    #[serde(default)]
    pub first_block: u64,
    #[serde(default)]
    pub last_block: Option<u64>,
    #[serde(default = "default_utxo_capacity")]
    pub utxo_capacity: usize,
}

fn default_utxo_capacity() -> usize {
    32_000_000
}

/// Byte width of the compact-size encoding of `count`.
pub fn compact_size_len(count: u64) -> u64 {
    if count < 253 {
        1
    } else if count < 0x1_0000 {
        3
    } else if count < 0x1_0000_0000 {
        5
    } else {
        9
    }
}

fn quoted(text: impl std::fmt::Display) -> String {
    format!("\"{text}\"")
}

/// The four relational tables, header row already written.
pub struct CsvTables<W: Write> {
    pub blocks: W,
    pub transactions: W,
    pub inputs: W,
    pub outputs: W,
}

impl<W: Write> CsvTables<W> {
    pub fn new(blocks: W, transactions: W, inputs: W, outputs: W) -> anyhow::Result<Self> {
        let mut tables = Self {
            blocks,
            transactions,
            inputs,
            outputs,
        };
        tables
            .blocks
            .write_all(format!("{BLOCKS_HEADER}\n").as_bytes())?;
        tables
            .transactions
            .write_all(format!("{TRANSACTIONS_HEADER}\n").as_bytes())?;
        tables
            .inputs
            .write_all(format!("{INPUTS_HEADER}\n").as_bytes())?;
        tables
            .outputs
            .write_all(format!("{OUTPUTS_HEADER}\n").as_bytes())?;
        Ok(tables)
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.blocks.flush()?;
        self.transactions.flush()?;
        self.inputs.flush()?;
        self.outputs.flush()?;
        Ok(())
    }
}

impl CsvTables<BufWriter<File>> {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        let open = |name: &str| -> anyhow::Result<BufWriter<File>> {
            let path = dir.join(name);
            let file = File::create(&path).with_context(|| {
                format!(
                    "couldn't open file {path} for writing",
                    path = path.display()
                )
            })?;
            Ok(BufWriter::new(file))
        };
        Self::new(
            open("blocks.csv")?,
            open("transactions.csv")?,
            open("inputs.csv")?,
            open("outputs.csv")?,
        )
    }
}

impl CsvTables<Vec<u8>> {
    pub fn in_memory() -> Self {
        Self {
            blocks: format!("{BLOCKS_HEADER}\n").into_bytes(),
            transactions: format!("{TRANSACTIONS_HEADER}\n").into_bytes(),
            inputs: format!("{INPUTS_HEADER}\n").into_bytes(),
            outputs: format!("{OUTPUTS_HEADER}\n").into_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub blocks: u64,
    pub transactions: u64,
    pub inputs: u64,
    pub outputs: u64,
}

struct BlockAggregate {
    id: u64,
    header: BlockHeader,
    tx_count: u64,
    output_value: u64,
    fees: u64,
    tx_bytes: u64,
}

struct TxAggregate {
    id: u64,
    hash: Hash256,
    version: u32,
    offset: u64,
    inputs: u64,
    outputs: u64,
    input_value: u64,
    output_value: u64,
    coinbase: bool,
}

/// Writes every block, transaction, input and output inside the
/// `[first_block, last_block]` window as one csv row each.
pub struct CsvDump<Mapper: AddressMapper, W: Write> {
    tables: CsvTables<W>,
    mapper: Mapper,
    utxos: UtxoTable,
    subsidy: fn(u64) -> u64,
    first_block: u64,
    last_block: Option<u64>,
    active: bool,

    next_block_id: u64,
    next_tx_id: u64,
    next_input_id: u64,
    next_output_id: u64,
    blocks_written: u64,
    transactions_written: u64,

    block: Option<BlockAggregate>,
    tx: Option<TxAggregate>,
    progress: ProgressMeter,
    finished: bool,
}

impl<Mapper: AddressMapper, W: Write> CsvDump<Mapper, W> {
    pub fn new(
        tables: CsvTables<W>,
        mapper: Mapper,
        first_block: u64,
        last_block: Option<u64>,
        utxo_capacity: usize,
    ) -> Self {
        Self {
            tables,
            mapper,
            utxos: UtxoTable::with_capacity(utxo_capacity),
            subsidy: block_subsidy,
            first_block,
            last_block,
            active: false,
            next_block_id: 0,
            next_tx_id: 0,
            next_input_id: 0,
            next_output_id: 0,
            blocks_written: 0,
            transactions_written: 0,
            block: None,
            tx: None,
            progress: ProgressMeter::new("outputs"),
            finished: false,
        }
    }

    pub fn from_config(config: &ExportConfig, tables: CsvTables<W>, mapper: Mapper) -> Self {
        Self::new(
            tables,
            mapper,
            config.first_block,
            config.last_block,
            config.utxo_capacity,
        )
    }

    pub fn with_subsidy(mut self, subsidy: fn(u64) -> u64) -> Self {
        self.subsidy = subsidy;
        self
    }

    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            blocks: self.blocks_written,
            transactions: self.transactions_written,
            inputs: self.next_input_id,
            outputs: self.next_output_id,
        }
    }

    pub fn utxos(&self) -> &UtxoTable {
        &self.utxos
    }

    pub fn into_tables(self) -> CsvTables<W> {
        self.tables
    }

    fn height(&self) -> u64 {
        self.block
            .as_ref()
            .map(|block| block.header.height)
            .unwrap_or_default()
    }

    fn current_tx(&mut self) -> anyhow::Result<&mut TxAggregate> {
        self.tx
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("transaction event outside of a transaction"))
    }

    fn write_input(
        &mut self,
        tx_id: u64,
        index: u32,
        script: &[u8],
        prev_hash: &Hash256,
        prev_index: u32,
    ) -> anyhow::Result<()> {
        self.tables.inputs.write_all(
            format!(
                "{},{},{},{},{}\n",
                tx_id,
                index,
                quoted(hex::encode(script)),
                quoted(prev_hash),
                prev_index
            )
            .as_bytes(),
        )?;
        self.next_input_id += 1;
        Ok(())
    }
}

impl<Mapper: AddressMapper, W: Write> ChainConsumer for CsvDump<Mapper, W> {
    fn start(&mut self, first_block: u64, last_block: u64) -> anyhow::Result<()> {
        tracing::info!(
            "dumping the blockchain, stream covers blocks {} to {}",
            first_block,
            last_block
        );
        match self.last_block {
            Some(last) => tracing::info!("export window: blocks {} to {}", self.first_block, last),
            None => tracing::info!("export window: blocks {} onwards", self.first_block),
        }
        Ok(())
    }

    fn start_block(&mut self, header: &BlockHeader, chain_offset: u64) -> anyhow::Result<()> {
        self.progress
            .observe(header.height, chain_offset, self.utxos.len());
        if let Some(last) = self.last_block {
            if header.height > last {
                tracing::info!("last block {} reached", last);
                return self.wrapup();
            }
        }
        if !self.active && header.height >= self.first_block {
            tracing::info!("export window opens at block {}", header.height);
            self.active = true;
        }

        self.block = Some(BlockAggregate {
            id: self.next_block_id,
            header: header.clone(),
            tx_count: 0,
            output_value: 0,
            fees: 0,
            tx_bytes: 0,
        });
        self.next_block_id += 1;
        Ok(())
    }

    fn start_tx(&mut self, tx: &TxStart, tx_hash: &Hash256) -> anyhow::Result<()> {
        self.tx = Some(TxAggregate {
            id: self.next_tx_id,
            hash: *tx_hash,
            version: tx.version,
            offset: tx.offset,
            inputs: 0,
            outputs: 0,
            input_value: 0,
            output_value: 0,
            coinbase: false,
        });
        self.next_tx_id += 1;
        Ok(())
    }

    fn start_input(&mut self, input: &InputStart) -> anyhow::Result<()> {
        if !input.is_coinbase() {
            return Ok(());
        }
        let subsidy = (self.subsidy)(self.height());
        let tx = self.current_tx()?;
        tx.coinbase = true;
        tx.inputs += 1;
        tx.input_value += subsidy;
        let tx_id = tx.id;
        if self.active {
            self.write_input(
                tx_id,
                input.index,
                &input.script,
                &input.prev_hash,
                input.prev_index,
            )?;
        }
        Ok(())
    }

    fn edge(&mut self, edge: &Edge) -> anyhow::Result<()> {
        self.utxos.resolve_spend(edge)?;
        let tx = self.current_tx()?;
        tx.inputs += 1;
        tx.input_value += edge.value;
        let tx_id = tx.id;
        if self.active {
            self.write_input(
                tx_id,
                edge.input_index,
                &edge.input_script,
                &edge.up_tx_hash,
                edge.output_index,
            )?;
        }
        Ok(())
    }

    fn end_output(&mut self, output: &TxOutput) -> anyhow::Result<()> {
        self.utxos
            .insert(OutputKey::new(output.tx_hash, output.index));
        let tx = self.current_tx()?;
        tx.outputs += 1;
        tx.output_value += output.value;
        let tx_id = tx.id;
        if !self.active {
            return Ok(());
        }

        let address = self
            .mapper
            .resolve_script(&output.script)
            .map(|hash| self.mapper.encode_address(&hash))
            .unwrap_or_default();
        // the spender is not known yet when the output is written
        self.tables.outputs.write_all(
            format!(
                "{},{},{},{},{},{},\n",
                tx_id,
                output.index,
                output.value,
                quoted(hex::encode(&output.script)),
                quoted(address),
                quoted(""),
            )
            .as_bytes(),
        )?;
        self.next_output_id += 1;
        Ok(())
    }

    fn end_tx(&mut self, tx_end: &TxEnd) -> anyhow::Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("end_tx outside of a transaction"))?;
        let fee = if tx.coinbase {
            0
        } else {
            if tx.input_value < tx.output_value {
                tracing::warn!(
                    "transaction {} spends {} but pays out {}",
                    tx.hash,
                    tx.input_value,
                    tx.output_value
                );
            }
            tx.input_value.saturating_sub(tx.output_value)
        };
        let size = tx_end.offset.saturating_sub(tx.offset);

        let block = self
            .block
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("end_tx outside of a block"))?;
        block.tx_count += 1;
        block.output_value += tx.output_value;
        block.fees += fee;
        block.tx_bytes += size;
        let block_id = block.id;

        if self.active {
            self.tables.transactions.write_all(
                format!(
                    "{},{},{},{},{},{},{},{},{},{}\n",
                    tx.id,
                    quoted(tx.hash),
                    tx.version,
                    block_id,
                    tx.inputs,
                    tx.outputs,
                    tx.output_value,
                    fee,
                    tx_end.lock_time,
                    size
                )
                .as_bytes(),
            )?;
            self.transactions_written += 1;
        }
        Ok(())
    }

    fn end_block(&mut self, _offset: u64) -> anyhow::Result<()> {
        let block = self
            .block
            .take()
            .ok_or_else(|| anyhow::anyhow!("end_block outside of a block"))?;
        if !self.active {
            return Ok(());
        }

        let size = BlockHeader::SERIALIZED_SIZE + block.tx_bytes + compact_size_len(block.tx_count);
        let header = &block.header;
        self.tables.blocks.write_all(
            format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                block.id,
                quoted(header.hash),
                header.version,
                header.time,
                header.nonce,
                header.bits,
                quoted(header.merkle_root),
                block.tx_count,
                block.output_value,
                block.fees,
                size
            )
            .as_bytes(),
        )?;
        self.blocks_written += 1;
        Ok(())
    }

    fn wrapup(&mut self) -> anyhow::Result<()> {
        self.tables.flush()?;
        let summary = self.summary();
        tracing::info!(
            "done: {} blocks, {} transactions, {} inputs, {} outputs written",
            summary.blocks,
            summary.transactions,
            summary.inputs,
            summary.outputs
        );
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) -> anyhow::Result<()> {
        self.tables.flush()
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
