//! Builds well-formed synthetic event streams for tests.

use crate::chain_event::{
    BlockHeader, ChainEvent, Edge, Hash160, Hash256, InputStart, TxEnd, TxOutput, TxStart,
};
use crate::ledger_utils::address_mapper::HexAddressMapper;
use crate::ledger_utils::utxo_table::OutputKey;
use std::collections::HashMap;

pub const TX_OVERHEAD: u64 = 10;
pub const INPUT_SIZE: u64 = 41;
pub const OUTPUT_SIZE: u64 = 34;

/// Byte span the builder gives a transaction.
pub fn tx_size(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD + INPUT_SIZE * inputs as u64 + OUTPUT_SIZE * outputs as u64
}

pub fn identity(n: u8) -> Hash160 {
    Hash160([n; 20])
}

pub fn pay_to(n: u8) -> Vec<u8> {
    HexAddressMapper::script_for(&identity(n))
}

/// An OP_RETURN style script no mapper recognizes.
pub fn unrecognized() -> Vec<u8> {
    vec![0x6a, 0x01, 0x00]
}

pub fn block_hash(height: u64) -> Hash256 {
    marked(0xbb, height)
}

pub fn merkle_root(height: u64) -> Hash256 {
    marked(0xcc, height)
}

fn marked(marker: u8, n: u64) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[0] = marker;
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    Hash256(bytes)
}

pub struct Funding {
    pub key: OutputKey,
    pub value: u64,
    pub script: Vec<u8>,
}

pub struct TestChain {
    events: Vec<ChainEvent>,
    outputs: HashMap<OutputKey, (u64, Vec<u8>)>,
    height: Option<u64>,
    offset: u64,
    tx_counter: u64,
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TestChain {
    pub fn new() -> Self {
        Self {
            events: vec![],
            outputs: HashMap::new(),
            height: None,
            offset: 0,
            tx_counter: 0,
        }
    }

    pub fn start_block(&mut self, time: u32) -> u64 {
        let height = self.height.map(|height| height + 1).unwrap_or(0);
        self.height = Some(height);
        let prev_hash = if height == 0 {
            Hash256::ZERO
        } else {
            block_hash(height - 1)
        };
        self.events.push(ChainEvent::StartBlock {
            header: BlockHeader {
                height,
                hash: block_hash(height),
                version: 1,
                prev_hash,
                merkle_root: merkle_root(height),
                time,
                bits: 0x1d00ffff,
                nonce: 7 + height as u32,
            },
            chain_offset: self.offset,
        });
        self.offset += BlockHeader::SERIALIZED_SIZE + 1;
        height
    }

    pub fn end_block(&mut self) {
        self.events.push(ChainEvent::EndBlock {
            offset: self.offset,
        });
    }

    pub fn coinbase(&mut self, outputs: &[(u64, Vec<u8>)]) -> Hash256 {
        let hash = self.begin_tx(1, outputs.len());
        let height = self.height.unwrap_or_default();
        self.events.push(ChainEvent::StartInput {
            input: InputStart {
                index: 0,
                prev_hash: Hash256::ZERO,
                prev_index: u32::MAX,
                script: height.to_le_bytes().to_vec(),
            },
        });
        self.finish_tx(hash, outputs);
        hash
    }

    /// Spends outputs created earlier by this builder.
    pub fn spend(&mut self, inputs: &[(Hash256, u32)], outputs: &[(u64, Vec<u8>)]) -> Hash256 {
        let funding: Vec<Funding> = inputs
            .iter()
            .map(|(hash, index)| {
                let key = OutputKey::new(*hash, *index);
                let (value, script) = self
                    .outputs
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| panic!("test chain has no output {key}"));
                Funding { key, value, script }
            })
            .collect();
        self.spend_funded(&funding, outputs)
    }

    /// Spends arbitrary outputs, known or not.
    pub fn spend_funded(&mut self, inputs: &[Funding], outputs: &[(u64, Vec<u8>)]) -> Hash256 {
        let hash = self.begin_tx(inputs.len(), outputs.len());
        for (input_index, funding) in inputs.iter().enumerate() {
            let input_script = vec![0x47, input_index as u8];
            self.events.push(ChainEvent::StartInput {
                input: InputStart {
                    index: input_index as u32,
                    prev_hash: funding.key.tx_hash,
                    prev_index: funding.key.index,
                    script: input_script.clone(),
                },
            });
            self.events.push(ChainEvent::Edge {
                edge: Edge {
                    value: funding.value,
                    up_tx_hash: funding.key.tx_hash,
                    output_index: funding.key.index,
                    output_script: funding.script.clone(),
                    down_tx_hash: hash,
                    input_index: input_index as u32,
                    input_script,
                },
            });
        }
        self.finish_tx(hash, outputs);
        hash
    }

    fn begin_tx(&mut self, inputs: usize, outputs: usize) -> Hash256 {
        let hash = marked(0x7a, self.tx_counter);
        self.tx_counter += 1;
        self.events.push(ChainEvent::StartTx {
            tx: TxStart {
                version: 1,
                offset: self.offset,
            },
            hash,
        });
        self.offset += tx_size(inputs, outputs);
        hash
    }

    fn finish_tx(&mut self, hash: Hash256, outputs: &[(u64, Vec<u8>)]) {
        let tx_end = self.offset;
        // outputs end right before the 4 byte lock time
        let outputs_start = tx_end - 4 - OUTPUT_SIZE * outputs.len() as u64;
        for (index, (value, script)) in outputs.iter().enumerate() {
            let key = OutputKey::new(hash, index as u32);
            self.outputs.insert(key, (*value, script.clone()));
            self.events.push(ChainEvent::EndOutput {
                output: TxOutput {
                    offset: outputs_start + OUTPUT_SIZE * (index as u64 + 1),
                    value: *value,
                    tx_hash: hash,
                    index: index as u32,
                    script: script.clone(),
                },
            });
        }
        self.events.push(ChainEvent::EndTx {
            tx: TxEnd {
                lock_time: 0,
                offset: tx_end,
            },
        });
    }

    /// The finished stream, `start` first, without the final `wrapup` (the
    /// driver issues it).
    pub fn events(self) -> Vec<ChainEvent> {
        let last_block = self.height.unwrap_or_default();
        let mut events = Vec::with_capacity(self.events.len() + 1);
        events.push(ChainEvent::Start {
            first_block: 0,
            last_block,
        });
        events.extend(self.events);
        events
    }

    pub fn stream(self) -> impl Iterator<Item = anyhow::Result<ChainEvent>> {
        self.events().into_iter().map(Ok)
    }
}
