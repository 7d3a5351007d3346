use serde::{Deserialize, Serialize};

use std::fmt;

/// 256-bit hash as handed over by the decoder (transaction or block hash).
///
/// The decoder hands hashes over in display order, i.e. already reversed
/// from their wire byte order, and they are rendered unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash256(#[serde(with = "hex")] pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({self})")
    }
}

/// 160-bit address identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash160(#[serde(with = "hex")] pub [u8; 20]);

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({self})")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Hash256,
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SERIALIZED_SIZE: u64 = 80;
}

/// Head of a transaction: version and the byte position it starts at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStart {
    pub version: u32,
    pub offset: u64,
}

/// Tail of a transaction: lock time and the byte position right after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnd {
    pub lock_time: u32,
    pub offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStart {
    pub index: u32,
    pub prev_hash: Hash256,
    pub prev_index: u32,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
}

impl InputStart {
    pub fn is_coinbase(&self) -> bool {
        self.prev_hash.is_zero()
    }
}

/// A spend: the output `(up_tx_hash, output_index)` consumed by input
/// `input_index` of `down_tx_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub value: u64,
    pub up_tx_hash: Hash256,
    pub output_index: u32,
    #[serde(with = "hex")]
    pub output_script: Vec<u8>,
    pub down_tx_hash: Hash256,
    pub input_index: u32,
    #[serde(with = "hex")]
    pub input_script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub offset: u64,
    pub value: u64,
    pub tx_hash: Hash256,
    pub index: u32,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ChainEvent {
    Start {
        first_block: u64,
        last_block: u64,
    },
    StartBlock {
        header: BlockHeader,
        chain_offset: u64,
    },
    StartTx {
        tx: TxStart,
        hash: Hash256,
    },
    StartInput {
        input: InputStart,
    },
    Edge {
        edge: Edge,
    },
    EndOutput {
        output: TxOutput,
    },
    EndTx {
        tx: TxEnd,
    },
    EndBlock {
        offset: u64,
    },
    Wrapup,
}
