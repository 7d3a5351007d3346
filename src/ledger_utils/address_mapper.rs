use crate::chain_event::Hash160;
use anyhow::anyhow;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub trait AddressMapper {
    /// Extracts the identity an output script pays to, `None` when the
    /// script is not recognized.
    fn resolve_script(&self, script: &[u8]) -> Option<Hash160>;

    fn encode_address(&self, hash: &Hash160) -> String;

    fn decode_address(&self, address: &str) -> anyhow::Result<Hash160>;
}

pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    Hash160(Ripemd160::digest(sha).into())
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

fn hash160_from_slice(bytes: &[u8]) -> anyhow::Result<Hash160> {
    let bytes: [u8; 20] = bytes
        .try_into()
        .map_err(|_| anyhow!("expected 20 bytes, got {}", bytes.len()))?;
    Ok(Hash160(bytes))
}

/// Fixture mapper: a script is `0x14 <20 byte identity>`, addresses are the
/// identity in hex.
#[derive(Default)]
pub struct HexAddressMapper {}

impl HexAddressMapper {
    pub const MARKER: u8 = 0x14;

    pub fn script_for(hash: &Hash160) -> Vec<u8> {
        let mut script = Vec::with_capacity(21);
        script.push(Self::MARKER);
        script.extend_from_slice(&hash.0);
        script
    }
}

impl AddressMapper for HexAddressMapper {
    fn resolve_script(&self, script: &[u8]) -> Option<Hash160> {
        match script {
            [Self::MARKER, rest @ ..] if rest.len() == 20 => hash160_from_slice(rest).ok(),
            _ => None,
        }
    }

    fn encode_address(&self, hash: &Hash160) -> String {
        hash.to_string()
    }

    fn decode_address(&self, address: &str) -> anyhow::Result<Hash160> {
        let bytes = hex::decode(address.trim())
            .map_err(|err| anyhow!("can't decode address {:?}: {}", address, err))?;
        hash160_from_slice(&bytes)
    }
}

/// Standard output templates with base58check address text.
pub struct Base58AddressMapper {
    version: u8,
}

impl Default for Base58AddressMapper {
    fn default() -> Self {
        Self { version: 0x00 }
    }
}

impl Base58AddressMapper {
    pub fn new(version: u8) -> Self {
        Self { version }
    }
}

impl AddressMapper for Base58AddressMapper {
    fn resolve_script(&self, script: &[u8]) -> Option<Hash160> {
        match script {
            // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
            [0x76, 0xa9, 0x14, hash @ .., 0x88, 0xac] if hash.len() == 20 => {
                hash160_from_slice(hash).ok()
            }
            // OP_HASH160 <20> OP_EQUAL
            [0xa9, 0x14, hash @ .., 0x87] if hash.len() == 20 => hash160_from_slice(hash).ok(),
            // OP_0 <20>
            [0x00, 0x14, hash @ ..] if hash.len() == 20 => hash160_from_slice(hash).ok(),
            // <pubkey> OP_CHECKSIG
            [0x21, pubkey @ .., 0xac] if pubkey.len() == 33 => Some(hash160(pubkey)),
            [0x41, pubkey @ .., 0xac] if pubkey.len() == 65 => Some(hash160(pubkey)),
            _ => None,
        }
    }

    fn encode_address(&self, hash: &Hash160) -> String {
        let mut data = Vec::with_capacity(25);
        data.push(self.version);
        data.extend_from_slice(&hash.0);
        let checksum = sha256d(&data);
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    fn decode_address(&self, address: &str) -> anyhow::Result<Hash160> {
        let address = address.trim();
        if address.len() == 40 && address.chars().all(|c| c.is_ascii_hexdigit()) {
            return HexAddressMapper::default().decode_address(address);
        }

        let data = bs58::decode(address)
            .into_vec()
            .map_err(|err| anyhow!("can't decode address {:?}: {}", address, err))?;
        if data.len() != 25 {
            return Err(anyhow!(
                "can't decode address {:?}: unexpected payload length {}",
                address,
                data.len()
            ));
        }
        let checksum = sha256d(&data[..21]);
        if checksum[..4] != data[21..] {
            return Err(anyhow!("can't decode address {:?}: bad checksum", address));
        }
        hash160_from_slice(&data[1..21])
    }
}
